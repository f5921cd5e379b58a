use serde_json::{Map, Value};

use crate::error::ReconcileError;
use crate::reconcile::{Action, Applied};
use crate::transport::{ApiOutcome, RestClient};

use super::CONFIGURATION_API;

/// Apply one system setting. Configuration has no create step; it is always a PUT.
#[tracing::instrument(skip(client, value), err)]
pub async fn apply(client: &RestClient, key: &str, value: &Value) -> Result<Applied, ReconcileError> {
    let mut body = Map::new();
    body.insert(key.to_owned(), value.clone());

    match client.put(CONFIGURATION_API, &Value::Object(body)).await {
        ok @ ApiOutcome::Success { .. } => {
            tracing::info!(key, "configuration applied");
            Ok(Applied {
                action: Action::Updated,
                response: ok,
            })
        }
        failed => Err(failed.into_error("configuration", key)),
    }
}
