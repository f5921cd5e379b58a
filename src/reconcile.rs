use serde_json::Value;

use crate::error::ReconcileError;
use crate::transport::{ApiOutcome, RestClient};

/// What a reconciliation pass did to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    /// Already present and left as is.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub action: Action,
    /// Response of the call that settled the resource.
    pub response: ApiOutcome,
}

/// Create `name` in `collection`; on 409 update it with the same payload at
/// `<collection>/<name>`. Any other failure is returned to the caller.
#[tracing::instrument(skip(client, payload), err)]
pub async fn create_or_update(
    client: &RestClient,
    kind: &'static str,
    collection: &str,
    name: &str,
    payload: &Value,
) -> Result<Applied, ReconcileError> {
    match client.post(collection, payload).await {
        created @ ApiOutcome::Success { .. } => {
            tracing::info!(kind, name, "created");
            Ok(Applied {
                action: Action::Created,
                response: created,
            })
        }
        ApiOutcome::Conflict { .. } => {
            tracing::info!(kind, name, "already exists, updating");
            let path = format!("{collection}/{name}");
            match client.put(&path, payload).await {
                updated @ ApiOutcome::Success { .. } => {
                    tracing::info!(kind, name, "updated");
                    Ok(Applied {
                        action: Action::Updated,
                        response: updated,
                    })
                }
                failed => Err(failed.into_error(kind, name)),
            }
        }
        failed => Err(failed.into_error(kind, name)),
    }
}
