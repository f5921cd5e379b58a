use serde_json::{Value, json};

use crate::config::Organization;
use crate::error::ReconcileError;
use crate::reconcile::{Action, Applied};
use crate::transport::{ApiOutcome, RestClient};

use super::{Existing, exists};

const ORG_API: &str = "/api/v1/orgs";

pub fn payload(org: &Organization) -> Value {
    json!({
        "username": org.name,
        "visibility": org.visibility,
    })
}

/// Create the organization; any create failure is settled by an existence read.
#[tracing::instrument(skip(client, org), fields(org = %org.name), err)]
pub async fn reconcile(client: &RestClient, org: &Organization) -> Result<Applied, ReconcileError> {
    match client.post(ORG_API, &payload(org)).await {
        created @ ApiOutcome::Success { .. } => {
            tracing::info!(org = %org.name, "organization created");
            Ok(Applied {
                action: Action::Created,
                response: created,
            })
        }
        failed => {
            if exists(client, Existing::Organization(&org.name)).await {
                tracing::info!(org = %org.name, "organization already exists");
                Ok(Applied {
                    action: Action::Unchanged,
                    response: failed,
                })
            } else {
                Err(failed.into_error("organization", &org.name))
            }
        }
    }
}
