use serde_json::json;

use crate::bridge::keys::DEPLOY_KEY_TITLE;
use crate::error::ReconcileError;
use crate::transport::{ApiOutcome, RestClient};

use super::repo_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    AlreadyRegistered,
}

/// Register `public_key` as a read-only deploy key.
///
/// A key that already exists on the repository counts as success.
#[tracing::instrument(skip(client, public_key), err)]
pub async fn register(
    client: &RestClient,
    owner: &str,
    repo: &str,
    public_key: &str,
) -> Result<Registration, ReconcileError> {
    let body = json!({
        "title": DEPLOY_KEY_TITLE,
        "key": public_key,
        "read_only": true,
    });

    let outcome = client
        .post(&format!("{}/keys", repo_path(owner, repo)), &body)
        .await;
    match outcome {
        ApiOutcome::Success { .. } => {
            tracing::info!("deploy key registered");
            Ok(Registration::Registered)
        }
        ref failed if is_already_registered(failed) => {
            tracing::info!("deploy key already registered");
            Ok(Registration::AlreadyRegistered)
        }
        failed => Err(failed.into_error("deploy key", repo)),
    }
}

/// Gitea answers a duplicate key or title with 409 or 422.
fn is_already_registered(outcome: &ApiOutcome) -> bool {
    match outcome {
        ApiOutcome::Conflict { .. } => true,
        ApiOutcome::Backend {
            status: 422,
            detail,
        } => {
            let detail = detail.to_lowercase();
            detail.contains("already exist") || detail.contains("has been used")
        }
        _ => false,
    }
}
