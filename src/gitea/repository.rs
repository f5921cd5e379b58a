use serde_json::{Value, json};

use crate::config::Repository;
use crate::error::ReconcileError;
use crate::reconcile::{Action, Applied};
use crate::transport::{ApiOutcome, RestClient};

use super::{DEFAULT_BRANCH, Existing, exists};

pub fn payload(repo: &Repository) -> Value {
    json!({
        "name": repo.name,
        "description": repo.description,
        "private": repo.private,
        "auto_init": true,
        "default_branch": DEFAULT_BRANCH,
    })
}

/// Create the repository under its organization.
///
/// 409 means it already exists; any other failure is settled by an existence read.
#[tracing::instrument(skip(client, repo), fields(org = %repo.organization, repo = %repo.name), err)]
pub async fn reconcile(client: &RestClient, repo: &Repository) -> Result<Applied, ReconcileError> {
    let path = format!("{}/repos", super::org_path(&repo.organization));
    match client.post(&path, &payload(repo)).await {
        created @ ApiOutcome::Success { .. } => {
            tracing::info!("repository created");
            Ok(Applied {
                action: Action::Created,
                response: created,
            })
        }
        conflict @ ApiOutcome::Conflict { .. } => {
            tracing::info!("repository already exists");
            Ok(Applied {
                action: Action::Unchanged,
                response: conflict,
            })
        }
        failed => {
            let target = Existing::Repository {
                owner: &repo.organization,
                name: &repo.name,
            };
            if exists(client, target).await {
                tracing::info!("repository already exists");
                Ok(Applied {
                    action: Action::Unchanged,
                    response: failed,
                })
            } else {
                Err(failed.into_error("repository", &repo.name))
            }
        }
    }
}
