use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ReconcileError;
use crate::reconcile::{Action, Applied};
use crate::transport::{ApiOutcome, RestClient};

use super::{DEFAULT_BRANCH, repo_path};

pub const COMMITTER_NAME: &str = "Deployer";
pub const COMMITTER_EMAIL: &str = "deploy@on-clouds.at";

/// A file to write on the default branch.
#[derive(Debug, Clone)]
pub struct FileCommit<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub path: &'a str,
    pub content: &'a str,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ExistingFile {
    sha: String,
}

fn contents_path(owner: &str, repo: &str, path: &str) -> String {
    format!("{}/contents/{path}", repo_path(owner, repo))
}

pub fn payload(file: &FileCommit<'_>, sha: Option<&str>) -> Value {
    let identity = json!({ "name": COMMITTER_NAME, "email": COMMITTER_EMAIL });
    let mut body = json!({
        "branch": DEFAULT_BRANCH,
        "message": file.message,
        "content": STANDARD.encode(file.content),
        "author": identity,
        "committer": identity,
    });
    if let Some(sha) = sha {
        body["sha"] = Value::from(sha);
    }
    body
}

/// Create the file, or update it in place when it already exists on `main`.
#[tracing::instrument(skip(client, file), fields(repo = %file.repo, path = %file.path), err)]
pub async fn commit(client: &RestClient, file: &FileCommit<'_>) -> Result<Applied, ReconcileError> {
    let path = contents_path(file.owner, file.repo, file.path);

    let current = client
        .get(&format!("{path}?ref={DEFAULT_BRANCH}"))
        .await;
    let (outcome, action) = match current {
        ApiOutcome::NotFound { .. } => (client.post(&path, &payload(file, None)).await, Action::Created),
        found @ ApiOutcome::Success { .. } => {
            let sha = found
                .json::<ExistingFile>()
                .map(|f| f.sha)
                .ok_or_else(|| ReconcileError::Decode {
                    kind: "manifest",
                    name: file.path.to_owned(),
                    detail: "contents response carries no sha".into(),
                })?;
            (client.put(&path, &payload(file, Some(&sha))).await, Action::Updated)
        }
        failed => return Err(failed.into_error("manifest", file.path)),
    };

    match outcome {
        ApiOutcome::Success { .. } => {
            tracing::info!(?action, "manifest committed");
            Ok(Applied {
                action,
                response: outcome,
            })
        }
        failed => Err(failed.into_error("manifest", file.path)),
    }
}
