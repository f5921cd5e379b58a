use std::fmt;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::RobotAccount;
use crate::error::ReconcileError;
use crate::reconcile::{self, Applied};
use crate::transport::RestClient;

use super::ROBOT_API;

/// Read-only pull access within one project.
const PERMISSIONS: [(&str, &str); 6] = [
    ("list", "artifact"),
    ("read", "artifact"),
    ("list", "repository"),
    ("pull", "repository"),
    ("read", "repository"),
    ("list", "tag"),
];

/// One-time credential returned by the backend when a robot is issued.
#[derive(Clone, Deserialize)]
pub struct RobotCredential {
    pub name: String,
    pub secret: String,
}

impl fmt::Debug for RobotCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotCredential")
            .field("name", &self.name)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

pub fn payload(account: &RobotAccount) -> Value {
    let access: Vec<Value> = PERMISSIONS
        .iter()
        .map(|(action, resource)| json!({ "action": action, "resource": resource }))
        .collect();

    json!({
        "name": account.name,
        "level": "system",
        "disable": false,
        "editable": false,
        "duration": -1,
        "expires_at": -1,
        "permissions": [
            {
                "kind": "project",
                "namespace": account.project,
                "access": access,
            },
        ],
    })
}

pub async fn reconcile(client: &RestClient, account: &RobotAccount) -> Result<Applied, ReconcileError> {
    reconcile::create_or_update(client, "robot account", ROBOT_API, &account.name, &payload(account))
        .await
}

/// Credential to bridge into the cluster: the issued one when the response
/// carries a secret, otherwise the configured token.
pub fn issued_credential(applied: &Applied, account: &RobotAccount) -> Option<RobotCredential> {
    if let Some(issued) = applied.response.json::<RobotCredential>()
        && !issued.secret.is_empty()
    {
        return Some(issued);
    }

    account
        .token
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|token| RobotCredential {
            name: account.name.clone(),
            secret: token.clone(),
        })
}
