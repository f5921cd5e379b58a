use serde_json::{Value, json};

use crate::config::Project;
use crate::error::ReconcileError;
use crate::reconcile::{self, Applied};
use crate::transport::RestClient;

use super::PROJECT_API;

pub fn payload(project: &Project) -> Value {
    json!({
        "project_name": project.name,
        "metadata": project.metadata,
    })
}

pub async fn reconcile(client: &RestClient, project: &Project) -> Result<Applied, ReconcileError> {
    reconcile::create_or_update(client, "project", PROJECT_API, &project.name, &payload(project))
        .await
}
