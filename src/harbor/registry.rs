use serde_json::{Value, json};

use crate::config::Registry;
use crate::error::ReconcileError;
use crate::reconcile::{self, Applied};
use crate::transport::RestClient;

use super::REGISTRY_API;

pub fn payload(registry: &Registry) -> Value {
    json!({
        "name": registry.name,
        "description": registry.description,
        "url": registry.url,
        "type": registry.kind,
        "credential": {
            "access_key": registry.credentials.access_key,
            "access_secret": registry.credentials.access_secret,
        },
    })
}

pub async fn reconcile(client: &RestClient, registry: &Registry) -> Result<Applied, ReconcileError> {
    reconcile::create_or_update(
        client,
        "registry",
        REGISTRY_API,
        &registry.name,
        &payload(registry),
    )
    .await
}
