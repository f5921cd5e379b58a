use serde_json::{Value, json};

use crate::config::ReplicationRule;
use crate::error::ReconcileError;
use crate::lookup::{IdLookup, Listing};
use crate::reconcile::{self, Applied};
use crate::transport::{ApiOutcome, RestClient};

use super::{REPLICATION_EXECUTION_API, REPLICATION_POLICY_API};

const KIND: &str = "replication policy";

/// Pull-based policy copying `rule.repository` from the source registry on a cron schedule.
pub fn payload(rule: &ReplicationRule, source_registry_id: i64, dest_namespace: &str) -> Value {
    json!({
        "name": rule.policy_name(),
        "dest_namespace": dest_namespace,
        "enabled": true,
        "override": true,
        "src_registry": { "id": source_registry_id },
        "filters": [
            { "type": "name", "value": rule.repository },
        ],
        "trigger": {
            "type": "scheduled",
            "trigger_settings": { "cron": rule.crontab },
        },
    })
}

/// Reconcile one replication rule.
///
/// The source registry must already be visible in the registry listing. A
/// newly created policy (201) is executed once immediately; an updated one is
/// left to its schedule. `default_namespace` fills an empty destination.
#[tracing::instrument(
    skip(client, lookup, rule),
    fields(repository = %rule.repository, source = %rule.source_registry),
    err
)]
pub async fn reconcile(
    client: &RestClient,
    lookup: &impl IdLookup,
    rule: &ReplicationRule,
    default_namespace: Option<&str>,
) -> Result<Applied, ReconcileError> {
    let source_id = lookup
        .resolve_id(Listing::Registries, &rule.source_registry)
        .await?
        .ok_or_else(|| ReconcileError::DependencyNotFound {
            kind: Listing::Registries.kind(),
            name: rule.source_registry.clone(),
        })?;

    let dest_namespace = if rule.destination_namespace.is_empty() {
        default_namespace.unwrap_or_default()
    } else {
        rule.destination_namespace.as_str()
    };

    let name = rule.policy_name();
    let body = payload(rule, source_id, dest_namespace);
    let applied =
        reconcile::create_or_update(client, KIND, REPLICATION_POLICY_API, &name, &body).await?;

    if applied.response.is_created() {
        execute(client, lookup, &name).await?;
    }

    Ok(applied)
}

/// Trigger a one-off execution of the named policy.
pub async fn execute(
    client: &RestClient,
    lookup: &impl IdLookup,
    policy_name: &str,
) -> Result<(), ReconcileError> {
    let policy_id = lookup
        .resolve_id(Listing::ReplicationPolicies, policy_name)
        .await?
        .ok_or_else(|| ReconcileError::DependencyNotFound {
            kind: KIND,
            name: policy_name.to_owned(),
        })?;

    match client
        .post(REPLICATION_EXECUTION_API, &json!({ "policy_id": policy_id }))
        .await
    {
        ApiOutcome::Success { .. } => {
            tracing::info!(policy = policy_name, policy_id, "replication started");
            Ok(())
        }
        failed => Err(failed.into_error("replication execution", policy_name)),
    }
}
