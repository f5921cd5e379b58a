//! Harbor registry-service reconcilers.
//!
//! Every kind except configuration follows the create → 409 → update protocol
//! in [`crate::reconcile::create_or_update`].

pub mod configuration;
pub mod project;
pub mod registry;
pub mod replication;
pub mod robot;

pub const CONFIGURATION_API: &str = "/api/v2.0/configurations";
pub const PROJECT_API: &str = "/api/v2.0/projects";
pub const REGISTRY_API: &str = "/api/v2.0/registries";
pub const REPLICATION_POLICY_API: &str = "/api/v2.0/replication/policies";
pub const REPLICATION_EXECUTION_API: &str = "/api/v2.0/replication/executions";
pub const ROBOT_API: &str = "/api/v2.0/robots";
