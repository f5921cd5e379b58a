pub mod availability;
pub mod bridge;
pub mod config;
pub mod error;
pub mod gitea;
pub mod gitops;
pub mod harbor;
pub mod lookup;
pub mod orchestrator;
pub mod reconcile;
pub mod transport;
pub mod validation;
