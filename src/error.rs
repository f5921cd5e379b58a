use std::path::PathBuf;

use crate::bridge::error::SecretError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Failure of a single resource's reconciliation. Never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{kind} {name}: network error: {detail}")]
    Transport {
        kind: &'static str,
        name: String,
        detail: String,
    },

    #[error("{kind} {name}: backend returned {status}: {detail}")]
    Backend {
        kind: &'static str,
        name: String,
        status: u16,
        detail: String,
    },

    #[error("{kind} {name} not found")]
    DependencyNotFound { kind: &'static str, name: String },

    #[error("{kind} {name}: unexpected response: {detail}")]
    Decode {
        kind: &'static str,
        name: String,
        detail: String,
    },

    #[error("manifest render failed: {0}")]
    Render(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// The only error that terminates a run.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("{system} is not available after {attempts} attempts: {detail}")]
    Unreachable {
        system: String,
        attempts: u32,
        detail: String,
    },
}
