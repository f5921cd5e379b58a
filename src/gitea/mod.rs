//! Gitea source-control reconcilers.
//!
//! Gitea's create endpoints do not reliably answer 409 for existing
//! resources, so an ambiguous create failure is settled by reading the
//! resource back (see [`exists`]).

pub mod contents;
pub mod deploy_key;
pub mod organization;
pub mod repository;

use crate::transport::{ApiOutcome, RestClient};

pub const DEFAULT_BRANCH: &str = "main";

pub fn org_path(org: &str) -> String {
    format!("/api/v1/orgs/{org}")
}

pub fn repo_path(owner: &str, repo: &str) -> String {
    format!("/api/v1/repos/{owner}/{repo}")
}

/// A resource whose existence can be read back by key.
#[derive(Debug, Clone, Copy)]
pub enum Existing<'a> {
    Organization(&'a str),
    Repository { owner: &'a str, name: &'a str },
}

impl Existing<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Organization(_) => "organization",
            Self::Repository { .. } => "repository",
        }
    }

    fn path(&self) -> String {
        match self {
            Self::Organization(org) => org_path(org),
            Self::Repository { owner, name } => repo_path(owner, name),
        }
    }
}

/// Authoritative existence check.
///
/// Only a 404 means "absent". Any other failure is assumed to mean the
/// resource exists, so an unreadable backend never causes a duplicate create.
#[tracing::instrument(skip(client))]
pub async fn exists(client: &RestClient, target: Existing<'_>) -> bool {
    match client.get(&target.path()).await {
        ApiOutcome::Success { .. } => true,
        ApiOutcome::NotFound { .. } => false,
        other => {
            tracing::warn!(
                kind = target.kind(),
                status = ?other.status(),
                "existence check inconclusive, assuming it exists"
            );
            true
        }
    }
}
