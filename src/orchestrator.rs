//! Run sequencing.
//!
//! One run walks the desired state in a fixed order: probes, configuration,
//! projects, registries, replication rules, robot accounts, organizations,
//! repositories. A failed resource is logged and counted; only an exhausted
//! availability budget stops the run.

use std::collections::BTreeMap;
use std::fmt;

use crate::availability::{self, RunContext};
use crate::bridge::CredentialBridge;
use crate::bridge::secrets::{SecretOutcome, SecretStore};
use crate::config::{DesiredState, Endpoint, Repository, Stage};
use crate::error::{GateError, ReconcileError};
use crate::gitea::contents::{self, FileCommit};
use crate::gitea::{organization, repository};
use crate::gitops;
use crate::harbor::{configuration, project, registry, replication, robot};
use crate::lookup::ListingScan;
use crate::reconcile::{Action, Applied};
use crate::transport::RestClient;

pub const HARBOR: &str = "harbor";
pub const GITEA: &str = "gitea";

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

/// Per-kind outcome counts of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    kinds: BTreeMap<&'static str, Tally>,
}

impl RunReport {
    pub fn record(&mut self, kind: &'static str, action: Action) {
        let tally = self.kinds.entry(kind).or_default();
        match action {
            Action::Created => tally.created += 1,
            Action::Updated => tally.updated += 1,
            Action::Unchanged => tally.unchanged += 1,
        }
    }

    pub fn record_failure(&mut self, kind: &'static str, error: &ReconcileError) {
        tracing::error!(kind, %error, "reconciliation failed");
        self.kinds.entry(kind).or_default().failed += 1;
    }

    /// Count `result` under `kind` and hand back the success, if any.
    fn settle(
        &mut self,
        kind: &'static str,
        result: Result<Applied, ReconcileError>,
    ) -> Option<Applied> {
        match result {
            Ok(applied) => {
                self.record(kind, applied.action);
                Some(applied)
            }
            Err(e) => {
                self.record_failure(kind, &e);
                None
            }
        }
    }

    fn settle_secret(&mut self, kind: &'static str, result: Result<SecretOutcome, ReconcileError>) {
        match result {
            Ok(SecretOutcome::Created) => self.record(kind, Action::Created),
            Ok(SecretOutcome::AlreadyExists) => self.record(kind, Action::Unchanged),
            Err(e) => self.record_failure(kind, &e),
        }
    }

    pub fn tally(&self, kind: &str) -> Tally {
        self.kinds.get(kind).copied().unwrap_or_default()
    }

    pub fn failed(&self) -> u32 {
        self.kinds.values().map(|t| t.failed).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, t) in &self.kinds {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(
                f,
                "{kind}: {} created / {} updated / {} unchanged / {} failed",
                t.created, t.updated, t.unchanged, t.failed
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a, S> {
    state: &'a DesiredState,
    harbor: Option<RestClient>,
    gitea: Option<RestClient>,
    bridge: Option<CredentialBridge<S>>,
}

impl<'a, S: SecretStore> Orchestrator<'a, S> {
    /// Build clients for every configured backend. Without a bridge, robot
    /// secrets and deploy keys are skipped.
    pub fn new(
        state: &'a DesiredState,
        bridge: Option<CredentialBridge<S>>,
    ) -> Result<Self, reqwest::Error> {
        let harbor = state
            .harbor
            .is_configured()
            .then(|| RestClient::new(&state.harbor))
            .transpose()?;
        let gitea = state
            .gitea
            .is_configured()
            .then(|| RestClient::new(&state.gitea))
            .transpose()?;

        Ok(Self {
            state,
            harbor,
            gitea,
            bridge,
        })
    }

    pub fn bridge(&self) -> Option<&CredentialBridge<S>> {
        self.bridge.as_ref()
    }

    /// Converge every configured backend once.
    ///
    /// `ctx` carries probe failures across runs; it is the only state that
    /// outlives a run.
    pub async fn run(&self, ctx: &mut RunContext) -> Result<RunReport, GateError> {
        if let Some(harbor) = &self.harbor {
            availability::check(ctx, HARBOR, harbor).await?;
        }
        if let Some(gitea) = &self.gitea {
            availability::check(ctx, GITEA, gitea).await?;
        }

        let mut report = RunReport::default();

        match &self.harbor {
            Some(harbor) => self.reconcile_harbor(harbor, &mut report).await,
            None => tracing::info!("harbor not configured, skipping"),
        }
        match &self.gitea {
            Some(gitea) => self.reconcile_gitea(gitea, &mut report).await,
            None => tracing::info!("gitea not configured, skipping"),
        }

        tracing::info!(summary = %report, failed = report.failed(), "run finished");
        Ok(report)
    }

    async fn reconcile_harbor(&self, harbor: &RestClient, report: &mut RunReport) {
        let desired = &self.state.harbor;

        for (key, value) in &desired.configuration {
            report.settle("configuration", configuration::apply(harbor, key, value).await);
        }

        for p in &desired.projects {
            report.settle("project", project::reconcile(harbor, p).await);
        }

        for r in &desired.registries {
            report.settle("registry", registry::reconcile(harbor, r).await);
        }

        let lookup = ListingScan::new(harbor);
        for rule in &desired.replications {
            report.settle(
                "replication policy",
                replication::reconcile(harbor, &lookup, rule, None).await,
            );
        }
        for p in &desired.projects {
            for rule in &p.replication_rules {
                report.settle(
                    "replication policy",
                    replication::reconcile(harbor, &lookup, rule, Some(&p.name)).await,
                );
            }
        }

        for account in &desired.robot_accounts {
            let Some(applied) = report.settle("robot account", robot::reconcile(harbor, account).await)
            else {
                continue;
            };

            let Some(bridge) = &self.bridge else {
                tracing::warn!(account = %account.name, "no cluster configured, skipping robot secret");
                continue;
            };
            let Some(credential) = robot::issued_credential(&applied, account) else {
                tracing::warn!(
                    account = %account.name,
                    "no secret issued and no token configured, skipping robot secret"
                );
                continue;
            };
            let result = bridge
                .materialize_robot_secret(harbor.base_url(), &account.name, &credential)
                .await
                .map_err(ReconcileError::from);
            report.settle_secret("robot secret", result);
        }
    }

    async fn reconcile_gitea(&self, gitea: &RestClient, report: &mut RunReport) {
        let desired = &self.state.gitea;

        for org in &desired.orgs {
            report.settle("organization", organization::reconcile(gitea, org).await);
        }

        for repo in &desired.repositories {
            if report
                .settle("repository", repository::reconcile(gitea, repo).await)
                .is_none()
            {
                continue;
            }

            for stage in &repo.stages {
                report.settle("manifest", self.commit_stage(gitea, repo, stage).await);
            }

            match &self.bridge {
                Some(bridge) => report.settle_secret(
                    "deploy key",
                    bridge.provision_deploy_key(gitea, desired, repo).await,
                ),
                None => tracing::warn!(repo = %repo.name, "no cluster configured, skipping deploy key"),
            }
        }
    }

    async fn commit_stage(
        &self,
        gitea: &RestClient,
        repo: &Repository,
        stage: &Stage,
    ) -> Result<Applied, ReconcileError> {
        let manifest = gitops::render_appset(&self.state.gitea, repo, stage)?;
        let path = gitops::manifest_path(stage);
        let file = FileCommit {
            owner: &repo.organization,
            repo: &repo.name,
            path: &path,
            content: &manifest,
            message: format!("Initial commit of AppSet {}", stage.name),
        };
        contents::commit(gitea, &file).await
    }
}
