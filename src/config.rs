use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::validation;

pub const DEFAULT_SSH_URL: &str = "git@kds-deployment-stack-ssh-cluster:";
pub const DEFAULT_DEPLOY_KEY_NAMESPACE: &str = "default";
pub const DEFAULT_ARGO_PROJECT: &str = "default";
pub const DEFAULT_ARGO_CLUSTER: &str = "https://kubernetes.default.svc";

// ---------------------------------------------------------------------------
// Desired-state document
// ---------------------------------------------------------------------------

/// The full desired state for one run. Loaded once, never mutated afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub gitea: GiteaConfig,
    #[serde(default)]
    pub harbor: HarborConfig,
}

#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Endpoint settings shared by both backends.
pub trait Endpoint {
    fn url(&self) -> &str;
    fn credentials(&self) -> &Credentials;
    fn tls(&self) -> &TlsConfig;

    /// A backend without a URL is not part of this run.
    fn is_configured(&self) -> bool {
        !self.url().trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Harbor (registry service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarborConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub tls_config: TlsConfig,
    /// System configuration keys, each applied with its own PUT.
    #[serde(default)]
    pub configuration: Map<String, Value>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub registries: Vec<Registry>,
    #[serde(default)]
    pub replications: Vec<ReplicationRule>,
    #[serde(default)]
    pub robot_accounts: Vec<RobotAccount>,
}

impl Endpoint for HarborConfig {
    fn url(&self) -> &str {
        &self.url
    }
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }
    fn tls(&self) -> &TlsConfig {
        &self.tls_config
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub replication_rules: Vec<ReplicationRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationRule {
    /// Repository filter pattern, e.g. `team/app`.
    pub repository: String,
    pub source_registry: String,
    #[serde(default)]
    pub destination_namespace: String,
    #[serde(default)]
    pub crontab: String,
}

impl ReplicationRule {
    /// Policy names may not contain `/`.
    pub fn policy_name(&self) -> String {
        self.repository.replace('/', "-")
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct RobotAccount {
    pub name: String,
    #[serde(default)]
    pub project: String,
    /// Fallback credential used when the backend response carries no secret.
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for RobotAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotAccount")
            .field("name", &self.name)
            .field("project", &self.project)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub credentials: RegistryCredentials,
}

#[derive(Clone, Default, Deserialize)]
pub struct RegistryCredentials {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub access_secret: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("access_key", &self.access_key)
            .field("access_secret", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Gitea (source-control service)
// ---------------------------------------------------------------------------

fn default_ssh_url() -> String {
    DEFAULT_SSH_URL.into()
}

fn default_deploy_key_namespace() -> String {
    DEFAULT_DEPLOY_KEY_NAMESPACE.into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiteaConfig {
    #[serde(default)]
    pub url: String,
    /// SSH clone prefix used in deploy-key secrets and generated manifests.
    #[serde(default = "default_ssh_url")]
    pub ssh_url: String,
    /// Namespace receiving the deploy-key repository secrets.
    #[serde(default = "default_deploy_key_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub tls_config: TlsConfig,
    #[serde(default)]
    pub orgs: Vec<Organization>,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl Default for GiteaConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ssh_url: default_ssh_url(),
            namespace: default_deploy_key_namespace(),
            credentials: Credentials::default(),
            tls_config: TlsConfig::default(),
            orgs: Vec::new(),
            repositories: Vec::new(),
        }
    }
}

impl GiteaConfig {
    /// SSH clone URL for a repository, e.g. `git@host:/org/repo.git`.
    pub fn clone_url(&self, org: &str, repo: &str) -> String {
        format!("{}/{org}/{repo}.git", self.ssh_url.trim_end_matches('/'))
    }
}

impl Endpoint for GiteaConfig {
    fn url(&self) -> &str {
        &self.url
    }
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }
    fn tls(&self) -> &TlsConfig {
        &self.tls_config
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Limited,
    Private,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organization {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(rename = "org", default)]
    pub organization: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

fn default_argo_project() -> String {
    DEFAULT_ARGO_PROJECT.into()
}

fn default_argo_cluster() -> String {
    DEFAULT_ARGO_CLUSTER.into()
}

/// Deployment environment rendered into an `ApplicationSet`; never reconciled itself.
#[derive(Debug, Clone, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default = "default_argo_project")]
    pub argo_project: String,
    #[serde(default = "default_argo_cluster")]
    pub argo_cluster: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl DesiredState {
    /// Read, override from the process environment, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, |key| std::env::var(key).ok())
    }

    /// Parse a YAML document, applying overrides from `lookup`.
    ///
    /// Every scalar leaf at path `a.b.c` may be replaced by the variable `A_B_C`.
    pub fn parse(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut doc: serde_yaml::Value = serde_yaml::from_str(raw)?;
        if doc.is_null() {
            doc = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        }
        apply_env_overrides(&mut doc, "", &lookup);

        let state: Self = serde_yaml::from_value(doc)?;
        state.validate()?;
        Ok(state)
    }

    /// Collect every validation failure rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut check = |result: Result<(), String>| {
            if let Err(e) = result {
                errors.push(e);
            }
        };

        let harbor = &self.harbor;
        let harbor_used = !harbor.configuration.is_empty()
            || !harbor.projects.is_empty()
            || !harbor.registries.is_empty()
            || !harbor.replications.is_empty()
            || !harbor.robot_accounts.is_empty();
        if harbor_used || harbor.is_configured() {
            check(validation::check_url("harbor.url", &harbor.url));
        }
        for project in &harbor.projects {
            check(validation::check_name("harbor.projects[].name", &project.name));
            for rule in &project.replication_rules {
                check_rule(&mut check, rule);
            }
        }
        for registry in &harbor.registries {
            check(validation::check_name("harbor.registries[].name", &registry.name));
            check(validation::check_url("harbor.registries[].url", &registry.url));
        }
        for rule in &harbor.replications {
            check_rule(&mut check, rule);
        }
        for account in &harbor.robot_accounts {
            check(validation::check_name("harbor.robotAccounts[].name", &account.name));
            check(validation::check_name(
                "harbor.robotAccounts[].project",
                &account.project,
            ));
        }

        let gitea = &self.gitea;
        if !gitea.orgs.is_empty() || !gitea.repositories.is_empty() || gitea.is_configured() {
            check(validation::check_url("gitea.url", &gitea.url));
        }
        for org in &gitea.orgs {
            check(validation::check_name("gitea.orgs[].name", &org.name));
        }
        for repo in &gitea.repositories {
            check(validation::check_name("gitea.repositories[].name", &repo.name));
            check(validation::check_name(
                "gitea.repositories[].org",
                &repo.organization,
            ));
            for stage in &repo.stages {
                check(validation::check_name("gitea.repositories[].stages[].name", &stage.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

fn check_rule(check: &mut impl FnMut(Result<(), String>), rule: &ReplicationRule) {
    check(validation::check_not_empty(
        "replication.repository",
        &rule.repository,
    ));
    check(validation::check_name(
        "replication.sourceRegistry",
        &rule.source_registry,
    ));
    check(validation::check_not_empty("replication.crontab", &rule.crontab));
}

/// Replace scalar leaves with environment values, keeping the leaf's type.
fn apply_env_overrides(
    node: &mut serde_yaml::Value,
    prefix: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) {
    let serde_yaml::Value::Mapping(map) = node else {
        return;
    };

    for (key, value) in map.iter_mut() {
        let Some(key) = key.as_str() else {
            continue;
        };
        let path = if prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            serde_yaml::Value::Mapping(_) => apply_env_overrides(value, &path, lookup),
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::Tagged(_) => {}
            _ => {
                if let Some(raw) = lookup(&env_key(&path)) {
                    *value = typed_scalar(value, raw);
                }
            }
        }
    }
}

fn env_key(path: &str) -> String {
    path.replace('.', "_").to_uppercase()
}

fn typed_scalar(current: &serde_yaml::Value, raw: String) -> serde_yaml::Value {
    match current {
        serde_yaml::Value::Bool(_) => raw
            .parse::<bool>()
            .map_or(serde_yaml::Value::String(raw), serde_yaml::Value::Bool),
        serde_yaml::Value::Number(_) => serde_yaml::from_str::<serde_yaml::Value>(&raw)
            .ok()
            .filter(serde_yaml::Value::is_number)
            .unwrap_or(serde_yaml::Value::String(raw)),
        _ => serde_yaml::Value::String(raw),
    }
}
