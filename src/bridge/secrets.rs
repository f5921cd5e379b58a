use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube::api::PostParams;

use super::error::SecretError;

/// Namespace of the Argo CD installation receiving registry credentials.
pub const ARGOCD_NAMESPACE: &str = "argocd";
pub const SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOutcome {
    Created,
    /// A secret with this name already exists; its content was left untouched.
    AlreadyExists,
}

/// Create-only secret store. Secrets are never updated once written.
#[allow(async_fn_in_trait)]
pub trait SecretStore {
    async fn create(&self, secret: &Secret) -> Result<SecretOutcome, SecretError>;
}

/// [`SecretStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretStore {
    client: kube::Client,
}

impl KubeSecretStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

impl SecretStore for KubeSecretStore {
    #[tracing::instrument(skip(self, secret), fields(name = ?secret.metadata.name, namespace = ?secret.metadata.namespace), err)]
    async fn create(&self, secret: &Secret) -> Result<SecretOutcome, SecretError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        let namespace = secret
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| SecretError::MissingNamespace(name.clone()))?;

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match secrets.create(&PostParams::default(), secret).await {
            Ok(_) => Ok(SecretOutcome::Created),
            Err(kube::Error::Api(err)) if err.code == 409 => Ok(SecretOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Argo CD repository secrets
// ---------------------------------------------------------------------------

fn argocd_secret(namespace: &str, name: &str, data: BTreeMap<String, String>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(BTreeMap::from([
                (SECRET_TYPE_LABEL.into(), "repository".into()),
                (MANAGED_BY_LABEL.into(), "platformer".into()),
            ])),
            ..Default::default()
        },
        string_data: Some(data),
        ..Default::default()
    }
}

/// Git repository credential: SSH clone URL plus the deploy key's private half.
pub fn git_repository_secret(namespace: &str, name: &str, url: &str, private_key: String) -> Secret {
    argocd_secret(
        namespace,
        name,
        BTreeMap::from([
            ("url".into(), url.to_owned()),
            ("sshPrivateKey".into(), private_key),
            ("type".into(), "git".into()),
            ("insecure".into(), "true".into()),
        ]),
    )
}

/// OCI Helm repository credential for a registry robot account.
pub fn helm_repository_secret(
    namespace: &str,
    name: &str,
    registry_url: &str,
    username: &str,
    password: &str,
) -> Secret {
    argocd_secret(
        namespace,
        name,
        BTreeMap::from([
            ("url".into(), strip_scheme(registry_url).to_owned()),
            ("enableOCI".into(), "true".into()),
            ("project".into(), "default".into()),
            ("type".into(), "helm".into()),
            ("username".into(), username.to_owned()),
            ("password".into(), password.to_owned()),
            ("insecure".into(), "true".into()),
        ]),
    )
}

/// `https://harbor.example.com/` → `harbor.example.com`
pub fn strip_scheme(url: &str) -> &str {
    url.split_once("://")
        .map_or(url, |(_, rest)| rest)
        .trim_end_matches('/')
}
