//! Moves freshly issued credentials from one system into Argo CD secrets.
//!
//! Both flows generate or receive a credential once, register it where
//! needed, and write it into a cluster secret that is never rotated.

pub mod error;
pub mod keys;
pub mod secrets;

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;

use crate::config::{GiteaConfig, Repository};
use crate::error::ReconcileError;
use crate::gitea::deploy_key;
use crate::harbor::robot::RobotCredential;
use crate::transport::RestClient;

use self::error::SecretError;
use self::keys::KeyGenerator;
use self::secrets::{ARGOCD_NAMESPACE, SecretOutcome, SecretStore};

pub struct CredentialBridge<S> {
    store: S,
    keys: Arc<dyn KeyGenerator>,
}

impl<S: SecretStore> CredentialBridge<S> {
    pub fn new(store: S, keys: Arc<dyn KeyGenerator>) -> Self {
        Self { store, keys }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create `secret` unless one with the same name already exists.
    #[tracing::instrument(skip(self, secret), fields(name = ?secret.metadata.name, namespace = ?secret.metadata.namespace), err)]
    pub async fn materialize(&self, secret: &Secret) -> Result<SecretOutcome, SecretError> {
        let outcome = self.store.create(secret).await?;
        match outcome {
            SecretOutcome::Created => tracing::info!("secret created"),
            SecretOutcome::AlreadyExists => tracing::info!("secret already exists, leaving it unchanged"),
        }
        Ok(outcome)
    }

    /// Write a robot credential as the OCI Helm repository secret `helm-<account>`.
    pub async fn materialize_robot_secret(
        &self,
        registry_url: &str,
        account_name: &str,
        credential: &RobotCredential,
    ) -> Result<SecretOutcome, SecretError> {
        let secret = secrets::helm_repository_secret(
            ARGOCD_NAMESPACE,
            &format!("helm-{account_name}"),
            registry_url,
            &credential.name,
            &credential.secret,
        );
        self.materialize(&secret).await
    }

    /// Generate a keypair, register its public half as a read-only deploy key
    /// and store the private half as `<repo>-deploy-key`.
    ///
    /// The key is generated exactly once per call; a failure after generation
    /// is reported, never retried with a second key.
    #[tracing::instrument(skip(self, gitea, config, repo), fields(org = %repo.organization, repo = %repo.name), err)]
    pub async fn provision_deploy_key(
        &self,
        gitea: &RestClient,
        config: &GiteaConfig,
        repo: &Repository,
    ) -> Result<SecretOutcome, ReconcileError> {
        let keys = Arc::clone(&self.keys);
        let pair = tokio::task::spawn_blocking(move || keys.generate())
            .await
            .map_err(|e| ReconcileError::KeyGeneration(e.to_string()))??;

        deploy_key::register(gitea, &repo.organization, &repo.name, pair.public_key()).await?;

        let secret = secrets::git_repository_secret(
            &config.namespace,
            &format!("{}-deploy-key", repo.name),
            &config.clone_url(&repo.organization, &repo.name),
            pair.into_private_key(),
        );
        Ok(self.materialize(&secret).await?)
    }
}
