#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret {0} has no namespace")]
    MissingNamespace(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}
