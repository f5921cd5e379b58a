use std::fmt;

use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::rand_core::OsRng;
use ssh_key::{LineEnding, PrivateKey};

use crate::error::ReconcileError;

pub const DEPLOY_KEY_BITS: usize = 4096;
pub const DEPLOY_KEY_TITLE: &str = "GitOps Deployment Key";

/// Ephemeral SSH keypair. The private half is consumed by exactly one secret.
pub struct KeyPair {
    private_key: String,
    public_key: String,
}

impl KeyPair {
    pub fn new(private_key: String, public_key: String) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    /// `authorized_keys` form of the public half.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Hand over the private half; the pair is gone afterwards.
    pub fn into_private_key(self) -> String {
        self.private_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Source of deploy keys. Blocking; callers run it off the async executor.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> Result<KeyPair, ReconcileError>;
}

/// RSA keys in OpenSSH encoding.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyGenerator {
    bits: usize,
}

impl RsaKeyGenerator {
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }
}

impl Default for RsaKeyGenerator {
    fn default() -> Self {
        Self::new(DEPLOY_KEY_BITS)
    }
}

impl KeyGenerator for RsaKeyGenerator {
    fn generate(&self) -> Result<KeyPair, ReconcileError> {
        let keygen_err = |e: ssh_key::Error| ReconcileError::KeyGeneration(e.to_string());

        let rsa = RsaKeypair::random(&mut OsRng, self.bits).map_err(keygen_err)?;
        let private = PrivateKey::new(KeypairData::from(rsa), DEPLOY_KEY_TITLE).map_err(keygen_err)?;
        let private_key = private.to_openssh(LineEnding::LF).map_err(keygen_err)?;
        let public_key = private.public_key().to_openssh().map_err(keygen_err)?;

        Ok(KeyPair::new(private_key.as_str().to_owned(), public_key))
    }
}
