//! Secret vault abstraction
//!
//! PKCS#12 passwords and issued certificate bundles never touch the
//! directory store; they live in a vault under a scope bound to the
//! certificate request identifier, so that the password and the bundle it
//! decrypts are garbage-collectable as a unit. Each named secret is a
//! stream of immutable versions; writers only ever append.

pub mod memory;

pub use memory::MemoryVault;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Secret name for the PKCS#12 decryption password (16 ASCII bytes).
pub const PASSWORD_SECRET: &str = "password";
/// Secret name for the downloaded PKCS#12 bundle.
pub const CERT_SECRET: &str = "cert";

/// Error type for vault operations
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("no versions of secret {name} in scope {scope}")]
    NotFound { scope: String, name: String },

    #[error("secret vault error: {0}")]
    Internal(String),
}

/// Versioned secret storage scoped per certificate request.
///
/// `create` and `delete_scope` are idempotent; `add_version` always appends
/// a new immutable version; `latest_version` fails with
/// [`SecretsError::NotFound`] when no version exists.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Ensure the named secret exists within the scope.
    async fn create(&self, scope: &str, name: &str) -> Result<(), SecretsError>;

    /// Append a new version to an existing secret.
    async fn add_version(
        &self,
        scope: &str,
        name: &str,
        payload: Vec<u8>,
    ) -> Result<(), SecretsError>;

    /// The most recently appended version of the secret.
    async fn latest_version(&self, scope: &str, name: &str) -> Result<Vec<u8>, SecretsError>;

    /// Drop every secret in the scope.
    async fn delete_scope(&self, scope: &str) -> Result<(), SecretsError>;
}

/// Generate an alphanumeric token of the given length, used for contact
/// verification tokens (48), admin review tokens (48), and PKCS#12
/// passwords (16).
pub fn create_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
