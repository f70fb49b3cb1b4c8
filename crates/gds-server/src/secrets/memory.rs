//! In-memory secret vault backend

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use super::{SecretVault, SecretsError};

/// In-memory vault implementation for development and tests.
#[derive(Default)]
pub struct MemoryVault {
    // (scope, name) → ordered versions, oldest first
    secrets: RwLock<HashMap<(String, String), Vec<Vec<u8>>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn create(&self, scope: &str, name: &str) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.write().unwrap();
        secrets
            .entry((scope.to_owned(), name.to_owned()))
            .or_default();
        debug!(scope = scope, name = name, "created secret");
        Ok(())
    }

    async fn add_version(
        &self,
        scope: &str,
        name: &str,
        payload: Vec<u8>,
    ) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.write().unwrap();
        let versions = secrets
            .get_mut(&(scope.to_owned(), name.to_owned()))
            .ok_or_else(|| SecretsError::NotFound {
                scope: scope.to_owned(),
                name: name.to_owned(),
            })?;
        versions.push(payload);
        debug!(scope = scope, name = name, versions = versions.len(), "added secret version");
        Ok(())
    }

    async fn latest_version(&self, scope: &str, name: &str) -> Result<Vec<u8>, SecretsError> {
        let secrets = self.secrets.read().unwrap();
        secrets
            .get(&(scope.to_owned(), name.to_owned()))
            .and_then(|versions| versions.last().cloned())
            .ok_or_else(|| SecretsError::NotFound {
                scope: scope.to_owned(),
                name: name.to_owned(),
            })
    }

    async fn delete_scope(&self, scope: &str) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.write().unwrap();
        secrets.retain(|(s, _), _| s != scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{CERT_SECRET, PASSWORD_SECRET};

    #[tokio::test]
    async fn versions_append_and_latest_wins() {
        let vault = MemoryVault::new();
        vault.create("req-1", PASSWORD_SECRET).await.unwrap();
        vault
            .add_version("req-1", PASSWORD_SECRET, b"first".to_vec())
            .await
            .unwrap();
        vault
            .add_version("req-1", PASSWORD_SECRET, b"second".to_vec())
            .await
            .unwrap();

        let latest = vault.latest_version("req-1", PASSWORD_SECRET).await.unwrap();
        assert_eq!(latest, b"second");
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let vault = MemoryVault::new();
        vault.create("req-1", PASSWORD_SECRET).await.unwrap();
        vault
            .add_version("req-1", PASSWORD_SECRET, b"keep".to_vec())
            .await
            .unwrap();
        vault.create("req-1", PASSWORD_SECRET).await.unwrap();

        let latest = vault.latest_version("req-1", PASSWORD_SECRET).await.unwrap();
        assert_eq!(latest, b"keep", "re-creation must not clobber versions");
    }

    #[tokio::test]
    async fn empty_and_missing_secrets_are_not_found() {
        let vault = MemoryVault::new();
        assert!(matches!(
            vault.latest_version("req-1", PASSWORD_SECRET).await,
            Err(SecretsError::NotFound { .. })
        ));

        // Created but no version appended yet
        vault.create("req-1", CERT_SECRET).await.unwrap();
        assert!(matches!(
            vault.latest_version("req-1", CERT_SECRET).await,
            Err(SecretsError::NotFound { .. })
        ));

        // Appending to a secret that was never created is a caller bug
        assert!(matches!(
            vault.add_version("req-2", CERT_SECRET, vec![1]).await,
            Err(SecretsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_scope_drops_password_and_cert_together() {
        let vault = MemoryVault::new();
        vault.create("req-1", PASSWORD_SECRET).await.unwrap();
        vault
            .add_version("req-1", PASSWORD_SECRET, b"pw".to_vec())
            .await
            .unwrap();
        vault.create("req-1", CERT_SECRET).await.unwrap();
        vault
            .add_version("req-1", CERT_SECRET, b"bundle".to_vec())
            .await
            .unwrap();
        vault.create("req-2", PASSWORD_SECRET).await.unwrap();
        vault
            .add_version("req-2", PASSWORD_SECRET, b"other".to_vec())
            .await
            .unwrap();

        vault.delete_scope("req-1").await.unwrap();

        assert!(vault.latest_version("req-1", PASSWORD_SECRET).await.is_err());
        assert!(vault.latest_version("req-1", CERT_SECRET).await.is_err());
        assert!(vault.latest_version("req-2", PASSWORD_SECRET).await.is_ok());
    }
}
