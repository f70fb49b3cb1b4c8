//! Storage abstraction for the directory
//!
//! The directory persists three entity kinds: VASP registrations,
//! certificate requests, and issued certificate records. This module
//! provides a trait-based abstraction over that store so the service can
//! run against the in-memory backend in development and tests while
//! production deployments plug in a durable engine.
//!
//! Writes are atomic at single-record granularity only. Cross-record
//! consistency is achieved by callers ordering their writes so that partial
//! completion is safe on retry: write the child record before linking it
//! from the parent, and write the parent's new status last.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use gds_models::{Certificate, CertificateRequest, CertificateRequestState, Vasp};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("storage error: {0}")]
    Internal(String),
}

/// Search over the VASP secondary indices.
///
/// Keys combine conjunctively: a record matches when, for every non-empty
/// field, its indexed value is one of the candidates (disjunction within a
/// field). The `name` field matches both common names and registered legal
/// names.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub name: Vec<String>,
    pub website: Vec<String>,
    pub country: Vec<String>,
    pub category: Vec<String>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.website.is_empty()
            && self.country.is_empty()
            && self.category.is_empty()
    }
}

/// Storage backend trait for directory state
///
/// Implementations must be thread-safe and support concurrent access from
/// the registration API and the certificate manager.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    // =========================================================================
    // VASP registrations
    // =========================================================================

    /// Store a new VASP, assigning its identifier and listing timestamps.
    /// Fails with [`StorageError::AlreadyExists`] when the common name is
    /// already registered in the directory.
    async fn create_vasp(&self, vasp: Vasp) -> Result<Vasp, StorageError>;

    async fn retrieve_vasp(&self, id: &str) -> Result<Vasp, StorageError>;

    /// Replace the stored record and refresh its secondary indices.
    async fn update_vasp(&self, vasp: &Vasp) -> Result<(), StorageError>;

    /// Conjunctive search over the secondary indices; see [`SearchQuery`].
    async fn search_vasps(&self, query: &SearchQuery) -> Result<Vec<Vasp>, StorageError>;

    // =========================================================================
    // Certificate requests
    // =========================================================================

    async fn create_cert_req(&self, request: &CertificateRequest) -> Result<(), StorageError>;

    async fn retrieve_cert_req(&self, id: &str) -> Result<CertificateRequest, StorageError>;

    async fn update_cert_req(&self, request: &CertificateRequest) -> Result<(), StorageError>;

    /// List requests whose status is one of `statuses`; an empty filter
    /// returns every request.
    async fn list_cert_reqs(
        &self,
        statuses: &[CertificateRequestState],
    ) -> Result<Vec<CertificateRequest>, StorageError>;

    // =========================================================================
    // Issued certificates
    // =========================================================================

    async fn create_cert(&self, certificate: &Certificate) -> Result<(), StorageError>;

    async fn retrieve_cert(&self, id: &str) -> Result<Certificate, StorageError>;
}
