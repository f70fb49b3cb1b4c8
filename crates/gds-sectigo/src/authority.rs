//! The pluggable certificate authority contract

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BatchResponse, ProcessingInfo};

/// Contract the certificate manager drives the issuance pipeline against.
///
/// A batch is the CA's unit of enrollment; one certificate request maps to
/// exactly one batch. All methods are read-only against CA state except
/// [`submit_batch`], which creates a batch.
///
/// [`submit_batch`]: CertificateAuthority::submit_batch
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Number of certificates the account may still order. Submissions are
    /// deferred while the balance is zero.
    async fn user_available_balance(&self) -> Result<i64>;

    /// Create a single-certificate batch under the named profile.
    ///
    /// Implementations validate the parameter map against the profile
    /// before the submission leaves the process.
    async fn submit_batch(
        &self,
        profile: &str,
        params: &HashMap<String, String>,
    ) -> Result<BatchResponse>;

    /// Full batch record, including its status when the CA can render one.
    async fn batch_detail(&self, batch_id: i64) -> Result<BatchResponse>;

    /// Status-only fallback for batches whose detail payload carries no
    /// status.
    async fn batch_status(&self, batch_id: i64) -> Result<String>;

    /// Enrollment counters used to decide whether a batch is still active,
    /// succeeded, or failed.
    async fn batch_processing_info(&self, batch_id: i64) -> Result<ProcessingInfo>;

    /// Download the PKCS#12 bundle for a successfully processed batch.
    async fn download(&self, batch_id: i64) -> Result<Vec<u8>>;
}
