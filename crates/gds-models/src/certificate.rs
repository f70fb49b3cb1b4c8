//! Issued certificate records
//!
//! A [`Certificate`] is the immutable metadata record of a successfully
//! issued identity certificate. The PKCS#12 bundle itself never touches the
//! directory store; it lives in the secret vault under the certificate
//! request's scope.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateState {
    Issued,
    Revoked,
}

/// Distinguished name fields parsed from an X.509 subject or issuer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateName {
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub organizational_unit: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub country: String,
}

/// Parsed X.509 payload carried on both the VASP record (as the identity
/// certificate and the signing certificate history) and the [`Certificate`]
/// entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateDetails {
    pub version: i64,
    pub serial_number: String,
    /// Base64-encoded signature bytes from the leaf certificate
    pub signature: String,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub subject: CertificateName,
    pub issuer: CertificateName,
    /// RFC3339 validity bounds
    pub not_before: String,
    pub not_after: String,
    /// Hex-encoded SHA-256 digest of the DER leaf
    pub fingerprint: String,
    #[serde(default)]
    pub revoked: bool,
    /// Base64-encoded DER of the leaf certificate
    pub data: String,
    /// PEM-encoded issuing chain
    #[serde(default)]
    pub chain: String,
}

/// Immutable record of one issued identity certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    /// The certificate request that produced this certificate
    pub request: String,
    /// The VASP the certificate identifies
    pub vasp: String,
    pub status: CertificateState,
    pub details: CertificateDetails,
}
