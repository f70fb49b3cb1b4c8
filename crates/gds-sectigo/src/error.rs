//! Error types for the certificate authority client

use thiserror::Error;

/// Result type for certificate authority operations
pub type Result<T> = std::result::Result<T, CaError>;

/// Errors returned by the certificate authority surface.
///
/// The certificate manager treats every variant as retryable at the next
/// tick; [`CaError::is_transient`] distinguishes transport noise from
/// submissions that will keep failing until the request itself is fixed.
#[derive(Error, Debug)]
pub enum CaError {
    /// Transport-level failure reaching the CA
    #[error("certificate authority unreachable: {0}")]
    Http(String),

    /// The CA answered with a non-success HTTP status
    #[error("certificate authority returned status {0}")]
    Status(u16),

    /// Authentication against the CA failed
    #[error("could not authenticate with certificate authority: {0}")]
    Authentication(String),

    /// The batch payload could not be decoded
    #[error("could not decode certificate authority response: {0}")]
    Decode(String),

    /// The profile name is not known to this client
    #[error("unknown certificate profile: {0}")]
    UnknownProfile(String),

    /// A parameter the profile requires is absent from the submission
    #[error("missing required batch parameter: {0}")]
    MissingParameter(&'static str),
}

impl CaError {
    /// True for failures expected to clear on their own (timeouts, gateway
    /// errors); false for submissions the operator must correct.
    pub fn is_transient(&self) -> bool {
        !matches!(self, CaError::UnknownProfile(_) | CaError::MissingParameter(_))
    }
}

impl From<reqwest::Error> for CaError {
    fn from(err: reqwest::Error) -> Self {
        CaError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for CaError {
    fn from(err: serde_json::Error) -> Self {
        CaError::Decode(err.to_string())
    }
}
