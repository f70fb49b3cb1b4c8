//! Error types for directory models

use thiserror::Error;

/// Result type alias using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while validating or mutating directory records
#[derive(Error, Debug)]
pub enum ModelError {
    /// The TRISA endpoint could not be parsed as host:port
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The common name does not match the DNS label grammar
    #[error("invalid common name: {0}")]
    InvalidCommonName(String),

    /// No contact on the registration carries an email address
    #[error("no email address in supplied VASP contacts")]
    NoContactEmail,
}
