//! Sectigo certificate authority client
//!
//! The directory issues identity certificates through a commercial CA that
//! operates a batch enrollment API: a submission creates a batch, the batch
//! is polled until it has been processed, and the resulting PKCS#12 bundle
//! is downloaded. This crate exposes that surface behind the
//! [`CertificateAuthority`] trait so the certificate manager can be driven
//! against [`MockAuthority`] in tests and against [`SectigoClient`] in
//! production.

pub mod authority;
pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use authority::CertificateAuthority;
pub use client::SectigoClient;
pub use error::CaError;
pub use mock::{fabricate_pkcs12, MockAuthority};
pub use types::{BatchResponse, ProcessingInfo};
