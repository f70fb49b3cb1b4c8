//! Domain models for the TRISA Global Directory Service
//!
//! This crate holds the wire-compatible records the directory persists and
//! exchanges: VASP registrations with their contacts and audit history,
//! certificate requests moving through the issuance pipeline, and issued
//! certificate metadata. It performs no I/O; the server crate owns storage,
//! secrets, email, and the certificate authority client.
//!
//! ## State machines
//!
//! Two append-only audit logs drive the core workflow:
//!
//! 1. **VASP verification**: `NO_VERIFICATION → SUBMITTED → EMAIL_VERIFIED →
//!    PENDING_REVIEW → REVIEWED → ISSUING_CERTIFICATE → VERIFIED`, with
//!    `REJECTED` reachable from any non-terminal state by an administrator.
//! 2. **Certificate request**: `INITIALIZED → READY_TO_SUBMIT → PROCESSING →
//!    DOWNLOADING → DOWNLOADED → COMPLETED`, with the terminal error states
//!    `CR_REJECTED` and `CR_ERRORED`.
//!
//! A state change always appends exactly one audit entry and vice versa.

pub mod audit;
pub mod certificate;
pub mod error;
pub mod ivms101;
pub mod request;
pub mod validation;
pub mod vasp;

pub use audit::{AuditLogEntry, AUTOMATED};
pub use certificate::{Certificate, CertificateDetails, CertificateName, CertificateState};
pub use error::ModelError;
pub use ivms101::{BusinessCategory, LegalPerson, TrixoQuestionnaire};
pub use request::{CertificateRequest, CertificateRequestState};
pub use validation::{validate_common_name, validate_endpoint};
pub use vasp::{Contact, ContactKind, Contacts, EmailLogEntry, Vasp, VerificationState};
