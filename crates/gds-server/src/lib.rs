//! TRISA Global Directory Service
//!
//! The directory is the authoritative registry of VASPs holding X.509
//! identity certificates for the TRISA compliance messaging network. This
//! crate wires the whole issuance pipeline together:
//!
//! - **Registration API** (`api`): accepts registrations, drives contact
//!   verification and the VASP state machine, serves the lookup/search
//!   read path and admin review decisions.
//! - **Certificate manager** (`certman`): the background worker that
//!   submits approved requests to the CA, polls batches, downloads issued
//!   bundles, and finalizes verification.
//! - **Directory store** (`storage`): trait-based persistence for VASPs,
//!   certificate requests, and certificates, with secondary search indices.
//! - **Secret vault** (`secrets`): versioned storage for PKCS#12 passwords
//!   and bundles, scoped per certificate request.
//! - **Email courier** (`emails`): templated, deduplicated outbound mail
//!   at every workflow transition.
//!
//! ## API Endpoints
//!
//! - `GET  /health` - liveness check
//! - `POST /v1/status` - peer health probe with a reschedule window
//! - `POST /v1/register` - register a VASP, returns the PKCS#12 password
//! - `POST /v1/verify-contact` - redeem a contact verification token
//! - `POST /v1/review` - admin approve/reject decision
//! - `GET  /v1/lookup` - directory listing by id or common name
//! - `POST /v1/search` - search over the directory indices
//! - `GET  /v1/verification` - verification status of a VASP

pub mod api;
pub mod certman;
pub mod config;
pub mod emails;
pub mod pkcs12;
pub mod secrets;
pub mod storage;

pub use api::{create_router, AppState};
pub use certman::CertificateManager;
pub use config::Config;
pub use emails::EmailCourier;
pub use secrets::{MemoryVault, SecretVault};
pub use storage::{DirectoryStore, MemoryStore};
