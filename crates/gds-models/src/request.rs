//! Certificate requests and the issuance pipeline state machine

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{append_entry, AuditLogEntry};
use crate::vasp::Vasp;

/// Status of a certificate request as it moves through the pipeline.
///
/// `CR_REJECTED` and `CR_ERRORED` are prefixed on the wire to distinguish
/// them from the VASP-level REJECTED state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateRequestState {
    #[default]
    Initialized,
    ReadyToSubmit,
    Processing,
    Downloading,
    Downloaded,
    Completed,
    CrRejected,
    CrErrored,
}

impl CertificateRequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::CrRejected | Self::CrErrored)
    }

    /// Wire name of the state, e.g. `READY_TO_SUBMIT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "INITIALIZED",
            Self::ReadyToSubmit => "READY_TO_SUBMIT",
            Self::Processing => "PROCESSING",
            Self::Downloading => "DOWNLOADING",
            Self::Downloaded => "DOWNLOADED",
            Self::Completed => "COMPLETED",
            Self::CrRejected => "CR_REJECTED",
            Self::CrErrored => "CR_ERRORED",
        }
    }
}

impl std::fmt::Display for CertificateRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issuance attempt for a VASP.
///
/// Created by the registration API, then owned exclusively by the
/// certificate manager once it leaves `READY_TO_SUBMIT`. The batch fields
/// mirror what the certificate authority assigned and are empty until
/// submission succeeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub id: String,
    /// Owning VASP id; every request references an existing VASP
    pub vasp: String,
    pub common_name: String,
    /// CA profile this request is submitted under
    #[serde(default)]
    pub profile: String,
    /// Profile parameters forwarded to the CA batch submission
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub authority_id: i64,
    #[serde(default)]
    pub batch_id: i64,
    #[serde(default)]
    pub order_number: i64,
    /// RFC3339 batch creation time reported by the CA
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub batch_name: String,
    #[serde(default)]
    pub batch_status: String,
    #[serde(default)]
    pub reject_reason: String,
    /// Issued certificate id, set when the request reaches COMPLETED
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub status: CertificateRequestState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_log: Vec<AuditLogEntry<CertificateRequestState>>,
}

impl CertificateRequest {
    /// Create a request for the given VASP in `INITIALIZED`, recording the
    /// creation on the request audit log.
    pub fn new(vasp: &Vasp, profile: &str, source: &str) -> Self {
        let mut request = CertificateRequest {
            id: Uuid::new_v4().to_string(),
            vasp: vasp.id.clone(),
            common_name: vasp.common_name.clone(),
            profile: profile.to_owned(),
            status: CertificateRequestState::Initialized,
            ..Default::default()
        };
        append_entry(
            &mut request.audit_log,
            CertificateRequestState::Initialized,
            CertificateRequestState::Initialized,
            "certificate request created",
            source,
        );
        request
    }

    /// Transition the request state machine, appending exactly one audit
    /// entry. Self-transitions are permitted so that PROCESSING ticks can
    /// record batch status changes observed at the CA.
    pub fn update_status(
        &mut self,
        state: CertificateRequestState,
        description: &str,
        source: &str,
    ) {
        append_entry(&mut self.audit_log, self.status, state, description, source);
        self.status = state;
    }
}
