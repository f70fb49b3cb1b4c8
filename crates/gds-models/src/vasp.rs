//! VASP registration records, contacts, and the verification state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{append_entry, AuditLogEntry};
use crate::certificate::CertificateDetails;
use crate::error::ModelError;
use crate::ivms101::{BusinessCategory, LegalPerson, TrixoQuestionnaire};

/// Verification status of a VASP in the directory.
///
/// The ordering of the variants follows the registration workflow; variant
/// comparisons (`status > Submitted`) are meaningful and used by handlers to
/// decide whether the review process has already begun.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    #[default]
    NoVerification,
    Submitted,
    EmailVerified,
    PendingReview,
    Reviewed,
    IssuingCertificate,
    Verified,
    Rejected,
    Revoked,
}

impl VerificationState {
    /// Terminal states accept no further workflow transitions (revocation of
    /// a verified VASP is handled by a separate administrative process).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Rejected | Self::Revoked)
    }

    /// Wire name of the state, e.g. `PENDING_REVIEW`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoVerification => "NO_VERIFICATION",
            Self::Submitted => "SUBMITTED",
            Self::EmailVerified => "EMAIL_VERIFIED",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Reviewed => "REVIEWED",
            Self::IssuingCertificate => "ISSUING_CERTIFICATE",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
            Self::Revoked => "REVOKED",
        }
    }
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four named contact slots on a VASP record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Legal,
    Administrative,
    Technical,
    Billing,
}

impl std::fmt::Display for ContactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Legal => "legal",
            Self::Administrative => "administrative",
            Self::Technical => "technical",
            Self::Billing => "billing",
        })
    }
}

/// One email sent to a contact, recorded on the contact itself so that
/// duplicate sends can be suppressed across process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Template name, e.g. `verify_contact` or `deliver_certs`
    pub reason: String,
    pub recipient: String,
    /// Record the send is tied to (a certificate request id), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Contact verification state and send history, persisted as an extra-data
/// side table for wire compatibility with the TRISA models schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactExtra {
    /// Outstanding verification token; a contact with a non-empty token is
    /// unverified and the token is single-use.
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "email-log", default, skip_serializing_if = "Vec::is_empty")]
    pub email_log: Vec<EmailLogEntry>,
}

/// A single point of contact on a VASP registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub extra: ContactExtra,
}

impl Contact {
    /// A contact whose payload fields are all empty carries no information
    /// and is normalized away at registration.
    pub fn is_zero(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.phone.is_empty()
    }

    /// Assign a fresh verification token, marking the contact unverified.
    pub fn issue_token(&mut self, token: String) {
        self.extra.verification_token = Some(token);
        self.extra.verified = false;
    }

    /// Clear the outstanding token and mark the contact verified.
    pub fn mark_verified(&mut self) {
        self.extra.verification_token = None;
        self.extra.verified = true;
    }

    pub fn token(&self) -> Option<&str> {
        self.extra.verification_token.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        self.extra.verified
    }

    /// Append a send record to the contact's email log.
    pub fn log_email(&mut self, reason: &str, reference: Option<&str>) {
        self.extra.email_log.push(EmailLogEntry {
            timestamp: Utc::now(),
            reason: reason.to_owned(),
            recipient: self.email.clone(),
            reference: reference.map(str::to_owned),
        });
    }

    /// True when the send log already records an email for this template
    /// (and reference, when one is supplied).
    pub fn has_email_log(&self, reason: &str, reference: Option<&str>) -> bool {
        self.extra
            .email_log
            .iter()
            .any(|entry| entry.reason == reason && entry.reference.as_deref() == reference)
    }
}

/// The contacts aggregate with its four named slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<Contact>,
}

impl Contacts {
    /// Replace zero-payload contacts with `None` so that empty records are
    /// never persisted.
    pub fn normalize(&mut self) {
        for slot in [
            &mut self.legal,
            &mut self.administrative,
            &mut self.technical,
            &mut self.billing,
        ] {
            if slot.as_ref().is_some_and(Contact::is_zero) {
                *slot = None;
            }
        }
    }

    /// Iterate present contacts in the fixed courier order:
    /// legal, administrative, technical, billing.
    pub fn iter(&self) -> impl Iterator<Item = (ContactKind, &Contact)> {
        [
            (ContactKind::Legal, self.legal.as_ref()),
            (ContactKind::Administrative, self.administrative.as_ref()),
            (ContactKind::Technical, self.technical.as_ref()),
            (ContactKind::Billing, self.billing.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, contact)| contact.map(|c| (kind, c)))
    }

    /// Mutable variant of [`Contacts::iter`], same fixed order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ContactKind, &mut Contact)> {
        [
            (ContactKind::Legal, self.legal.as_mut()),
            (ContactKind::Administrative, self.administrative.as_mut()),
            (ContactKind::Technical, self.technical.as_mut()),
            (ContactKind::Billing, self.billing.as_mut()),
        ]
        .into_iter()
        .filter_map(|(kind, contact)| contact.map(|c| (kind, c)))
    }

    /// First contact email in courier order. Every registration must carry
    /// at least one; a contacts aggregate without an email is invalid.
    pub fn contact_email(&self) -> Result<&str, ModelError> {
        self.iter()
            .map(|(_, contact)| contact.email.as_str())
            .find(|email| !email.is_empty())
            .ok_or(ModelError::NoContactEmail)
    }

    /// Number of contacts already verified.
    pub fn verified_count(&self) -> usize {
        self.iter().filter(|(_, c)| c.is_verified()).count()
    }
}

/// Extra-data side tables on the VASP record, keyed by well-known strings on
/// the wire but exposed as typed fields to the rest of the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaspExtra {
    #[serde(rename = "certificate-request-ids", default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_request_ids: Vec<String>,
    #[serde(rename = "certificate-ids", default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_ids: Vec<String>,
    #[serde(
        rename = "admin-verification-token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub admin_verification_token: Option<String>,
    #[serde(rename = "audit-log", default, skip_serializing_if = "Vec::is_empty")]
    pub audit_log: Vec<AuditLogEntry<VerificationState>>,
    /// Send-log for mail addressed to the directory admins rather than a
    /// contact (review requests)
    #[serde(rename = "email-log", default, skip_serializing_if = "Vec::is_empty")]
    pub email_log: Vec<EmailLogEntry>,
}

/// One directory member: a Virtual Asset Service Provider registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vasp {
    /// Stable UUIDv4 identifier assigned by the store at creation
    #[serde(default)]
    pub id: String,
    /// The directory that owns this record
    pub registered_directory: String,
    /// DNS-form identifier on the issued certificate; unique per directory
    pub common_name: String,
    /// Compliance messaging endpoint of form `host:port`
    pub trisa_endpoint: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub business_category: BusinessCategory,
    #[serde(default)]
    pub vasp_categories: Vec<String>,
    #[serde(default)]
    pub established_on: String,
    #[serde(default)]
    pub entity: LegalPerson,
    #[serde(default)]
    pub contacts: Contacts,
    #[serde(default)]
    pub trixo: TrixoQuestionnaire,
    #[serde(default)]
    pub verification_status: VerificationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_certificate: Option<CertificateDetails>,
    /// Append-only history of signing certificates; the last entry is the
    /// certificate peers should currently trust.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_certificates: Vec<CertificateDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_listed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: VaspExtra,
}

impl Vasp {
    /// Registered legal name of the VASP, when the entity payload has one.
    pub fn name(&self) -> Option<&str> {
        self.entity.name()
    }

    /// Transition the verification state machine, appending exactly one
    /// audit entry. `source` is the actor's email address or
    /// [`crate::audit::AUTOMATED`].
    pub fn update_verification_status(
        &mut self,
        state: VerificationState,
        description: &str,
        source: &str,
    ) {
        append_entry(
            &mut self.extra.audit_log,
            self.verification_status,
            state,
            description,
            source,
        );
        self.verification_status = state;
        self.last_updated = Some(Utc::now());
    }

    pub fn audit_log(&self) -> &[AuditLogEntry<VerificationState>] {
        &self.extra.audit_log
    }

    /// Record a certificate request id on the VASP's extra data.
    pub fn append_cert_req_id(&mut self, id: &str) {
        if !self.extra.certificate_request_ids.iter().any(|r| r == id) {
            self.extra.certificate_request_ids.push(id.to_owned());
        }
    }

    /// Record an issued certificate id on the VASP's extra data.
    pub fn append_cert_id(&mut self, id: &str) {
        if !self.extra.certificate_ids.iter().any(|c| c == id) {
            self.extra.certificate_ids.push(id.to_owned());
        }
    }

    pub fn set_admin_token(&mut self, token: String) {
        self.extra.admin_verification_token = Some(token);
    }

    /// Consume the single-use admin verification token.
    pub fn take_admin_token(&mut self) -> Option<String> {
        self.extra.admin_verification_token.take()
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.extra.admin_verification_token.as_deref()
    }

    /// Append a send record for admin-directed mail.
    pub fn log_email(&mut self, reason: &str, recipient: &str, reference: Option<&str>) {
        self.extra.email_log.push(EmailLogEntry {
            timestamp: Utc::now(),
            reason: reason.to_owned(),
            recipient: recipient.to_owned(),
            reference: reference.map(str::to_owned),
        });
    }

    /// True when admin-directed mail for this template (and reference) was
    /// already sent.
    pub fn has_email_log(&self, reason: &str, reference: Option<&str>) -> bool {
        self.extra
            .email_log
            .iter()
            .any(|entry| entry.reason == reason && entry.reference.as_deref() == reference)
    }
}
