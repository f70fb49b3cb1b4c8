//! VerifyContact handler
//!
//! Contacts prove control of their mailbox by returning the single-use
//! token mailed at registration. The first verified contact moves the VASP
//! into the review process: `SUBMITTED → EMAIL_VERIFIED`, an admin token is
//! minted, the review request goes out, and the record lands in
//! `PENDING_REVIEW`. Later verifications only mark their contact.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use gds_models::VerificationState;

use crate::api::error::ApiError;
use crate::api::handlers::register::VERIFICATION_TOKEN_LENGTH;
use crate::api::AppState;
use crate::secrets::create_token;
use crate::storage::DirectoryStore;

#[derive(Debug, Default, Deserialize)]
pub struct VerifyContactRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyContactReply {
    pub status: VerificationState,
    pub message: String,
}

/// Verify a contact email address with the token it was sent.
///
/// POST /v1/verify-contact
pub async fn verify_contact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyContactRequest>,
) -> Result<Json<VerifyContactReply>, ApiError> {
    if request.token.is_empty() {
        warn!("no verification token supplied");
        return Err(ApiError::InvalidArgument(
            "could not verify contact: verification token missing from request".into(),
        ));
    }

    let mut vasp = state.store.retrieve_vasp(&request.id).await.map_err(|err| {
        warn!(id = %request.id, error = %err, "could not retrieve vasp");
        ApiError::NotFound("could not find associated VASP record by ID".into())
    })?;

    // Scan the contacts for the supplied token, counting contacts that were
    // verified before this call so the review request is only sent once.
    let mut prev_verified = 0;
    let mut contact_email: Option<String> = None;
    for (kind, contact) in vasp.contacts.iter_mut() {
        if contact.token() == Some(request.token.as_str()) {
            contact.mark_verified();
            contact_email = Some(contact.email.clone());
            info!(vasp = %vasp.id, contact = %kind, "contact email verified");
        } else if contact.is_verified() {
            prev_verified += 1;
        }
    }

    // A replayed token matches no contact: the first use cleared it.
    let contact_email = contact_email.ok_or_else(|| {
        warn!(vasp = %vasp.id, "could not find contact with token");
        ApiError::NotFound("could not find contact with the specified token".into())
    })?;

    // If another contact already verified, the review process has begun;
    // just save the newly verified contact.
    if prev_verified > 0 && vasp.verification_status > VerificationState::Submitted {
        state.store.update_vasp(&vasp).await.map_err(|err| {
            error!(vasp = %vasp.id, error = %err, "could not update VASP record after contact verification");
            ApiError::Internal("could not update contact after verification".into())
        })?;

        return Ok(Json(VerifyContactReply {
            status: vasp.verification_status,
            message: "email successfully verified".into(),
        }));
    }

    // First verification: mark the VASP email-verified and mint the
    // single-use admin review token.
    vasp.update_verification_status(
        VerificationState::EmailVerified,
        "completed email verification",
        &contact_email,
    );
    vasp.set_admin_token(create_token(VERIFICATION_TOKEN_LENGTH));
    state.store.update_vasp(&vasp).await.map_err(|err| {
        error!(vasp = %vasp.id, error = %err, "could not save admin verification token");
        ApiError::Aborted(
            "there was a problem submitting your registration review request, please contact the admins"
                .into(),
        )
    })?;

    // Ask the admins for a review. A failed send is critical but must not
    // fail the verification; operators can trigger a resend.
    if state.courier.send_review_request(&mut vasp).await == 0 {
        error!(vasp = %vasp.id, "could not send verification review email");
    }

    vasp.update_verification_status(
        VerificationState::PendingReview,
        "review email sent",
        &contact_email,
    );
    state.store.update_vasp(&vasp).await.map_err(|err| {
        error!(vasp = %vasp.id, error = %err, "could not update vasp status to pending review");
        ApiError::Internal(
            "there was a problem submitting your registration review request, please contact the admins"
                .into(),
        )
    })?;

    Ok(Json(VerifyContactReply {
        status: vasp.verification_status,
        message: "email successfully verified, registration review sent to admins".into(),
    }))
}
