//! Admin review decisions
//!
//! Review decisions arrive over a separate authenticated channel bearing
//! the single-use admin verification token minted when the first contact
//! verified. Approval moves the VASP to REVIEWED, where the certificate
//! manager picks it up; rejection is terminal and causes the manager to
//! reject the outstanding certificate request (and notify the contacts) on
//! its next tick.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use gds_models::VerificationState;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::storage::DirectoryStore;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub admin_verification_token: String,
    #[serde(default)]
    pub accept: bool,
    #[serde(default)]
    pub reject_reason: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewReply {
    pub status: VerificationState,
    pub message: String,
}

/// Apply an administrator's registration review decision.
///
/// POST /v1/review
pub async fn review(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewReply>, ApiError> {
    if request.admin_verification_token.is_empty() {
        return Err(ApiError::InvalidArgument(
            "the admin verification token is required to review a registration".into(),
        ));
    }
    if !request.accept && request.reject_reason.is_empty() {
        return Err(ApiError::InvalidArgument(
            "must specify a reason when rejecting a registration".into(),
        ));
    }

    let mut vasp = state.store.retrieve_vasp(&request.id).await.map_err(|err| {
        warn!(id = %request.id, error = %err, "could not retrieve vasp for review");
        ApiError::NotFound("could not find VASP record by ID".into())
    })?;

    // The certificate manager owns the VASP while a certificate is being
    // issued; administrative decisions wait until the request terminates.
    if vasp.verification_status == VerificationState::IssuingCertificate {
        return Err(ApiError::FailedPrecondition(
            "certificate issuance is in progress, cannot review registration".into(),
        ));
    }
    if vasp.verification_status.is_terminal() {
        return Err(ApiError::FailedPrecondition(format!(
            "registration is already {}",
            vasp.verification_status
        )));
    }
    if request.accept && vasp.verification_status != VerificationState::PendingReview {
        return Err(ApiError::FailedPrecondition(
            "registration is not pending review".into(),
        ));
    }

    match vasp.admin_token() {
        Some(token) if token == request.admin_verification_token => {}
        _ => {
            warn!(vasp = %vasp.id, "invalid admin verification token");
            return Err(ApiError::InvalidArgument(
                "invalid admin verification token".into(),
            ));
        }
    }

    // The token is single-use: consume it whichever way the decision goes.
    vasp.take_admin_token();
    let admin = state.config.email.admin_email.clone();

    let message = if request.accept {
        vasp.update_verification_status(
            VerificationState::Reviewed,
            "registration request approved",
            &admin,
        );
        "registration approved, certificate issuance will begin shortly"
    } else {
        vasp.update_verification_status(VerificationState::Rejected, &request.reject_reason, &admin);
        "registration rejected"
    };

    state.store.update_vasp(&vasp).await?;
    info!(vasp = %vasp.id, accept = request.accept, "registration review applied");

    Ok(Json(ReviewReply {
        status: vasp.verification_status,
        message: message.into(),
    }))
}
