//! Register handler
//!
//! Registration is the entry point of the issuance pipeline: it creates the
//! VASP record in SUBMITTED, issues contact verification tokens, prepares a
//! certificate request in READY_TO_SUBMIT, stores a fresh PKCS#12 password
//! in the vault, and mails the contacts. Side effects are ordered so that
//! each is durable before the next is attempted; a failed registration can
//! be retried whole.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use gds_models::{
    validate_common_name, validate_endpoint, validation::endpoint_host, BusinessCategory,
    CertificateRequest, CertificateRequestState, Contacts, LegalPerson, TrixoQuestionnaire, Vasp,
    VerificationState,
};
use gds_sectigo::types::PARAM_COMMON_NAME;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::secrets::{create_token, SecretVault, PASSWORD_SECRET};
use crate::storage::{DirectoryStore, StorageError};

/// Length of contact and admin verification tokens.
pub const VERIFICATION_TOKEN_LENGTH: usize = 48;
/// Length of the generated PKCS#12 password.
pub const PKCS12_PASSWORD_LENGTH: usize = 16;

const REGISTER_MESSAGE: &str = "a verification code has been sent to contact emails, \
    please check spam folder if it has not arrived; pkcs12 password attached, this is \
    the only time it will be available -- do not lose!";

/// Registration request submitted by a prospective directory member.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub entity: LegalPerson,
    #[serde(default)]
    pub contacts: Contacts,
    /// Compliance messaging endpoint of the form `host:port`
    #[serde(default)]
    pub trisa_endpoint: String,
    /// Optional; derived from the endpoint host when absent
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub business_category: BusinessCategory,
    #[serde(default)]
    pub vasp_categories: Vec<String>,
    #[serde(default)]
    pub established_on: String,
    #[serde(default)]
    pub trixo: TrixoQuestionnaire,
}

#[derive(Debug, Serialize)]
pub struct RegisterReply {
    pub id: String,
    pub registered_directory: String,
    pub common_name: String,
    pub status: VerificationState,
    pub message: String,
    /// Returned exactly once; the plaintext is retained only in the vault.
    pub pkcs12password: String,
}

/// Register a new VASP with the directory service.
///
/// POST /v1/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterReply>, ApiError> {
    // Validate the TRISA endpoint before anything is written.
    if request.trisa_endpoint.is_empty() {
        warn!("missing endpoint in registration request");
        return Err(ApiError::InvalidArgument("no endpoint supplied".into()));
    }
    if let Err(err) = validate_endpoint(&request.trisa_endpoint) {
        warn!(endpoint = %request.trisa_endpoint, error = %err, "invalid endpoint");
        return Err(ApiError::InvalidArgument("invalid endpoint supplied".into()));
    }

    // Compute the common name from the endpoint when not specified.
    let common_name = if request.common_name.is_empty() {
        match endpoint_host(&request.trisa_endpoint) {
            Ok(host) => host.to_owned(),
            Err(err) => {
                warn!(error = %err, "could not parse common name from endpoint");
                return Err(ApiError::InvalidArgument(
                    "no common name supplied, could not parse common name from endpoint".into(),
                ));
            }
        }
    } else {
        if let Err(err) = validate_common_name(&request.common_name) {
            warn!(common_name = %request.common_name, error = %err, "invalid common name");
            return Err(ApiError::InvalidArgument("invalid common name supplied".into()));
        }
        request.common_name.clone()
    };

    let mut vasp = Vasp {
        registered_directory: state.config.directory_id.clone(),
        common_name,
        trisa_endpoint: request.trisa_endpoint,
        website: request.website,
        business_category: request.business_category,
        vasp_categories: request.vasp_categories,
        established_on: request.established_on,
        entity: request.entity,
        contacts: request.contacts,
        trixo: request.trixo,
        verification_status: VerificationState::NoVerification,
        ..Default::default()
    };

    // Zero-valued contacts carry no information; drop them before looking
    // for a usable email address.
    vasp.contacts.normalize();
    let email = match vasp.contacts.contact_email() {
        Ok(email) => email.to_owned(),
        Err(err) => {
            warn!("no contact email address found in registration");
            return Err(ApiError::InvalidArgument(err.to_string()));
        }
    };

    vasp.update_verification_status(
        VerificationState::Submitted,
        "register request received",
        &email,
    );

    let mut vasp = match state.store.create_vasp(vasp).await {
        Ok(vasp) => vasp,
        Err(StorageError::AlreadyExists(_)) => {
            return Err(ApiError::AlreadyExists(
                "could not complete registration, uniqueness constraints violated".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    info!(id = %vasp.id, name = vasp.name(), "registered VASP");

    // Issue verification tokens to every contact and persist them before
    // any email leaves the building.
    for (_, contact) in vasp.contacts.iter_mut() {
        contact.issue_token(create_token(VERIFICATION_TOKEN_LENGTH));
    }
    if let Err(err) = state.store.update_vasp(&vasp).await {
        error!(vasp = %vasp.id, error = %err, "could not persist contact verification tokens");
        return Err(ApiError::Aborted(
            "could not send contact verification emails".into(),
        ));
    }

    // Create the certificate request and hand it straight to the manager's
    // queue; the VASP state machine gates actual submission.
    let password = create_token(PKCS12_PASSWORD_LENGTH);
    let mut cert_req = CertificateRequest::new(&vasp, &state.config.sectigo.profile, &email);
    cert_req
        .params
        .insert(PARAM_COMMON_NAME.into(), vasp.common_name.clone());
    cert_req.update_status(
        CertificateRequestState::ReadyToSubmit,
        "certificate request ready to submit",
        &email,
    );
    if let Err(err) = state.store.create_cert_req(&cert_req).await {
        error!(vasp = %vasp.id, error = %err, "could not save certificate request");
        return Err(ApiError::Internal(
            "internal error with registration, please contact admins".into(),
        ));
    }

    // Store the PKCS#12 password in the vault under the request's scope.
    // The reply below is the only other place the plaintext ever appears.
    if let Err(err) = state.vault.create(&cert_req.id, PASSWORD_SECRET).await {
        error!(vasp = %vasp.id, error = %err, "could not create secret for pkcs12 password");
        return Err(ApiError::Internal(
            "internal error with registration, please contact admins".into(),
        ));
    }
    if let Err(err) = state
        .vault
        .add_version(&cert_req.id, PASSWORD_SECRET, password.clone().into_bytes())
        .await
    {
        error!(vasp = %vasp.id, error = %err, "unable to add secret version for pkcs12 password");
        return Err(ApiError::Internal(
            "internal error with registration, please contact admins".into(),
        ));
    }

    // Link the request onto the VASP record.
    vasp.append_cert_req_id(&cert_req.id);
    if let Err(err) = state.store.update_vasp(&vasp).await {
        error!(vasp = %vasp.id, error = %err, "could not update vasp with certificate request ID");
        return Err(ApiError::Internal(
            "internal error with registration, please contact admins".into(),
        ));
    }

    // Start the verification process. Email failure alerts the admins who
    // can resend later; it does not abort the registration.
    let sent = state.courier.send_verify_contacts(&mut vasp).await;
    if sent > 0 {
        if let Err(err) = state.store.update_vasp(&vasp).await {
            error!(vasp = %vasp.id, error = %err, "could not update email logs on vasp");
            return Err(ApiError::Aborted("could not update vasp record".into()));
        }
    } else {
        error!(vasp = %vasp.id, "could not send verify contacts emails");
    }

    Ok(Json(RegisterReply {
        id: vasp.id,
        registered_directory: vasp.registered_directory,
        common_name: vasp.common_name,
        status: vasp.verification_status,
        message: REGISTER_MESSAGE.into(),
        pkcs12password: password,
    }))
}
