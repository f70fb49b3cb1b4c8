//! End-to-end issuance pipeline scenarios
//!
//! Each test drives the public API router and the certificate manager
//! against the in-memory backends and the mock certificate authority,
//! covering the full register → verify → review → issue workflow and its
//! failure modes.

mod common;

use chrono::DateTime;
use serde_json::json;

use common::{get, harness, post_json, register_body, Harness};
use gds_models::{CertificateRequestState, CertificateState, VerificationState, AUTOMATED};
use gds_sectigo::types::{
    BATCH_STATUS_NOT_ACCEPTABLE, BATCH_STATUS_REJECTED, PARAM_COMMON_NAME,
    PARAM_LOCALITY_NAME, PARAM_ORGANIZATION_NAME, PARAM_PKCS12_PASSWORD,
    PARAM_STATE_OR_PROVINCE_NAME, PROFILE_CIPHER_TRACE_END_ENTITY,
};
use gds_server::emails::DELIVER_CERTS_SUBJECT;
use gds_server::secrets::{SecretVault, PASSWORD_SECRET};
use gds_server::storage::DirectoryStore;

/// Register the fixture VASP, returning (vasp id, request id, password).
async fn register(h: &Harness) -> (String, String, String) {
    let (status, reply) = post_json(&h.router, "/v1/register", register_body()).await;
    assert_eq!(status, 200, "register failed: {reply}");
    assert_eq!(reply["status"], "SUBMITTED");

    let vasp_id = reply["id"].as_str().unwrap().to_owned();
    let password = reply["pkcs12password"].as_str().unwrap().to_owned();

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    let req_id = vasp.extra.certificate_request_ids[0].clone();
    (vasp_id, req_id, password)
}

/// Verify the legal contact with its outstanding token.
async fn verify_contact(h: &Harness, vasp_id: &str) -> String {
    let vasp = h.store.retrieve_vasp(vasp_id).await.unwrap();
    let token = vasp
        .contacts
        .legal
        .as_ref()
        .unwrap()
        .token()
        .expect("legal contact must hold a token")
        .to_owned();

    let (status, reply) = post_json(
        &h.router,
        "/v1/verify-contact",
        json!({"id": vasp_id, "token": token}),
    )
    .await;
    assert_eq!(status, 200, "verify-contact failed: {reply}");
    assert_eq!(reply["status"], "PENDING_REVIEW");
    assert!(reply["message"]
        .as_str()
        .unwrap()
        .starts_with("email successfully verified"));
    token
}

/// Approve the registration with the admin verification token.
async fn approve(h: &Harness, vasp_id: &str) {
    let vasp = h.store.retrieve_vasp(vasp_id).await.unwrap();
    let token = vasp.admin_token().expect("admin token must be set").to_owned();

    let (status, reply) = post_json(
        &h.router,
        "/v1/review",
        json!({"id": vasp_id, "admin_verification_token": token, "accept": true}),
    )
    .await;
    assert_eq!(status, 200, "review failed: {reply}");
    assert_eq!(reply["status"], "REVIEWED");
}

/// Register, verify, and approve: the request is ready for the manager.
async fn registered_and_approved(h: &Harness) -> (String, String, String) {
    let (vasp_id, req_id, password) = register(h).await;
    verify_contact(h, &vasp_id).await;
    approve(h, &vasp_id).await;
    h.ca.set_pkcs12_password(&password);
    (vasp_id, req_id, password)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn s1_happy_path() {
    let h = harness();
    let (vasp_id, req_id, password) = register(&h).await;
    assert_eq!(password.len(), 16);

    // The vault holds exactly the password returned in the reply.
    let stored = h.vault.latest_version(&req_id, PASSWORD_SECRET).await.unwrap();
    assert_eq!(stored, password.as_bytes());

    verify_contact(&h, &vasp_id).await;
    approve(&h, &vasp_id).await;
    h.ca.set_pkcs12_password(&password);

    // Tick 1: submission.
    h.manager.handle_certificate_requests().await.unwrap();
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Processing);
    assert!(req.batch_id > 0);
    assert!(req.order_number > 0);
    assert!(req.authority_id > 0);
    assert!(!req.batch_name.is_empty());
    assert!(!req.batch_status.is_empty());
    assert!(DateTime::parse_from_rfc3339(&req.creation_date).is_ok());

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);

    // Tick 2: processed, downloaded, delivered.
    h.manager.handle_certificate_requests().await.unwrap();

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::Verified);
    assert!(vasp.verified_on.is_some());

    let details = vasp.identity_certificate.as_ref().expect("identity certificate set");
    assert_eq!(details.subject.common_name, "trisa.example.com");
    assert!(DateTime::parse_from_rfc3339(&details.not_before).is_ok());
    assert!(DateTime::parse_from_rfc3339(&details.not_after).is_ok());
    assert!(!details.serial_number.is_empty());
    assert!(!vasp.signing_certificates.is_empty());

    // Audit log: exactly six entries ending ISSUING_CERTIFICATE → VERIFIED
    // by the automated pipeline.
    let log = vasp.audit_log();
    assert_eq!(log.len(), 6);
    assert_eq!(log[5].previous_state, VerificationState::IssuingCertificate);
    assert_eq!(log[5].current_state, VerificationState::Verified);
    assert_eq!(log[5].source, AUTOMATED);

    // The request completed and links the certificate record.
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Completed);
    assert!(!req.certificate.is_empty());

    let cert = h.store.retrieve_cert(&req.certificate).await.unwrap();
    assert_eq!(cert.request, req_id);
    assert_eq!(cert.vasp, vasp_id);
    assert_eq!(cert.status, CertificateState::Issued);
    assert_eq!(&cert.details, details);
    assert_eq!(vasp.extra.certificate_ids, vec![cert.id.clone()]);

    // Exactly one delivery email, addressed to the legal contact.
    let delivered = h.transport.sent_with_subject(DELIVER_CERTS_SUBJECT);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].to, "a@x.io");
    let attachment = delivered[0].attachment.as_ref().unwrap();
    assert_eq!(attachment.filename, "trisa.example.com.p12");

    // The bundle was archived into the certs directory for operators.
    let archived = h.certs_dir.path().join(format!("{}.p12", req.batch_name));
    assert!(archived.exists());
}

#[tokio::test]
async fn s2_zero_balance_defers_submission() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;
    h.ca.set_balance(0);

    h.manager.handle_certificate_requests().await.unwrap();

    // The VASP entered issuance exactly once, but the request waits.
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);
    let log = vasp.audit_log();
    assert_eq!(log.len(), 5);
    assert_eq!(log[4].previous_state, VerificationState::Reviewed);
    assert_eq!(log[4].current_state, VerificationState::IssuingCertificate);
    assert_eq!(log[4].source, AUTOMATED);

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::ReadyToSubmit);

    // A second starved tick transitions nothing further.
    h.manager.handle_certificate_requests().await.unwrap();
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.audit_log().len(), 5);
}

#[tokio::test]
async fn s3_bad_vasp_state_rejects_without_ca_call() {
    let h = harness();
    let (vasp_id, req_id, _) = register(&h).await;
    verify_contact(&h, &vasp_id).await;
    // No review decision: the VASP sits in PENDING_REVIEW while the
    // request is already READY_TO_SUBMIT.

    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::CrRejected);
    let last = req.audit_log.last().unwrap();
    assert_eq!(last.description, "vasp not in valid state for submission");
    assert_eq!(last.source, AUTOMATED);

    // The VASP is not demoted by the rejection and no CA call was made.
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::PendingReview);
    assert!(h.ca.calls().is_empty());
}

#[tokio::test]
async fn s4_batch_rejection_terminates_the_request() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    // Move to PROCESSING, then script a failed batch.
    h.manager.handle_certificate_requests().await.unwrap();
    h.ca.set_processing_info(0, 0, 1);
    h.ca.set_batch_status(BATCH_STATUS_REJECTED);
    h.ca.set_reject_reason("certificate request denied");

    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::CrRejected);
    assert_eq!(req.reject_reason, "certificate request denied");
    let last = req.audit_log.last().unwrap();
    assert_eq!(last.previous_state, CertificateRequestState::Processing);
    assert_eq!(last.current_state, CertificateRequestState::CrRejected);
    assert_eq!(last.source, AUTOMATED);

    // Operator intervention decides the next step; the VASP stays put.
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);
}

#[tokio::test]
async fn s5_wildcard_common_name_is_refused() {
    let h = harness();
    let mut body = register_body();
    body["common_name"] = json!("*.example.com");

    let (status, reply) = post_json(&h.router, "/v1/register", body).await;
    assert_eq!(status, 400);
    assert_eq!(reply["code"], "INVALID_ARGUMENT");

    // Nothing was written.
    let results = h
        .store
        .search_vasps(&gds_server::storage::SearchQuery {
            name: vec!["trisa.example.com".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn s6_replayed_token_is_not_found() {
    let h = harness();
    let (vasp_id, _, _) = register(&h).await;
    let token = verify_contact(&h, &vasp_id).await;

    let before = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    let outbox_before = h.transport.outbox().len();

    // Tokens are single-use: the replay matches no contact.
    let (status, reply) = post_json(
        &h.router,
        "/v1/verify-contact",
        json!({"id": vasp_id, "token": token}),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(reply["code"], "NOT_FOUND");

    // State, audit log, and send-logs are untouched by the replay.
    let after = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(after.verification_status, VerificationState::PendingReview);
    assert_eq!(after.audit_log().len(), before.audit_log().len());
    assert_eq!(h.transport.outbox().len(), outbox_before);

    // Exactly one admin review email went out.
    let reviews = h
        .transport
        .sent_with_subject(gds_server::emails::REVIEW_REQUEST_SUBJECT);
    assert_eq!(reviews.len(), 1);
}

// =============================================================================
// Manager failure modes
// =============================================================================

#[tokio::test]
async fn missing_password_defers_submission() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    // Drop the vault scope so the manager finds no password.
    h.vault.delete_scope(&req_id).await.unwrap();
    h.manager.handle_certificate_requests().await.unwrap();

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);
    assert_eq!(vasp.audit_log().len(), 5);

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::ReadyToSubmit);
}

#[tokio::test]
async fn incomplete_profile_params_leave_request_retryable() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    // Switch the request to the subject-bearing profile but omit the
    // country, so submission fails client-side.
    let mut req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    req.profile = PROFILE_CIPHER_TRACE_END_ENTITY.into();
    req.params
        .insert(PARAM_ORGANIZATION_NAME.into(), "TRISA Member VASP".into());
    req.params.insert(PARAM_LOCALITY_NAME.into(), "Menlo Park".into());
    req.params
        .insert(PARAM_STATE_OR_PROVINCE_NAME.into(), "California".into());
    h.store.update_cert_req(&req).await.unwrap();

    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::ReadyToSubmit);
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);
}

#[tokio::test]
async fn end_entity_profile_issues_with_full_subject() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    let mut req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    req.profile = PROFILE_CIPHER_TRACE_END_ENTITY.into();
    req.params
        .insert(PARAM_ORGANIZATION_NAME.into(), "TRISA Member VASP".into());
    req.params.insert(PARAM_LOCALITY_NAME.into(), "Menlo Park".into());
    req.params
        .insert(PARAM_STATE_OR_PROVINCE_NAME.into(), "California".into());
    req.params.insert("countryName".into(), "US".into());
    h.store.update_cert_req(&req).await.unwrap();

    h.manager.handle_certificate_requests().await.unwrap();
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Completed);
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::Verified);
    assert!(vasp.identity_certificate.is_some());
}

#[tokio::test]
async fn not_acceptable_batch_errors_the_request() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    h.manager.handle_certificate_requests().await.unwrap();
    h.ca.set_processing_info(0, 0, 1);
    h.ca.set_batch_status(BATCH_STATUS_NOT_ACCEPTABLE);

    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::CrErrored);
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);
}

#[tokio::test]
async fn active_batch_records_status_movement() {
    let h = harness();
    let (_, req_id, _) = registered_and_approved(&h).await;

    h.manager.handle_certificate_requests().await.unwrap();
    let before = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(before.status, CertificateRequestState::Processing);
    let audit_len = before.audit_log.len();

    // Batch still active; the detail endpoint reports a new CA status.
    h.ca.set_processing_info(1, 0, 0);
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Processing);
    assert_eq!(req.audit_log.len(), audit_len + 1);
    let last = req.audit_log.last().unwrap();
    assert_eq!(last.previous_state, CertificateRequestState::Processing);
    assert_eq!(last.current_state, CertificateRequestState::Processing);
    assert_eq!(last.source, AUTOMATED);

    // Same status again: a no-op tick appends nothing.
    h.manager.handle_certificate_requests().await.unwrap();
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.audit_log.len(), audit_len + 1);
}

#[tokio::test]
async fn transient_detail_errors_leave_state_unchanged() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    h.manager.handle_certificate_requests().await.unwrap();

    // Detail endpoint down entirely.
    h.ca.set_processing_info(1, 0, 0);
    h.ca.fail_detail(true);
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Processing);
    let audit_len = req.audit_log.len();

    // Detail renders no status and the status fallback is down too.
    h.ca.fail_detail(false);
    h.ca.set_detail_status_empty(true);
    h.ca.fail_status(true);
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Processing);
    assert_eq!(req.audit_log.len(), audit_len, "no audit entry for a no-op tick");

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::IssuingCertificate);
}

#[tokio::test]
async fn failed_download_is_retried_next_tick() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    h.manager.handle_certificate_requests().await.unwrap();
    h.ca.fail_download(true);
    h.manager.handle_certificate_requests().await.unwrap();

    // The request holds in DOWNLOADING while the CA misbehaves.
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Downloading);

    h.ca.fail_download(false);
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Completed);
    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::Verified);
}

#[tokio::test]
async fn vasp_rejected_mid_processing_aborts_the_request() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    h.manager.handle_certificate_requests().await.unwrap();
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Processing);

    // An operator rejects the VASP while the batch is at the CA.
    let mut vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    vasp.verification_status = VerificationState::Rejected;
    h.store.update_vasp(&vasp).await.unwrap();

    let calls_before = h.ca.calls().len();
    h.manager.handle_certificate_requests().await.unwrap();

    // The rejection wins: the request terminates without a certificate
    // and without touching the CA again.
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::CrRejected);
    assert!(req.certificate.is_empty());
    let last = req.audit_log.last().unwrap();
    assert_eq!(last.previous_state, CertificateRequestState::Processing);
    assert_eq!(last.source, AUTOMATED);
    assert_eq!(h.ca.calls().len(), calls_before);

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::Rejected);
}

#[tokio::test]
async fn vasp_rejected_before_download_aborts_the_request() {
    let h = harness();
    let (vasp_id, req_id, _) = registered_and_approved(&h).await;

    h.manager.handle_certificate_requests().await.unwrap();
    h.ca.fail_download(true);
    h.manager.handle_certificate_requests().await.unwrap();
    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::Downloading);

    let mut vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    vasp.verification_status = VerificationState::Rejected;
    h.store.update_vasp(&vasp).await.unwrap();

    // Even with the CA healthy again, the bundle must not be fetched or
    // committed for a rejected VASP.
    h.ca.fail_download(false);
    let downloads_before = h.ca.calls().iter().filter(|c| **c == "Download").count();
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::CrRejected);
    assert!(req.certificate.is_empty());
    let downloads_after = h.ca.calls().iter().filter(|c| **c == "Download").count();
    assert_eq!(downloads_after, downloads_before);

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    assert_eq!(vasp.verification_status, VerificationState::Rejected);
    assert!(vasp.identity_certificate.is_none());
}

#[tokio::test]
async fn review_is_rejected_while_issuing() {
    let h = harness();
    let (vasp_id, _, _) = registered_and_approved(&h).await;

    h.ca.set_balance(0);
    h.manager.handle_certificate_requests().await.unwrap();

    // The manager owns the VASP now; administrative decisions must wait.
    let (status, reply) = post_json(
        &h.router,
        "/v1/review",
        json!({
            "id": vasp_id,
            "admin_verification_token": "whatever",
            "accept": false,
            "reject_reason": "changed our minds"
        }),
    )
    .await;
    assert_eq!(status, 412);
    assert_eq!(reply["code"], "FAILED_PRECONDITION");
}

#[tokio::test]
async fn admin_rejection_flows_through_the_manager() {
    let h = harness();
    let (vasp_id, req_id, _) = register(&h).await;
    verify_contact(&h, &vasp_id).await;

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    let token = vasp.admin_token().unwrap().to_owned();
    let (status, reply) = post_json(
        &h.router,
        "/v1/review",
        json!({
            "id": vasp_id,
            "admin_verification_token": token,
            "accept": false,
            "reject_reason": "incomplete regulatory disclosure"
        }),
    )
    .await;
    assert_eq!(status, 200, "review failed: {reply}");
    assert_eq!(reply["status"], "REJECTED");

    // Next tick the manager rejects the outstanding request and notifies
    // the verified contact.
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert_eq!(req.status, CertificateRequestState::CrRejected);

    let rejections = h
        .transport
        .sent_with_subject(gds_server::emails::REJECT_REGISTRATION_SUBJECT);
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].to, "a@x.io");
}

// =============================================================================
// Cross-cutting properties
// =============================================================================

#[tokio::test]
async fn audit_log_entries_chain() {
    let h = harness();
    let (vasp_id, _, _) = registered_and_approved(&h).await;
    h.manager.handle_certificate_requests().await.unwrap();
    h.manager.handle_certificate_requests().await.unwrap();

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    let log = vasp.audit_log();
    assert_eq!(log[0].previous_state, VerificationState::NoVerification);
    for pair in log.windows(2) {
        assert_eq!(pair[1].previous_state, pair[0].current_state);
        assert!(pair[1].timestamp > pair[0].timestamp);
    }
}

#[tokio::test]
async fn submitted_requests_carry_batch_metadata() {
    let h = harness();
    let (_, req_id, _) = registered_and_approved(&h).await;
    h.manager.handle_certificate_requests().await.unwrap();
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    assert!(matches!(
        req.status,
        CertificateRequestState::Processing
            | CertificateRequestState::Downloading
            | CertificateRequestState::Downloaded
            | CertificateRequestState::Completed
    ));
    assert!(req.batch_id > 0);
    assert!(DateTime::parse_from_rfc3339(&req.creation_date).is_ok());
}

#[tokio::test]
async fn password_plaintext_never_lands_on_stored_records() {
    let h = harness();
    let (vasp_id, req_id, password) = registered_and_approved(&h).await;
    h.manager.handle_certificate_requests().await.unwrap();

    let req = h.store.retrieve_cert_req(&req_id).await.unwrap();
    let serialized = serde_json::to_string(&req).unwrap();
    assert!(
        !serialized.contains(&password),
        "request record must not retain the PKCS#12 password"
    );
    assert!(!req.params.contains_key(PARAM_PKCS12_PASSWORD));
    assert_eq!(req.params.get(PARAM_COMMON_NAME).unwrap(), "trisa.example.com");

    let vasp = h.store.retrieve_vasp(&vasp_id).await.unwrap();
    let serialized = serde_json::to_string(&vasp).unwrap();
    assert!(!serialized.contains(&password));
}

#[tokio::test]
async fn status_endpoint_reports_probe_window() {
    let h = harness();
    let (status, reply) = post_json(
        &h.router,
        "/v1/status",
        json!({"attempts": 1, "last_checked_at": ""}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(reply["status"], "HEALTHY");

    let not_before = DateTime::parse_from_rfc3339(reply["not_before"].as_str().unwrap()).unwrap();
    let not_after = DateTime::parse_from_rfc3339(reply["not_after"].as_str().unwrap()).unwrap();
    assert!(not_after > not_before);

    let (_, health) = get(&h.router, "/health").await;
    assert_eq!(health["status"], "ok");
}
