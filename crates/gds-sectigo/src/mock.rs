//! Scriptable in-process certificate authority for tests
//!
//! The mock mirrors the observable behavior of the batch API: submissions
//! create batches, processing counters and batch statuses can be scripted
//! per test, and downloads fabricate a real PKCS#12 bundle (RSA key plus
//! self-signed leaf) encrypted with the configured password so the
//! pipeline's parsing path is exercised end to end.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};

use crate::authority::CertificateAuthority;
use crate::error::{CaError, Result};
use crate::types::{
    validate_profile_params, BatchResponse, ProcessingInfo, BATCH_STATUS_READY_FOR_DOWNLOAD,
    PARAM_COMMON_NAME,
};

#[derive(Debug)]
struct MockState {
    balance: i64,
    next_batch_id: i64,
    common_name: String,
    pkcs12_password: String,
    batch_status: String,
    reject_reason: String,
    processing: ProcessingInfo,
    detail_status_empty: bool,
    detail_fails: bool,
    status_fails: bool,
    processing_info_fails: bool,
    download_fails: bool,
    calls: Vec<&'static str>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            balance: 100,
            next_batch_id: 42,
            common_name: "trisa.example.com".into(),
            pkcs12_password: "qDhAwnfMjgDEzzUC".into(),
            batch_status: BATCH_STATUS_READY_FOR_DOWNLOAD.into(),
            reject_reason: String::new(),
            processing: ProcessingInfo {
                active: 0,
                success: 1,
                failed: 0,
            },
            detail_status_empty: false,
            detail_fails: false,
            status_fails: false,
            processing_info_fails: false,
            download_fails: false,
            calls: Vec::new(),
        }
    }
}

/// Certificate authority double with per-test scripting and call recording.
pub struct MockAuthority {
    state: Mutex<MockState>,
}

impl MockAuthority {
    /// A mock whose default script issues a certificate after one
    /// submission: balance available, batch processed successfully, bundle
    /// ready for download.
    pub fn new() -> Self {
        MockAuthority {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn set_balance(&self, balance: i64) {
        self.state.lock().unwrap().balance = balance;
    }

    /// Password the fabricated PKCS#12 bundle will be encrypted with; tests
    /// set this to the password the registration reply handed out.
    pub fn set_pkcs12_password(&self, password: &str) {
        self.state.lock().unwrap().pkcs12_password = password.to_owned();
    }

    pub fn set_batch_status(&self, status: &str) {
        self.state.lock().unwrap().batch_status = status.to_owned();
    }

    pub fn set_reject_reason(&self, reason: &str) {
        self.state.lock().unwrap().reject_reason = reason.to_owned();
    }

    pub fn set_processing_info(&self, active: i64, success: i64, failed: i64) {
        self.state.lock().unwrap().processing = ProcessingInfo {
            active,
            success,
            failed,
        };
    }

    /// Make the detail endpoint return a payload without a status so
    /// callers exercise the status-endpoint fallback.
    pub fn set_detail_status_empty(&self, empty: bool) {
        self.state.lock().unwrap().detail_status_empty = empty;
    }

    pub fn fail_detail(&self, fails: bool) {
        self.state.lock().unwrap().detail_fails = fails;
    }

    pub fn fail_status(&self, fails: bool) {
        self.state.lock().unwrap().status_fails = fails;
    }

    pub fn fail_processing_info(&self, fails: bool) {
        self.state.lock().unwrap().processing_info_fails = fails;
    }

    pub fn fail_download(&self, fails: bool) {
        self.state.lock().unwrap().download_fails = fails;
    }

    /// Names of the CA calls performed so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    fn batch_response(state: &MockState, status: String) -> BatchResponse {
        BatchResponse {
            batch_id: state.next_batch_id,
            authority_id: 11,
            order_number: state.next_batch_id + 1000,
            creation_date: Utc::now().to_rfc3339(),
            batch_name: format!("batch-{}", state.next_batch_id),
            status,
            reject_reason: state.reject_reason.clone(),
        }
    }
}

impl Default for MockAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CertificateAuthority for MockAuthority {
    async fn user_available_balance(&self) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("UserAvailableBalance");
        Ok(state.balance)
    }

    async fn submit_batch(
        &self,
        profile: &str,
        params: &HashMap<String, String>,
    ) -> Result<BatchResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("Batch");
        validate_profile_params(profile, params)?;

        if let Some(common_name) = params.get(PARAM_COMMON_NAME) {
            state.common_name = common_name.clone();
        }
        Ok(Self::batch_response(&state, "CREATED".into()))
    }

    async fn batch_detail(&self, batch_id: i64) -> Result<BatchResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("BatchDetail");
        if state.detail_fails {
            return Err(CaError::Status(404));
        }

        let status = if state.detail_status_empty {
            String::new()
        } else {
            state.batch_status.clone()
        };
        let mut detail = Self::batch_response(&state, status);
        detail.batch_id = batch_id;
        Ok(detail)
    }

    async fn batch_status(&self, _batch_id: i64) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("BatchStatus");
        if state.status_fails {
            return Err(CaError::Status(404));
        }
        Ok(state.batch_status.clone())
    }

    async fn batch_processing_info(&self, _batch_id: i64) -> Result<ProcessingInfo> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("BatchProcessingInfo");
        if state.processing_info_fails {
            return Err(CaError::Status(500));
        }
        Ok(state.processing)
    }

    async fn download(&self, _batch_id: i64) -> Result<Vec<u8>> {
        let (common_name, password) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push("Download");
            if state.download_fails {
                return Err(CaError::Status(502));
            }
            (state.common_name.clone(), state.pkcs12_password.clone())
        };

        fabricate_pkcs12(&common_name, &password)
            .map_err(|e| CaError::Decode(format!("could not fabricate test bundle: {e}")))
    }
}

/// Build a PKCS#12 bundle holding a fresh RSA key and a self-signed leaf
/// for the given common name, encrypted with the given password. Exposed
/// so test suites can produce bundles without driving the full mock.
pub fn fabricate_pkcs12(
    common_name: &str,
    password: &str,
) -> std::result::Result<Vec<u8>, openssl::error::ErrorStack> {
    let rsa = Rsa::generate(2048)?;
    let pkey = PKey::from_rsa(rsa)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "TRISA Member VASP")?;
    name.append_entry_by_nid(Nid::COUNTRYNAME, "US")?;
    let name = name.build();

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = {
        let mut bn = BigNum::new()?;
        bn.rand(64, MsbOption::MAYBE_ZERO, false)?;
        bn.to_asn1_integer()?
    };
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&pkey)?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.sign(&pkey, MessageDigest::sha256())?;
    let cert = builder.build();

    let pkcs12 = Pkcs12::builder()
        .name(common_name)
        .pkey(&pkey)
        .cert(&cert)
        .build2(password)?;
    pkcs12.to_der()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PARAM_PKCS12_PASSWORD, PROFILE_CIPHER_TRACE_EE};

    fn ee_params() -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert(PARAM_COMMON_NAME.to_owned(), "alpha.example.com".to_owned());
        params.insert(PARAM_PKCS12_PASSWORD.to_owned(), "supersecret123456".to_owned());
        params
    }

    #[tokio::test]
    async fn default_script_issues_after_one_submission() {
        let ca = MockAuthority::new();
        assert!(ca.user_available_balance().await.unwrap() > 0);

        let batch = ca
            .submit_batch(PROFILE_CIPHER_TRACE_EE, &ee_params())
            .await
            .unwrap();
        assert!(batch.batch_id > 0);
        assert!(batch.order_number > 0);
        assert!(!batch.creation_date.is_empty());

        let info = ca.batch_processing_info(batch.batch_id).await.unwrap();
        assert_eq!(info.success, 1);

        let detail = ca.batch_detail(batch.batch_id).await.unwrap();
        assert_eq!(detail.status, BATCH_STATUS_READY_FOR_DOWNLOAD);
    }

    #[tokio::test]
    async fn download_produces_parseable_bundle() {
        let ca = MockAuthority::new();
        ca.set_pkcs12_password("supersecret123456");
        ca.submit_batch(PROFILE_CIPHER_TRACE_EE, &ee_params())
            .await
            .unwrap();

        let der = ca.download(42).await.unwrap();
        let parsed = Pkcs12::from_der(&der)
            .unwrap()
            .parse2("supersecret123456")
            .unwrap();
        let cert = parsed.cert.expect("bundle must carry a certificate");
        let common_name = cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .expect("subject must carry a common name");
        assert_eq!(common_name.to_string(), "alpha.example.com");
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let ca = MockAuthority::new();
        ca.user_available_balance().await.unwrap();
        ca.batch_status(1).await.unwrap();
        assert_eq!(ca.calls(), vec!["UserAvailableBalance", "BatchStatus"]);
    }

    #[tokio::test]
    async fn scripted_failures_surface_as_status_errors() {
        let ca = MockAuthority::new();
        ca.fail_detail(true);
        assert!(matches!(ca.batch_detail(1).await, Err(CaError::Status(404))));

        ca.fail_download(true);
        assert!(matches!(ca.download(1).await, Err(CaError::Status(502))));
    }
}
