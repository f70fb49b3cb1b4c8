//! Shared harness for the integration suites
//!
//! Builds the full service against the in-memory store and vault, the mock
//! mail transport, and the mock certificate authority, and exposes helpers
//! for driving the router and the certificate manager deterministically.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use gds_sectigo::MockAuthority;
use gds_server::certman::CertificateManager;
use gds_server::emails::{EmailCourier, MockTransport};
use gds_server::{create_router, AppState, Config, MemoryStore, MemoryVault};

pub struct Harness {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub vault: Arc<MemoryVault>,
    pub transport: Arc<MockTransport>,
    pub ca: Arc<MockAuthority>,
    pub manager: CertificateManager,
    // Keeps the certs directory alive for the duration of the test
    pub certs_dir: tempfile::TempDir,
}

pub fn harness() -> Harness {
    harness_with_config(Config::default())
}

pub fn harness_with_config(mut config: Config) -> Harness {
    let certs_dir = tempfile::tempdir().expect("could not create certs directory");
    config.certman.interval = Duration::from_millis(1);
    config.certman.storage = certs_dir.path().to_path_buf();

    let store = Arc::new(MemoryStore::new());
    let vault = Arc::new(MemoryVault::new());
    let transport = Arc::new(MockTransport::new());
    let ca = Arc::new(MockAuthority::new());
    let courier = Arc::new(EmailCourier::new(
        transport.clone(),
        &config.email.service_email,
        &config.email.admin_email,
        &config.email.verify_base_url,
    ));

    let manager = CertificateManager::new(
        store.clone(),
        vault.clone(),
        courier.clone(),
        ca.clone(),
        config.certman.clone(),
    );

    let state = Arc::new(AppState {
        store: store.clone(),
        vault: vault.clone(),
        courier,
        config,
    });

    Harness {
        router: create_router(state),
        store,
        vault,
        transport,
        ca,
        manager,
        certs_dir,
    }
}

pub async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("could not build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router must answer");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("could not read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response must be JSON")
    };
    (status, value)
}

pub async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .expect("could not build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router must answer");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("could not read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response must be JSON")
    };
    (status, value)
}

/// A registration request for `trisa.example.com:443` with a single legal
/// contact at `a@x.io`.
pub fn register_body() -> Value {
    json!({
        "trisa_endpoint": "trisa.example.com:443",
        "entity": {
            "name": {
                "name_identifiers": [{
                    "legal_person_name": "Example VASP, Ltd",
                    "legal_person_name_identifier_type": "LEGL"
                }]
            },
            "country_of_registration": "US"
        },
        "contacts": {
            "legal": {"name": "Legal Contact", "email": "a@x.io", "phone": ""}
        },
        "website": "https://trisa.example.com",
        "business_category": "BUSINESS_ENTITY",
        "trixo": {
            "primary_national_jurisdiction": "US",
            "primary_regulator": "FinCEN",
            "conducts_customer_kyc": true,
            "must_comply_travel_rule": true
        }
    })
}
