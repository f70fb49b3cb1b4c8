//! Registration API for the directory service
//!
//! RPC names are preserved from the TRISA directory protocol for
//! interoperability; the transport is JSON over HTTP.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::emails::EmailCourier;
use crate::secrets::SecretVault;
use crate::storage::DirectoryStore;

/// Application state shared across handlers and the certificate manager.
pub struct AppState {
    pub store: Arc<dyn DirectoryStore>,
    pub vault: Arc<dyn SecretVault>,
    pub courier: Arc<EmailCourier>,
    pub config: Config,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Status (health check) request from a directory peer.
#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_checked_at: String,
}

#[derive(Debug, Serialize)]
pub struct StatusReply {
    pub status: String,
    /// Window the caller should schedule its next probe within
    pub not_before: String,
    pub not_after: String,
}

/// Service state probe used by peers to schedule health checks.
///
/// POST /v1/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StatusRequest>,
) -> Json<StatusReply> {
    info!(
        attempts = request.attempts,
        last_checked_at = %request.last_checked_at,
        "status check"
    );

    // Ask for another health check between 30 and 60 minutes from now.
    let now = Utc::now();
    let status = if state.config.maintenance {
        "MAINTENANCE"
    } else {
        "HEALTHY"
    };

    Json(StatusReply {
        status: status.into(),
        not_before: (now + Duration::minutes(30)).to_rfc3339(),
        not_after: (now + Duration::minutes(60)).to_rfc3339(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/v1/status", post(status))
        // Registration and verification
        .route("/v1/register", post(handlers::register))
        .route("/v1/verify-contact", post(handlers::verify_contact))
        .route("/v1/review", post(handlers::review))
        // Read path
        .route("/v1/lookup", get(handlers::lookup))
        .route("/v1/search", post(handlers::search))
        .route("/v1/verification", get(handlers::verification))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
