//! Read path: Lookup, Search, and Verification
//!
//! Pure reads over the directory store; nothing here mutates a record.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gds_models::{CertificateDetails, Vasp, VerificationState};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::storage::{DirectoryStore, SearchQuery};

/// Identify a VASP either by id or by common name.
#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub registered_directory: String,
}

#[derive(Debug, Serialize)]
pub struct LookupReply {
    pub id: String,
    pub registered_directory: String,
    pub common_name: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_certificate: Option<CertificateDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_certificate: Option<CertificateDetails>,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Find one VASP by id or by an exact common-name match through the name
/// index. Multiple common-name matches are treated as not found.
pub(crate) async fn find_vasp(
    state: &AppState,
    id: &str,
    common_name: &str,
    rpc: &str,
) -> Result<Vasp, ApiError> {
    if !id.is_empty() {
        return state.store.retrieve_vasp(id).await.map_err(|err| {
            debug!(id = id, error = %err, "could not find VASP by ID");
            ApiError::NotFound("could not find VASP by ID".into())
        });
    }

    if !common_name.is_empty() {
        let query = SearchQuery {
            name: vec![common_name.to_owned()],
            ..Default::default()
        };
        let mut vasps = state.store.search_vasps(&query).await.map_err(|err| {
            warn!(common_name = common_name, error = %err, "could not search for common name");
            ApiError::NotFound("could not find VASP by common name".into())
        })?;

        if vasps.len() != 1 {
            if vasps.len() > 1 {
                debug!(
                    common_name = common_name,
                    nresults = vasps.len(),
                    "multiple VASPs returned from common name search"
                );
            }
            return Err(ApiError::NotFound(
                "could not find VASP by common name".into(),
            ));
        }
        return Ok(vasps.remove(0));
    }

    warn!(rpc = rpc, "no arguments supplied");
    Err(ApiError::InvalidArgument(
        "please supply ID and registered directory or common name".into(),
    ))
}

/// Lookup a VASP entity by id or common name, returning its full directory
/// listing including the identity certificate once verified.
///
/// GET /v1/lookup
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupReply>, ApiError> {
    let vasp = find_vasp(&state, &params.id, &params.common_name, "lookup").await?;

    let reply = LookupReply {
        id: vasp.id.clone(),
        registered_directory: vasp.registered_directory.clone(),
        common_name: vasp.common_name.clone(),
        endpoint: vasp.trisa_endpoint.clone(),
        identity_certificate: vasp.identity_certificate.clone(),
        // The last signing certificate is the one peers should trust.
        signing_certificate: vasp.signing_certificates.last().cloned(),
        country: vasp.entity.country_of_registration.clone(),
        verified_on: vasp.verified_on,
        name: vasp.name().map(str::to_owned),
    };

    info!(id = %vasp.id, common_name = %vasp.common_name, "VASP lookup succeeded");
    Ok(Json(reply))
}

/// Search request over the directory's secondary indices.
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub website: Vec<String>,
    #[serde(default)]
    pub country: Vec<String>,
    #[serde(default)]
    pub business_category: Vec<String>,
    #[serde(default)]
    pub vasp_category: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub registered_directory: String,
    pub common_name: String,
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct SearchReply {
    pub results: Vec<SearchResult>,
}

/// Search for VASP records by name, website, country, or category.
///
/// POST /v1/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchReply>, ApiError> {
    let mut category = request.business_category;
    category.extend(request.vasp_category);

    let query = SearchQuery {
        name: request.name,
        website: request.website,
        country: request.country,
        category,
    };

    let vasps = state
        .store
        .search_vasps(&query)
        .await
        .map_err(|err| ApiError::Aborted(err.to_string()))?;

    let results: Vec<SearchResult> = vasps
        .into_iter()
        .map(|vasp| SearchResult {
            id: vasp.id,
            registered_directory: vasp.registered_directory,
            common_name: vasp.common_name,
            endpoint: vasp.trisa_endpoint,
        })
        .collect();

    info!(results = results.len(), "search succeeded");
    Ok(Json(SearchReply { results }))
}

#[derive(Debug, Serialize)]
pub struct VerificationReply {
    pub verification_status: VerificationState,
    pub service_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_listed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Report the verification status of a VASP.
///
/// GET /v1/verification
pub async fn verification(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<VerificationReply>, ApiError> {
    let vasp = find_vasp(&state, &params.id, &params.common_name, "verification").await?;

    info!(id = %vasp.id, common_name = %vasp.common_name, "verification status check");
    Ok(Json(VerificationReply {
        verification_status: vasp.verification_status,
        service_status: "UNKNOWN".into(),
        verified_on: vasp.verified_on,
        first_listed: vasp.first_listed,
        last_updated: vasp.last_updated,
    }))
}
