//! Production client for the Sectigo IoT Manager batch API

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::authority::CertificateAuthority;
use crate::error::{CaError, Result};
use crate::types::{validate_profile_params, BatchResponse, ProcessingInfo};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct AuthenticateRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthenticateReply {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateBatchRequest<'a> {
    #[serde(rename = "profileName")]
    profile_name: &'a str,
    #[serde(rename = "batchRequests")]
    batch_requests: Vec<&'a HashMap<String, String>>,
}

/// HTTP client for the CA with credential login and a cached bearer token.
///
/// Every request carries a bounded deadline so a wedged CA cannot stall a
/// certificate manager tick indefinitely.
pub struct SectigoClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl SectigoClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(SectigoClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Return the cached bearer token, logging in when there is none.
    async fn bearer(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.authenticate().await
    }

    async fn authenticate(&self) -> Result<String> {
        debug!(url = %self.base_url, "authenticating with certificate authority");
        let reply = self
            .http
            .post(self.url("/auth/pwd"))
            .json(&AuthenticateRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        if !reply.status().is_success() {
            return Err(CaError::Authentication(format!(
                "authentication returned status {}",
                reply.status().as_u16()
            )));
        }

        let reply: AuthenticateReply = reply.json().await?;
        *self.token.write().await = Some(reply.access_token.clone());
        Ok(reply.access_token)
    }

    /// GET a JSON payload, retrying once with fresh credentials when the
    /// cached token has expired.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.bearer().await?;
        let reply = self
            .http
            .get(self.url(path))
            .bearer_auth(&token)
            .send()
            .await?;

        if reply.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("certificate authority token expired, re-authenticating");
            self.token.write().await.take();
            let token = self.authenticate().await?;
            let retry = self
                .http
                .get(self.url(path))
                .bearer_auth(&token)
                .send()
                .await?;
            return Self::decode_json(retry).await;
        }

        Self::decode_json(reply).await
    }

    async fn decode_json<T: DeserializeOwned>(reply: reqwest::Response) -> Result<T> {
        if !reply.status().is_success() {
            return Err(CaError::Status(reply.status().as_u16()));
        }
        Ok(reply.json().await?)
    }
}

#[async_trait]
impl CertificateAuthority for SectigoClient {
    async fn user_available_balance(&self) -> Result<i64> {
        self.get_json("/api/v1/organizations/balanceavailable").await
    }

    async fn submit_batch(
        &self,
        profile: &str,
        params: &HashMap<String, String>,
    ) -> Result<BatchResponse> {
        validate_profile_params(profile, params)?;

        let token = self.bearer().await?;
        let reply = self
            .http
            .post(self.url("/api/v1/batches"))
            .bearer_auth(&token)
            .json(&CreateBatchRequest {
                profile_name: profile,
                batch_requests: vec![params],
            })
            .send()
            .await?;

        Self::decode_json(reply).await
    }

    async fn batch_detail(&self, batch_id: i64) -> Result<BatchResponse> {
        self.get_json(&format!("/api/v1/batches/{batch_id}")).await
    }

    async fn batch_status(&self, batch_id: i64) -> Result<String> {
        self.get_json(&format!("/api/v1/batches/{batch_id}/status")).await
    }

    async fn batch_processing_info(&self, batch_id: i64) -> Result<ProcessingInfo> {
        self.get_json(&format!("/api/v1/batches/{batch_id}/processinginfo"))
            .await
    }

    async fn download(&self, batch_id: i64) -> Result<Vec<u8>> {
        let token = self.bearer().await?;
        let reply = self
            .http
            .get(self.url(&format!("/api/v1/batches/{batch_id}/download")))
            .bearer_auth(&token)
            .send()
            .await?;

        if !reply.status().is_success() {
            return Err(CaError::Status(reply.status().as_u16()));
        }
        Ok(reply.bytes().await?.to_vec())
    }
}
