//! IONOS Cloud REST client
//!
//! Thin authenticated wrapper over the v6 Cloud API and the DBaaS
//! Postgres API. Mutating calls return the request id the provider
//! hands back in the `Location` header; the client doubles as the
//! reconciler's `OperationSource` by polling
//! `GET /requests/{id}/status`.

use crate::error::{IonosError, Result};
use crate::types::{ApiErrorBody, RequestStatus};
use async_trait::async_trait;
use cumulus_cloud::{OperationHandle, OperationSource, OperationStatus};
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.ionos.com/cloudapi/v6";
pub const DEFAULT_DBAAS_URL: &str = "https://api.ionos.com/databases/postgresql";

const USER_AGENT: &str = concat!("cumulus/", env!("CARGO_PKG_VERSION"));

/// Upper bound for any single API call, so a hung request cannot stall
/// a reconcile past its deadline
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Handles for DBaaS clusters carry this prefix; their progress is
/// tracked through the cluster's own lifecycle state instead of a
/// request id.
pub(crate) const CLUSTER_HANDLE_PREFIX: &str = "clusters/";

/// API credentials, token preferred over basic auth
#[derive(Debug, Clone)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

/// Authenticated IONOS API client
pub struct IonosClient {
    http: reqwest::Client,
    api_url: String,
    dbaas_url: String,
    credentials: Credentials,
}

impl IonosClient {
    pub fn new(credentials: Credentials, api_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            dbaas_url: DEFAULT_DBAAS_URL.to_string(),
            credentials,
        })
    }

    pub fn with_dbaas_url(mut self, url: impl Into<String>) -> Self {
        self.dbaas_url = url.into();
        self
    }

    /// Full URL for a Cloud API path
    pub fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Full URL for a DBaaS Postgres API path
    pub fn dbaas(&self, path: &str) -> String {
        format!("{}{}", self.dbaas_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body
                .first_message()
                .unwrap_or("unknown provider error")
                .to_string(),
            Err(_) => format!("HTTP {status}"),
        };
        Err(IonosError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {url}");
        let response = self.send(self.http.get(url)).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(T, Option<String>)> {
        tracing::debug!("POST {url}");
        let response = self.send(self.http.post(url).json(body)).await?;
        let request_id = request_id_from(response.headers());
        Ok((response.json().await?, request_id))
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(T, Option<String>)> {
        tracing::debug!("PUT {url}");
        let response = self.send(self.http.put(url).json(body)).await?;
        let request_id = request_id_from(response.headers());
        Ok((response.json().await?, request_id))
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(T, Option<String>)> {
        tracing::debug!("PATCH {url}");
        let response = self.send(self.http.patch(url).json(body)).await?;
        let request_id = request_id_from(response.headers());
        Ok((response.json().await?, request_id))
    }

    /// POST without a request body (server start/stop)
    pub async fn post_empty(&self, url: &str) -> Result<Option<String>> {
        tracing::debug!("POST {url}");
        let response = self.send(self.http.post(url)).await?;
        Ok(request_id_from(response.headers()))
    }

    pub async fn delete(&self, url: &str) -> Result<Option<String>> {
        tracing::debug!("DELETE {url}");
        let response = self.send(self.http.delete(url)).await?;
        Ok(request_id_from(response.headers()))
    }
}

/// Extract the request id from a `Location` header
/// (`.../requests/{id}/status`)
pub(crate) fn parse_request_id(location: &str) -> Option<String> {
    let re = Regex::new(r"/requests/([-A-Fa-f0-9]+)").unwrap();
    re.captures(location)
        .map(|caps| caps.get(1).unwrap().as_str().to_string())
}

fn request_id_from(headers: &HeaderMap) -> Option<String> {
    let location = headers.get("location")?.to_str().ok()?;
    let id = parse_request_id(location);
    if id.is_none() {
        tracing::warn!("could not extract a request id from Location '{location}'");
    }
    id
}

#[async_trait]
impl OperationSource for IonosClient {
    async fn operation_status(
        &self,
        handle: &OperationHandle,
    ) -> cumulus_cloud::Result<OperationStatus> {
        // DBaaS has no request-status endpoint; the cluster's own
        // lifecycle state is the operation status.
        if let Some(cluster_id) = handle.id.strip_prefix(CLUSTER_HANDLE_PREFIX) {
            return Ok(self.cluster_status(cluster_id).await?);
        }

        let status: RequestStatus = self
            .get_json(&self.api(&format!("/requests/{}/status", handle.id)))
            .await?;
        let mapped = match status.metadata.status.as_str() {
            "QUEUED" => OperationStatus::Queued,
            "RUNNING" => OperationStatus::Running,
            "DONE" => OperationStatus::Done,
            "FAILED" => OperationStatus::Failed(
                status
                    .metadata
                    .message
                    .unwrap_or_else(|| "request failed".to_string()),
            ),
            other => OperationStatus::Failed(format!("unexpected request status '{other}'")),
        };
        Ok(mapped)
    }
}

impl IonosClient {
    async fn cluster_status(&self, cluster_id: &str) -> Result<OperationStatus> {
        #[derive(serde::Deserialize)]
        struct ClusterEnvelope {
            #[serde(default)]
            metadata: Option<crate::types::Metadata>,
        }

        // A deleted cluster disappears entirely, so a 404 here means
        // the delete finished.
        let cluster: ClusterEnvelope = match self
            .get_json(&self.dbaas(&format!("/clusters/{cluster_id}")))
            .await
        {
            Ok(cluster) => cluster,
            Err(IonosError::Api { status: 404, .. }) => return Ok(OperationStatus::Done),
            Err(e) => return Err(e),
        };
        let state = cluster
            .metadata
            .and_then(|m| m.state)
            .unwrap_or_else(|| "UNKNOWN".to_string());
        Ok(match state.as_str() {
            "AVAILABLE" => OperationStatus::Done,
            "FAILED" => OperationStatus::Failed("cluster entered FAILED state".to_string()),
            "DESTROYING" | "BUSY" | "DEPLOYING" | "UNKNOWN" => OperationStatus::Running,
            _ => OperationStatus::Running,
        })
    }
}
