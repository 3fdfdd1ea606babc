//! Dataverse Web API client.
//!
//! Wraps the three remote operations this tool needs: the `WhoAmI` readiness
//! probe, the unmanaged-solution query, and the `ExportSolution` action. The
//! operations sit behind the [`SolutionSource`] trait so the orchestration
//! flow and the GUI can be exercised against a fake without live credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::SolutionRecord;
use super::url::normalize_server_url;

/// API path segment for the Web API version this client targets.
const API_SEGMENT: &str = "api/data/v9.2";

/// Timeout for the readiness probe and the solution query.
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for `ExportSolution`; large solutions take minutes server-side.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Dataverse returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Connection is not ready")]
    NotReady,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Http(err.to_string())
    }
}

// ============================================================================
// Capability trait
// ============================================================================

/// Narrow capability interface over the remote solution store.
#[async_trait]
pub trait SolutionSource: Send + Sync {
    /// Retrieve all unmanaged solutions, ordered by unique name ascending.
    async fn list_unmanaged_solutions(&self) -> Result<Vec<SolutionRecord>, GatewayError>;

    /// Request an export of one solution variant; returns the zip payload.
    async fn export_solution(
        &self,
        unique_name: &str,
        managed: bool,
    ) -> Result<Vec<u8>, GatewayError>;
}

// ============================================================================
// HTTP client
// ============================================================================

/// Web API client bound to one organization and one access token.
#[derive(Debug)]
pub struct HttpDataverseClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct WhoAmIResponse {
    #[serde(rename = "UserId")]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct SolutionListResponse {
    value: Vec<SolutionRecord>,
}

#[derive(Debug, Deserialize)]
struct ExportSolutionResponse {
    #[serde(rename = "ExportSolutionFile")]
    export_solution_file: String,
}

impl HttpDataverseClient {
    /// Create a client for the given organization URL (scheme optional).
    pub fn new(server_url: &str, access_token: String) -> Self {
        let base = normalize_server_url(server_url);
        Self {
            http: reqwest::Client::new(),
            base,
            access_token,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base, API_SEGMENT, path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Dataverse request failed");
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Probe the organization with the parameterless `WhoAmI` function.
    ///
    /// Returns the caller's user id on success. A failure here means the
    /// token or the organization URL is not usable.
    pub async fn who_am_i(&self) -> Result<String, GatewayError> {
        let url = self.endpoint("WhoAmI");
        debug!(%url, "Probing organization");

        let response = self
            .request(self.http.get(&url))
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: WhoAmIResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(body.user_id)
    }
}

#[async_trait]
impl SolutionSource for HttpDataverseClient {
    async fn list_unmanaged_solutions(&self) -> Result<Vec<SolutionRecord>, GatewayError> {
        let url = self.endpoint("solutions");
        debug!(%url, "Querying unmanaged solutions");

        let response = self
            .request(self.http.get(&url))
            .query(&[
                ("$select", "uniquename,friendlyname,version"),
                ("$filter", "ismanaged eq false"),
                ("$orderby", "uniquename asc"),
            ])
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: SolutionListResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        info!(count = body.value.len(), "Retrieved unmanaged solutions");
        Ok(body.value)
    }

    async fn export_solution(
        &self,
        unique_name: &str,
        managed: bool,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = self.endpoint("ExportSolution");
        debug!(%url, unique_name, managed, "Requesting solution export");

        let response = self
            .request(self.http.post(&url))
            .json(&json!({
                "SolutionName": unique_name,
                "Managed": managed,
            }))
            .timeout(EXPORT_TIMEOUT)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: ExportSolutionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        let bytes = BASE64
            .decode(body.export_solution_file.as_bytes())
            .map_err(|e| GatewayError::Decode(format!("export payload is not base64: {}", e)))?;

        info!(unique_name, managed, bytes = bytes.len(), "Export payload received");
        Ok(bytes)
    }
}

// ============================================================================
// Connection handle
// ============================================================================

/// A live connection to one organization.
///
/// Mirrors the readiness-flag contract of the upstream SDK: `connect` never
/// fails outright, and callers must check [`DataverseConnection::is_ready`]
/// before using the connection.
#[derive(Debug)]
pub struct DataverseConnection {
    host: String,
    client: Option<Arc<HttpDataverseClient>>,
    last_error: Option<String>,
}

impl DataverseConnection {
    /// The organization host this connection was opened against.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the connection passed the readiness probe.
    pub fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    /// The probe failure message, if the connection is not ready.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The underlying solution source, if ready.
    pub fn source(&self) -> Result<Arc<HttpDataverseClient>, GatewayError> {
        self.client.clone().ok_or(GatewayError::NotReady)
    }
}

/// Open a connection: build a client for the organization and probe it.
///
/// Probe failures do not raise; they produce a connection whose ready flag is
/// unset and whose `last_error` carries the failure message.
pub async fn connect(server_url: &str, access_token: String) -> DataverseConnection {
    let base = normalize_server_url(server_url);
    let host = super::url::organization_host(&base).unwrap_or_else(|| base.clone());
    let client = HttpDataverseClient::new(&base, access_token);

    match client.who_am_i().await {
        Ok(user_id) => {
            info!(%host, %user_id, "Connected to organization");
            DataverseConnection {
                host,
                client: Some(Arc::new(client)),
                last_error: None,
            }
        }
        Err(e) => {
            warn!(%host, error = %e, "Organization probe failed");
            DataverseConnection {
                host,
                client: None,
                last_error: Some(e.to_string()),
            }
        }
    }
}
