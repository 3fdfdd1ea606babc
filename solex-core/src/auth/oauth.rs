//! Interactive OAuth against the Microsoft identity platform.
//!
//! Authorization-code flow with PKCE: open the authorize URL in the system
//! browser, catch the redirect on a loopback listener, then exchange the code
//! at the token endpoint. The client id is the well-known public id used for
//! interactive Dataverse tooling; there is no client secret.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

/// Fixed public client id for interactive Dataverse sign-in.
pub const CLIENT_ID: &str = "51f81489-12ee-4a9e-aaae-a2591f45987d";

const AUTHORIZE_ENDPOINT: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const TOKEN_ENDPOINT: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Page shown in the browser once the redirect has been captured.
const LANDING_PAGE: &str = "<html><body><h2>Sign-in complete</h2>\
<p>You can close this window and return to Solex.</p></body></html>";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Loopback listener error: {0}")]
    Listener(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Authorization was denied: {0}")]
    Denied(String),
    #[error("Redirect state did not match")]
    StateMismatch,
    #[error("Token endpoint returned {status}: {body}")]
    Exchange { status: u16, body: String },
    #[error("Token storage error: {0}")]
    Storage(#[from] super::storage::TokenStorageError),
    #[error("Database error: {0}")]
    Database(String),
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// The OAuth scope for one organization: its `.default` resource scope plus
/// `offline_access` so the token endpoint issues a refresh token.
pub fn scope_for_organization(org_base_url: &str) -> String {
    format!("{}/.default offline_access", org_base_url)
}

// ============================================================================
// PKCE
// ============================================================================

/// Generate a PKCE verifier/challenge pair (S256).
fn generate_pkce() -> (String, String) {
    // Two v4 uuids give 64 hex chars, comfortably inside the 43-128 range
    // RFC 7636 requires for a verifier.
    let verifier = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    let challenge = challenge_for(&verifier);
    (verifier, challenge)
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

// ============================================================================
// Interactive flow
// ============================================================================

/// Run the full interactive flow for one organization scope.
///
/// Blocks until the browser redirect arrives; there is no timeout, matching
/// the interactive prompt it replaces.
pub async fn run_interactive_auth(scope: &str) -> Result<TokenResponse, AuthError> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://localhost:{}/", port);

    let (verifier, challenge) = generate_pkce();
    let state = uuid::Uuid::new_v4().simple().to_string();

    let authorize_url = Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_mode", "query"),
            ("scope", scope),
            ("state", state.as_str()),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| AuthError::Http(e.to_string()))?;

    info!(port, "Waiting for sign-in redirect on loopback");
    if let Err(e) = webbrowser::open(authorize_url.as_str()) {
        warn!(error = %e, "Could not open browser automatically");
        info!("Open this URL to sign in: {}", authorize_url);
    }

    let (code, returned_state) = wait_for_redirect(&listener).await?;
    if returned_state != state {
        return Err(AuthError::StateMismatch);
    }

    debug!("Authorization code received, exchanging for tokens");
    exchange_code(scope, &redirect_uri, &code, &verifier).await
}

/// Accept connections until one carries the authorization redirect.
async fn wait_for_redirect(listener: &TcpListener) -> Result<(String, String), AuthError> {
    loop {
        let (mut stream, _) = listener.accept().await?;

        let mut buf = vec![0u8; 8192];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]).to_string();

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            LANDING_PAGE.len(),
            LANDING_PAGE
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;

        let Some(path) = request_path(&request) else {
            // Favicon probe or similar; keep listening.
            continue;
        };

        match parse_redirect_query(&path) {
            Ok(Some(result)) => return Ok(result),
            Ok(None) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Extract the request path from the first line of an HTTP request.
fn request_path(request: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    if method != "GET" {
        return None;
    }
    parts.next().map(|p| p.to_string())
}

/// Pull `code` and `state` out of the redirect path.
///
/// Returns `Ok(None)` for unrelated requests (no recognizable parameters),
/// and `Err(Denied)` if the identity platform reported an error.
fn parse_redirect_query(path: &str) -> Result<Option<(String, String)>, AuthError> {
    let url = Url::parse(&format!("http://localhost{}", path))
        .map_err(|e| AuthError::Http(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::Denied(error_description.unwrap_or(error)));
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok(Some((code, state))),
        _ => Ok(None),
    }
}

// ============================================================================
// Token endpoint
// ============================================================================

async fn exchange_code(
    scope: &str,
    redirect_uri: &str,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse, AuthError> {
    let params = [
        ("client_id", CLIENT_ID),
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("code_verifier", verifier),
        ("scope", scope),
    ];
    post_token_request(&params).await
}

/// Redeem a refresh token for a new access token.
pub async fn refresh_access_token(
    scope: &str,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let params = [
        ("client_id", CLIENT_ID),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("scope", scope),
    ];
    post_token_request(&params).await
}

async fn post_token_request(params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
    let client = reqwest::Client::new();
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(params)
        .send()
        .await
        .map_err(|e| AuthError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Exchange {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::Http(e.to_string()))
}
