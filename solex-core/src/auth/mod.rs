//! Authentication for Dataverse organizations.
//!
//! This module provides:
//! - Interactive OAuth (PKCE + loopback redirect) against the Microsoft
//!   identity platform
//! - Token caching in the SQLite database, keyed by organization host
//! - Automatic token refresh

pub mod oauth;
pub mod storage;

pub use oauth::{
    refresh_access_token, run_interactive_auth, scope_for_organization, AuthError, TokenResponse,
    CLIENT_ID,
};
pub use storage::{has_cached_token, StoredTokens, TokenStorage, TokenStorageError};

use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::dataverse::{normalize_server_url, organization_host};
use crate::db::Database;

/// Refresh when the cached access token expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Acquire an access token for an organization, interactively if needed.
///
/// Order of preference: a cached token that is not close to expiry, a silent
/// refresh, and finally the full interactive browser flow. The database is
/// only held open around the synchronous cache reads/writes, never across an
/// await point.
pub async fn acquire_token(db_path: PathBuf, server_url: &str) -> Result<String, AuthError> {
    let org_url = normalize_server_url(server_url);
    let host = organization_host(&org_url)
        .ok_or_else(|| AuthError::Http(format!("Cannot parse organization URL: {}", org_url)))?;
    let scope = scope_for_organization(&org_url);

    // Cached token still good?
    let cached = {
        let db = open_db(&db_path)?;
        TokenStorage::new(&db).load(&host)?
    };

    if let Some(tokens) = &cached {
        if !tokens.expires_within(REFRESH_MARGIN_SECS) {
            debug!(%host, "Using cached access token");
            return Ok(tokens.access_token.clone());
        }
    }

    // Silent refresh?
    if let Some(refresh_token) = cached.as_ref().and_then(|t| t.refresh_token.clone()) {
        info!(%host, "Cached token expiring, refreshing");
        match refresh_access_token(&scope, &refresh_token).await {
            Ok(response) => {
                save_tokens(&db_path, &host, &response)?;
                return Ok(response.access_token);
            }
            Err(e) => {
                warn!(%host, error = %e, "Token refresh failed, falling back to interactive sign-in");
            }
        }
    }

    // Full interactive flow.
    info!(%host, "Starting interactive sign-in");
    let response = run_interactive_auth(&scope).await?;
    save_tokens(&db_path, &host, &response)?;
    info!(%host, "Sign-in complete");
    Ok(response.access_token)
}

/// Drop cached tokens for an organization (sign out).
pub fn forget_tokens(db_path: &PathBuf, server_url: &str) -> Result<(), AuthError> {
    let Some(host) = organization_host(server_url) else {
        return Ok(());
    };
    let db = open_db(db_path)?;
    TokenStorage::new(&db).delete(&host)?;
    Ok(())
}

fn save_tokens(db_path: &PathBuf, host: &str, response: &TokenResponse) -> Result<(), AuthError> {
    let db = open_db(db_path)?;
    TokenStorage::new(&db).save(
        host,
        &response.access_token,
        response.refresh_token.as_deref(),
        response.expires_in,
    )?;
    Ok(())
}

fn open_db(db_path: &PathBuf) -> Result<Database, AuthError> {
    let db = Database::open_at(db_path.clone()).map_err(|e| AuthError::Database(e.to_string()))?;
    db.migrate()
        .map_err(|e| AuthError::Database(e.to_string()))?;
    Ok(db)
}
