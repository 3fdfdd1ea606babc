//! OAuth token cache in SQLite, keyed by organization host.

use crate::db::Database;
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenStorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Cached OAuth tokens for one organization.
#[derive(Debug, Clone)]
pub struct StoredTokens {
    pub host: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub updated_at: i64,
}

impl StoredTokens {
    /// Check if the access token is expired.
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now().timestamp() >= expires_at
        } else {
            false
        }
    }

    /// Check if the access token will expire within the given seconds.
    pub fn expires_within(&self, seconds: i64) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now().timestamp() >= expires_at - seconds
        } else {
            false
        }
    }
}

/// Token cache operations.
pub struct TokenStorage<'a> {
    db: &'a Database,
}

impl<'a> TokenStorage<'a> {
    /// Create a new token storage.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Save tokens for an organization host.
    ///
    /// An update without a refresh token keeps the previously stored one;
    /// the identity platform only returns a refresh token on some grants.
    pub fn save(
        &self,
        host: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_in: Option<u64>,
    ) -> Result<(), TokenStorageError> {
        let expires_at = expires_in.map(|secs| Utc::now().timestamp() + secs as i64);

        self.db.conn().execute(
            "INSERT INTO oauth_tokens (host, access_token, refresh_token, expires_at, updated_at)
             VALUES (?, ?, ?, ?, unixepoch())
             ON CONFLICT(host) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, oauth_tokens.refresh_token),
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            rusqlite::params![host, access_token, refresh_token, expires_at],
        )?;

        Ok(())
    }

    /// Load tokens for an organization host.
    pub fn load(&self, host: &str) -> Result<Option<StoredTokens>, TokenStorageError> {
        let result = self.db.conn().query_row(
            "SELECT host, access_token, refresh_token, expires_at, updated_at
             FROM oauth_tokens WHERE host = ?",
            [host],
            |row| {
                Ok(StoredTokens {
                    host: row.get(0)?,
                    access_token: row.get(1)?,
                    refresh_token: row.get(2)?,
                    expires_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        );

        match result {
            Ok(tokens) => Ok(Some(tokens)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TokenStorageError::Database(e)),
        }
    }

    /// Delete tokens for an organization host.
    pub fn delete(&self, host: &str) -> Result<(), TokenStorageError> {
        self.db
            .conn()
            .execute("DELETE FROM oauth_tokens WHERE host = ?", [host])?;
        Ok(())
    }

    /// List all hosts with cached tokens.
    pub fn list_hosts(&self) -> Result<Vec<String>, TokenStorageError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT host FROM oauth_tokens ORDER BY host")?;

        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut hosts = Vec::new();
        for row in rows {
            hosts.push(row?);
        }
        Ok(hosts)
    }
}

/// Check if an organization host has a non-expired cached access token.
pub fn has_cached_token(db: &Database, host: &str) -> bool {
    TokenStorage::new(db)
        .load(host)
        .map(|t| t.is_some_and(|tokens| !tokens.is_expired()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open_at(db_path).unwrap();
        db.migrate().unwrap();
        (temp_dir, db)
    }

    #[test]
    fn test_stored_tokens_not_expired() {
        let tokens = StoredTokens {
            host: "org1.crm4.dynamics.com".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 3600),
            updated_at: Utc::now().timestamp(),
        };
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_stored_tokens_is_expired() {
        let tokens = StoredTokens {
            host: "org1.crm4.dynamics.com".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() - 3600),
            updated_at: Utc::now().timestamp(),
        };
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_stored_tokens_expires_within() {
        let tokens = StoredTokens {
            host: "org1.crm4.dynamics.com".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 60),
            updated_at: Utc::now().timestamp(),
        };
        assert!(tokens.expires_within(120));
        assert!(!tokens.expires_within(30));
    }

    #[test]
    fn test_save_and_load_tokens() {
        let (_temp, db) = setup_test_db();
        let storage = TokenStorage::new(&db);

        storage
            .save(
                "org1.crm4.dynamics.com",
                "access123",
                Some("refresh456"),
                Some(3600),
            )
            .unwrap();

        let loaded = storage.load("org1.crm4.dynamics.com").unwrap().unwrap();
        assert_eq!(loaded.access_token, "access123");
        assert_eq!(loaded.refresh_token, Some("refresh456".to_string()));
        assert!(loaded.expires_at.is_some());
    }

    #[test]
    fn test_load_nonexistent_host() {
        let (_temp, db) = setup_test_db();
        let storage = TokenStorage::new(&db);

        let result = storage.load("nowhere.crm.dynamics.com").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_tokens() {
        let (_temp, db) = setup_test_db();
        let storage = TokenStorage::new(&db);

        storage
            .save("org1.crm4.dynamics.com", "token", None, None)
            .unwrap();
        storage.delete("org1.crm4.dynamics.com").unwrap();

        assert!(storage.load("org1.crm4.dynamics.com").unwrap().is_none());
    }

    #[test]
    fn test_list_hosts() {
        let (_temp, db) = setup_test_db();
        let storage = TokenStorage::new(&db);

        storage
            .save("zebra.crm.dynamics.com", "token1", None, None)
            .unwrap();
        storage
            .save("alpha.crm.dynamics.com", "token2", None, None)
            .unwrap();

        let hosts = storage.list_hosts().unwrap();
        assert_eq!(hosts, vec!["alpha.crm.dynamics.com", "zebra.crm.dynamics.com"]);
    }

    #[test]
    fn test_save_preserves_refresh_token_on_update() {
        let (_temp, db) = setup_test_db();
        let storage = TokenStorage::new(&db);

        storage
            .save("org1.crm4.dynamics.com", "access1", Some("refresh1"), None)
            .unwrap();

        storage
            .save("org1.crm4.dynamics.com", "access2", None, None)
            .unwrap();

        let loaded = storage.load("org1.crm4.dynamics.com").unwrap().unwrap();
        assert_eq!(loaded.access_token, "access2");
        assert_eq!(loaded.refresh_token, Some("refresh1".to_string()));
    }

    #[test]
    fn test_has_cached_token() {
        let (_temp, db) = setup_test_db();
        let storage = TokenStorage::new(&db);

        assert!(!has_cached_token(&db, "org1.crm4.dynamics.com"));

        storage
            .save("org1.crm4.dynamics.com", "token", None, Some(3600))
            .unwrap();
        assert!(has_cached_token(&db, "org1.crm4.dynamics.com"));
    }

    #[test]
    fn test_has_cached_token_expired() {
        let (_temp, db) = setup_test_db();

        db.conn()
            .execute(
                "INSERT INTO oauth_tokens (host, access_token, expires_at, updated_at)
                 VALUES ('expired.crm.dynamics.com', 'token', ?, unixepoch())",
                [Utc::now().timestamp() - 3600],
            )
            .unwrap();

        assert!(!has_cached_token(&db, "expired.crm.dynamics.com"));
    }
}
