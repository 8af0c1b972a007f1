//! Session vault for Smartmark.
//!
//! Persists the authenticated session (access and refresh tokens) between
//! runs, encrypted with AES-256-GCM via CryptoService and stored in the
//! local SQLite database. Bookmarks are never stored here; only the
//! session survives a restart.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::params;
use tracing::warn;
use zeroize::Zeroize;

use crate::database::connection::Database;
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait};
use crate::types::errors::SessionError;
use crate::types::session::AuthSession;

/// Internal vault encryption key derived from a fixed identifier.
/// In production this would use a machine-specific identifier; for now a
/// fixed passphrase + salt.
const VAULT_KEY_PASSPHRASE: &str = "smartmark-session-vault-v1";
const VAULT_KEY_SALT: &[u8] = b"smartmark-vault";

/// The vault holds at most one session under this row id.
const VAULT_ROW_ID: &str = "default";

/// Trait defining session vault operations.
pub trait SessionManagerTrait {
    fn save_session(&self, session: &AuthSession) -> Result<(), SessionError>;
    fn load_session(&self) -> Result<Option<AuthSession>, SessionError>;
    fn has_session(&self) -> bool;
    fn clear_session(&self) -> Result<(), SessionError>;
}

/// Session vault implementation backed by SQLite + CryptoService.
pub struct SessionManager {
    db: Arc<Database>,
    crypto: CryptoService,
    encryption_key: Vec<u8>,
}

impl SessionManager {
    /// Creates a new SessionManager.
    ///
    /// Derives the vault encryption key on construction.
    pub fn new(db: Arc<Database>) -> Result<Self, SessionError> {
        let crypto = CryptoService::new();
        let encryption_key = crypto
            .derive_key(VAULT_KEY_PASSPHRASE, VAULT_KEY_SALT)
            .map_err(|e| SessionError::CryptoError(e.to_string()))?;

        Ok(Self {
            db,
            crypto,
            encryption_key,
        })
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
    }
}

impl SessionManagerTrait for SessionManager {
    /// Saves the session: serializes to JSON, seals, and upserts the
    /// single vault row.
    fn save_session(&self, session: &AuthSession) -> Result<(), SessionError> {
        let json = serde_json::to_vec(session)
            .map_err(|e| SessionError::SerializationError(e.to_string()))?;

        let sealed = self
            .crypto
            .seal(&json, &self.encryption_key)
            .map_err(|e| SessionError::CryptoError(e.to_string()))?;

        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        self.db
            .connection()
            .execute(
                "INSERT OR REPLACE INTO auth_sessions (id, sealed_session, updated_at) VALUES (?1, ?2, ?3)",
                params![VAULT_ROW_ID, sealed, updated_at],
            )
            .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Loads the stored session, if any.
    ///
    /// A blob that fails to open or deserialize (key rotation, corruption)
    /// is cleared and reported as absent rather than as an error, so a
    /// damaged vault degrades to "signed out" instead of wedging startup.
    fn load_session(&self) -> Result<Option<AuthSession>, SessionError> {
        let conn = self.db.connection();

        let result = conn.query_row(
            "SELECT sealed_session FROM auth_sessions WHERE id = ?1",
            params![VAULT_ROW_ID],
            |row| row.get::<_, Vec<u8>>(0),
        );

        let sealed = match result {
            Ok(sealed) => sealed,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(SessionError::DatabaseError(e.to_string())),
        };

        let opened = self
            .crypto
            .open(&sealed, &self.encryption_key)
            .ok()
            .and_then(|json| serde_json::from_slice::<AuthSession>(&json).ok());

        match opened {
            Some(session) => Ok(Some(session)),
            None => {
                warn!("stored session could not be opened, clearing vault");
                self.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Returns true if a session row exists in the vault.
    fn has_session(&self) -> bool {
        let conn = self.db.connection();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM auth_sessions WHERE id = ?1",
                params![VAULT_ROW_ID],
                |row| row.get(0),
            )
            .unwrap_or(0);
        count > 0
    }

    /// Removes the stored session. Idempotent.
    fn clear_session(&self) -> Result<(), SessionError> {
        self.db
            .connection()
            .execute(
                "DELETE FROM auth_sessions WHERE id = ?1",
                params![VAULT_ROW_ID],
            )
            .map_err(|e| SessionError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
