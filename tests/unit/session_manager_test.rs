//! Unit tests for the encrypted session vault.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use smartmark::database::Database;
use smartmark::managers::session_manager::{SessionManager, SessionManagerTrait};
use smartmark::types::session::AuthSession;

fn setup() -> (SessionManager, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().expect("open_in_memory failed"));
    let manager = SessionManager::new(Arc::clone(&db)).expect("SessionManager::new failed");
    (manager, db)
}

fn sample_session() -> AuthSession {
    AuthSession {
        access_token: "header.payload.signature".to_string(),
        refresh_token: "refresh-token-abc".to_string(),
        user_id: Uuid::from_u128(0xDEADBEEF),
        email: Some("user@example.com".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

#[test]
fn test_load_on_empty_vault_returns_none() {
    let (manager, _db) = setup();
    assert_eq!(manager.load_session().unwrap(), None);
    assert!(!manager.has_session());
}

#[test]
fn test_save_then_load_roundtrip() {
    let (manager, _db) = setup();
    let session = sample_session();

    manager.save_session(&session).unwrap();
    let loaded = manager.load_session().unwrap().expect("session should load");
    assert_eq!(loaded, session);
}

#[test]
fn test_save_overwrites_previous_session() {
    let (manager, db) = setup();

    manager.save_session(&sample_session()).unwrap();
    let mut replacement = sample_session();
    replacement.refresh_token = "refresh-token-new".to_string();
    manager.save_session(&replacement).unwrap();

    let loaded = manager.load_session().unwrap().expect("session should load");
    assert_eq!(loaded.refresh_token, "refresh-token-new");

    // The vault holds a single row, not a history.
    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM auth_sessions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_has_session_reflects_vault_state() {
    let (manager, _db) = setup();
    assert!(!manager.has_session());

    manager.save_session(&sample_session()).unwrap();
    assert!(manager.has_session());

    manager.clear_session().unwrap();
    assert!(!manager.has_session());
}

#[test]
fn test_clear_session_is_idempotent() {
    let (manager, _db) = setup();
    manager.clear_session().unwrap();
    manager.clear_session().unwrap();
}

#[test]
fn test_corrupt_blob_degrades_to_signed_out() {
    let (manager, db) = setup();
    manager.save_session(&sample_session()).unwrap();

    // Stomp the sealed blob directly; the auth tag can no longer verify.
    db.connection()
        .execute(
            "UPDATE auth_sessions SET sealed_session = X'0102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E'",
            [],
        )
        .unwrap();

    assert_eq!(manager.load_session().unwrap(), None);
    // The unreadable row was cleared, not left to fail again next start.
    assert!(!manager.has_session());
}

#[test]
fn test_sessions_persist_across_reopen() {
    let dir = TempDir::new().expect("tempdir failed");
    let db_path = dir.path().join("vault.db");
    let session = sample_session();

    {
        let db = Arc::new(Database::open(&db_path).expect("open failed"));
        let manager = SessionManager::new(db).expect("SessionManager::new failed");
        manager.save_session(&session).unwrap();
    }

    let db = Arc::new(Database::open(&db_path).expect("reopen failed"));
    let manager = SessionManager::new(db).expect("SessionManager::new failed");
    let loaded = manager.load_session().unwrap().expect("session should survive reopen");
    assert_eq!(loaded, session);
}
