//! SQLite connection management for the local session vault.
//!
//! Provides the [`Database`] struct that wraps a `rusqlite::Connection`
//! and automatically runs schema migrations on open.

use rusqlite::Connection;
use std::path::Path;

use super::migrations;

/// Database wrapper owning the SQLite connection to the session vault.
///
/// All required tables are created when the database is opened, so callers
/// never observe a partially-initialized schema.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the vault database at the given file path and
    /// runs migrations.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the connection cannot be established
    /// or migrations fail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Opens an in-memory database and runs migrations.
    ///
    /// Useful for testing; the database is discarded when the `Database`
    /// is dropped.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the connection cannot be established
    /// or migrations fail.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<(), rusqlite::Error> {
        migrations::run_all(&self.conn)
    }

    /// Returns a reference to the underlying `rusqlite::Connection` for
    /// modules that execute queries against the vault.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
