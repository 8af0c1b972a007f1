//! Smartmark — a single-user bookmark manager with realtime sync.
//!
//! This library crate exposes all modules for use by the binaries and
//! integration tests. The `App` struct in [`app`] wires the pieces
//! together: OAuth sign-in against the hosted backend, an encrypted
//! local session vault, the remote bookmarks table, and a realtime
//! change feed that keeps the in-memory list converged.

pub mod app;
pub mod config;
pub mod database;
pub mod managers;
pub mod rpc_handler;
pub mod services;
pub mod types;
