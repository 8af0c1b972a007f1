// Smartmark state managers
// Managers handle stateful operations: the bookmark list and the persisted session.

pub mod bookmark_store;
pub mod session_manager;
