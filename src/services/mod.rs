// Smartmark services
// Services provide core functionality: auth, the remote bookmarks table, the realtime feed, crypto.

pub mod auth_client;
pub mod bookmark_api;
pub mod crypto_service;
pub mod realtime_client;
