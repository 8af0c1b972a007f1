//! RPC method handler for the Smartmark JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! appropriate managers and services via the `App` struct.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::App;
use crate::managers::bookmark_store::BookmarkStoreTrait;

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        // ─── Auth ───
        "auth.signin_url" => Ok(json!({"url": app.signin_url()})),
        "auth.login" => {
            let refresh_token = params
                .get("refresh_token")
                .and_then(|v| v.as_str())
                .ok_or("missing refresh_token")?;
            let session = app
                .complete_sign_in(refresh_token)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"user_id": session.user_id, "email": session.email}))
        }
        "auth.logout" => {
            app.sign_out().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "auth.status" => match app.session() {
            Some(session) => Ok(json!({
                "signed_in": true,
                "user_id": session.user_id,
                "email": session.email,
                "expires_at": session.expires_at.to_rfc3339(),
            })),
            None => Ok(json!({"signed_in": false})),
        },

        // ─── Bookmarks ───
        "bookmarks.reload" => {
            app.refresh_session_if_needed()
                .await
                .map_err(|e| e.to_string())?;
            let store = app.store().ok_or("not signed in")?;
            let list = store.load().await.map_err(|e| e.to_string())?;
            Ok(json!({"count": list.len()}))
        }
        "bookmarks.list" => {
            let store = app.store().ok_or("not signed in")?;
            let arr: Vec<Value> = store
                .snapshot()
                .iter()
                .map(|b| json!({"id": b.id, "title": b.title, "url": b.url, "tags": b.tags, "created_at": b.created_at}))
                .collect();
            Ok(json!(arr))
        }
        "bookmarks.search" => {
            let query = params
                .get("query")
                .and_then(|v| v.as_str())
                .ok_or("missing query")?;
            let store = app.store().ok_or("not signed in")?;
            let arr: Vec<Value> = store
                .search(query)
                .iter()
                .map(|b| json!({"id": b.id, "title": b.title, "url": b.url, "tags": b.tags}))
                .collect();
            Ok(json!(arr))
        }
        "bookmarks.add" => {
            let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");
            let title = params.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let tags = params.get("tags").and_then(|v| v.as_str()).unwrap_or("");
            app.refresh_session_if_needed()
                .await
                .map_err(|e| e.to_string())?;
            let store = app.store().ok_or("not signed in")?;
            store
                .create(title, url, tags)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmarks.remove" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let id = Uuid::parse_str(id).map_err(|e| format!("invalid id: {}", e))?;
            app.refresh_session_if_needed()
                .await
                .map_err(|e| e.to_string())?;
            let store = app.store().ok_or("not signed in")?;
            store.remove(id).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmarks.subscribe" => {
            app.refresh_session_if_needed()
                .await
                .map_err(|e| e.to_string())?;
            app.subscribe_store().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Ping ───
        "ping" => Ok(json!({"pong": true})),

        _ => Err(format!("unknown method: {}", method)),
    }
}
