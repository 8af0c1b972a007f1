//! Remote table access for the `bookmarks` table.
//!
//! Speaks the PostgREST dialect of the hosted platform: row filters are
//! query parameters (`user_id=eq.<uuid>`), inserts take a JSON array
//! body, and row-level security on the server restricts every call to
//! the rows owned by the bearer token's user. That authorization is a
//! trust boundary; nothing is re-checked locally.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::ApiError;

/// Trait defining remote bookmark table operations.
#[async_trait]
pub trait BookmarkApiTrait: Send + Sync {
    /// Fetches all bookmarks owned by `user_id`, newest first.
    async fn select_bookmarks(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<Vec<Bookmark>, ApiError>;

    /// Inserts a new bookmark row.
    async fn insert_bookmark(
        &self,
        access_token: &str,
        bookmark: &NewBookmark,
    ) -> Result<(), ApiError>;

    /// Deletes the bookmark with the given id. Succeeds even when the row
    /// is already gone; the filtered delete matches zero rows.
    async fn delete_bookmark(&self, access_token: &str, id: Uuid) -> Result<(), ApiError>;
}

/// Error body returned by the data service on rejected requests.
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: Option<String>,
}

/// PostgREST-backed implementation of the bookmark table operations.
pub struct BookmarkApi {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl BookmarkApi {
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/bookmarks", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder, access_token: &str) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    async fn status_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let message = response
            .json::<RestErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "no error detail".to_string());
        ApiError::Status(status, message)
    }
}

#[async_trait]
impl BookmarkApiTrait for BookmarkApi {
    async fn select_bookmarks(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<Vec<Bookmark>, ApiError> {
        let owner_filter = format!("eq.{}", user_id);
        let request = self.authed(self.http.get(self.table_url()), access_token).query(&[
            ("select", "*"),
            ("user_id", owner_filter.as_str()),
            ("order", "created_at.desc"),
        ]);

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let rows: Vec<Bookmark> = response
            .json()
            .await
            .map_err(|e| ApiError::DecodeError(e.to_string()))?;

        debug!(count = rows.len(), "selected bookmarks");
        Ok(rows)
    }

    async fn insert_bookmark(
        &self,
        access_token: &str,
        bookmark: &NewBookmark,
    ) -> Result<(), ApiError> {
        let response = self
            .authed(self.http.post(self.table_url()), access_token)
            .header("Prefer", "return=minimal")
            .json(&[bookmark])
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!(url = %bookmark.url, "inserted bookmark");
        Ok(())
    }

    async fn delete_bookmark(&self, access_token: &str, id: Uuid) -> Result<(), ApiError> {
        let response = self
            .authed(self.http.delete(self.table_url()), access_token)
            .query(&[("id", &format!("eq.{}", id))])
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!(%id, "deleted bookmark");
        Ok(())
    }
}
