use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookmark row as stored in the remote `bookmarks` table.
///
/// `tags` is nullable on the wire; a missing or null column decodes as an
/// empty list. Duplicate tags are preserved in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new bookmark; `id` and `created_at` are assigned
/// by the remote database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
}
