use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bookmark::Bookmark;

/// A typed change notification delivered by the realtime feed.
///
/// Delete payloads carry only the old row's identity columns, so the
/// variant holds just the id.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Bookmark),
    Update(Bookmark),
    Delete(Uuid),
}

/// A notification emitted by the store when its list actually changes.
/// No event is emitted for no-op applications (duplicate insert, absent
/// update or delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEvent {
    Loaded { count: usize },
    Inserted { bookmark: Bookmark },
    Updated { bookmark: Bookmark },
    Removed { id: Uuid },
}
