//! The bookmark store: the local projection of one user's bookmarks.
//!
//! Owns the in-memory list (newest first), issues remote mutations
//! through the data service, and reconciles the list against change
//! events from the realtime feed. Mutations never touch the list
//! directly; convergence comes from reload or from event application,
//! whichever lands first. `apply_remote_event` is idempotent, so
//! duplicate or out-of-order deliveries cannot corrupt the list.
//!
//! Observers subscribe to [`StoreEvent`] notifications over a broadcast
//! channel; an event is emitted only when the list actually changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::services::bookmark_api::BookmarkApiTrait;
use crate::services::realtime_client::RealtimeClientTrait;
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::event::{ChangeEvent, StoreEvent};
use crate::types::session::AuthSession;

/// Buffered store events per observer.
const EVENT_BUFFER: usize = 64;

/// Normalized create-form input, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInput {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
}

/// Normalizes raw create-form input.
///
/// The URL is trimmed and given an `https://` scheme when no `http` or
/// `https` prefix is present, then parsed for validity. An empty title
/// falls back to the hostname of the normalized URL. Tags split on
/// commas; entries are trimmed, empties dropped, duplicates preserved.
pub fn normalize_input(
    raw_title: &str,
    raw_url: &str,
    raw_tags: &str,
) -> Result<NormalizedInput, StoreError> {
    let trimmed_url = raw_url.trim();
    if trimmed_url.is_empty() {
        return Err(StoreError::Validation("url is required".to_string()));
    }

    let has_scheme = {
        let lower = trimmed_url.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    };
    let url = if has_scheme {
        trimmed_url.to_string()
    } else {
        format!("https://{}", trimmed_url)
    };

    // Parse for validity and hostname only; the stored URL keeps the
    // user's spelling (no trailing-slash or case normalization).
    let parsed =
        Url::parse(&url).map_err(|e| StoreError::Validation(format!("invalid url: {}", e)))?;

    let trimmed_title = raw_title.trim();
    let title = if trimmed_title.is_empty() {
        parsed
            .host_str()
            .ok_or_else(|| StoreError::Validation("url has no host".to_string()))?
            .to_string()
    } else {
        trimmed_title.to_string()
    };

    let tags = split_tags(raw_tags);

    Ok(NormalizedInput { title, url, tags })
}

/// Splits a comma-separated tag string: trimmed, empties dropped,
/// duplicates and order preserved.
pub fn split_tags(raw_tags: &str) -> Vec<String> {
    raw_tags
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

/// Returns the bookmarks whose title, URL, or any tag contains `query`
/// case-insensitively. An empty query returns the list unchanged.
pub fn filter_bookmarks(list: &[Bookmark], query: &str) -> Vec<Bookmark> {
    if query.is_empty() {
        return list.to_vec();
    }
    let needle = query.to_lowercase();
    list.iter()
        .filter(|bookmark| {
            bookmark.title.to_lowercase().contains(&needle)
                || bookmark.url.to_lowercase().contains(&needle)
                || bookmark
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Handle to a running feed drain task. Stopping (or dropping) it halts
/// event delivery into the store and closes the underlying channel.
#[derive(Debug)]
pub struct FeedHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Stops the drain task and waits for it to finish.
    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

/// Trait defining the bookmark store interface.
#[async_trait]
pub trait BookmarkStoreTrait: Send + Sync {
    /// Fetches all of the user's bookmarks, newest first, and replaces
    /// the local list. On failure the list is left unchanged.
    async fn load(&self) -> Result<Vec<Bookmark>, StoreError>;

    /// Opens the change feed and spawns a task applying its events until
    /// the returned handle is stopped or dropped.
    async fn subscribe(self: Arc<Self>) -> Result<FeedHandle, StoreError>;

    /// Normalizes the raw form input and inserts the bookmark remotely.
    /// The local list is reconciled by reload or by the feed.
    async fn create(&self, raw_title: &str, raw_url: &str, raw_tags: &str)
        -> Result<(), StoreError>;

    /// Deletes the bookmark remotely. Deleting an already-absent row
    /// succeeds.
    async fn remove(&self, id: Uuid) -> Result<(), StoreError>;

    /// Applies one change event to the local list. Never fails; a
    /// duplicate insert or an absent update/delete is a no-op.
    fn apply_remote_event(&self, event: ChangeEvent);

    /// Returns a copy of the current list.
    fn snapshot(&self) -> Vec<Bookmark>;

    /// Filters the current list by the query.
    fn search(&self, query: &str) -> Vec<Bookmark>;

    /// Subscribes to store change notifications.
    fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent>;

    /// Tears the store down: clears the list and makes late completions
    /// and further events no-ops.
    fn close(&self);
}

/// Bookmark store bound to one signed-in user.
pub struct BookmarkStore {
    user_id: Uuid,
    session: watch::Receiver<Option<AuthSession>>,
    api: Arc<dyn BookmarkApiTrait>,
    realtime: Arc<dyn RealtimeClientTrait>,
    bookmarks: Mutex<Vec<Bookmark>>,
    events: broadcast::Sender<StoreEvent>,
    closed: AtomicBool,
}

impl BookmarkStore {
    pub fn new(
        user_id: Uuid,
        session: watch::Receiver<Option<AuthSession>>,
        api: Arc<dyn BookmarkApiTrait>,
        realtime: Arc<dyn RealtimeClientTrait>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            user_id,
            session,
            api,
            realtime,
            bookmarks: Mutex::new(Vec::new()),
            events,
            closed: AtomicBool::new(false),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// The current access token, if the watched session still belongs to
    /// this store's user.
    fn access_token(&self) -> Option<String> {
        let guard = self.session.borrow();
        guard
            .as_ref()
            .filter(|session| session.user_id == self.user_id)
            .map(|session| session.access_token.clone())
    }

    // The list is plain data; if another thread panicked mid-mutation the
    // data is still usable, so recover it instead of propagating poison.
    fn list(&self) -> MutexGuard<'_, Vec<Bookmark>> {
        self.bookmarks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine; nobody is watching.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl BookmarkStoreTrait for BookmarkStore {
    async fn load(&self) -> Result<Vec<Bookmark>, StoreError> {
        let token = self
            .access_token()
            .ok_or_else(|| StoreError::Fetch("no active session".to_string()))?;

        let rows = self
            .api
            .select_bookmarks(&token, self.user_id)
            .await
            .map_err(|e| StoreError::Fetch(e.to_string()))?;

        if self.is_closed() {
            debug!("store closed, discarding load result");
            return Ok(Vec::new());
        }

        {
            let mut list = self.list();
            *list = rows.clone();
        }
        info!(count = rows.len(), "bookmark list loaded");
        self.emit(StoreEvent::Loaded { count: rows.len() });
        Ok(rows)
    }

    async fn subscribe(self: Arc<Self>) -> Result<FeedHandle, StoreError> {
        let token = self
            .access_token()
            .ok_or_else(|| StoreError::Channel("no active session".to_string()))?;

        let mut feed = self
            .realtime
            .open_channel(&token, self.user_id)
            .await
            .map_err(|e| StoreError::Channel(e.to_string()))?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let store = Arc::clone(&self);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                    event = feed.recv() => {
                        let Some(event) = event else { break; };
                        store.apply_remote_event(event);
                    }
                }
            }
            feed.close();
            debug!(user_id = %store.user_id, "feed drain task stopped");
        });

        Ok(FeedHandle {
            stop: stop_tx,
            task: Some(task),
        })
    }

    async fn create(
        &self,
        raw_title: &str,
        raw_url: &str,
        raw_tags: &str,
    ) -> Result<(), StoreError> {
        let input = normalize_input(raw_title, raw_url, raw_tags)?;

        let token = self
            .access_token()
            .ok_or_else(|| StoreError::Persistence("no active session".to_string()))?;

        let bookmark = NewBookmark {
            user_id: self.user_id,
            title: input.title,
            url: input.url,
            tags: input.tags,
        };
        self.api
            .insert_bookmark(&token, &bookmark)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        info!(url = %bookmark.url, "bookmark created");
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        let token = self
            .access_token()
            .ok_or_else(|| StoreError::Persistence("no active session".to_string()))?;

        self.api
            .delete_bookmark(&token, id)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        info!(%id, "bookmark deleted");
        Ok(())
    }

    fn apply_remote_event(&self, event: ChangeEvent) {
        if self.is_closed() {
            debug!("store closed, ignoring change event");
            return;
        }

        let emitted = {
            let mut list = self.list();
            match event {
                ChangeEvent::Insert(bookmark) => {
                    if list.iter().any(|b| b.id == bookmark.id) {
                        None
                    } else {
                        list.insert(0, bookmark.clone());
                        Some(StoreEvent::Inserted { bookmark })
                    }
                }
                ChangeEvent::Update(bookmark) => {
                    match list.iter().position(|b| b.id == bookmark.id) {
                        Some(index) => {
                            list[index] = bookmark.clone();
                            Some(StoreEvent::Updated { bookmark })
                        }
                        None => None,
                    }
                }
                ChangeEvent::Delete(id) => {
                    let before = list.len();
                    list.retain(|b| b.id != id);
                    if list.len() < before {
                        Some(StoreEvent::Removed { id })
                    } else {
                        None
                    }
                }
            }
        };

        if let Some(event) = emitted {
            self.emit(event);
        }
    }

    fn snapshot(&self) -> Vec<Bookmark> {
        self.list().clone()
    }

    fn search(&self, query: &str) -> Vec<Bookmark> {
        filter_bookmarks(&self.list(), query)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.list().clear();
        debug!(user_id = %self.user_id, "store closed");
    }
}
