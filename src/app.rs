//! App core for Smartmark.
//!
//! Central struct holding the collaborators and managing the session
//! lifecycle: sign-in, restore, refresh, sign-out, and the per-user
//! bookmark store with its realtime feed.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::config::Config;
use crate::database::connection::Database;
use crate::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait, FeedHandle};
use crate::managers::session_manager::{SessionManager, SessionManagerTrait};
use crate::services::auth_client::{AuthClient, AuthClientTrait};
use crate::services::bookmark_api::{BookmarkApi, BookmarkApiTrait};
use crate::services::realtime_client::{RealtimeClient, RealtimeClientTrait};
use crate::types::errors::{AuthError, StoreError};
use crate::types::event::StoreEvent;
use crate::types::session::AuthSession;

/// Central application struct holding the collaborators.
///
/// The session is published through a watch channel; the bookmark store
/// reads its access token from there, so a refresh propagates without
/// rebuilding the store. At most one realtime feed is active at a time.
pub struct App {
    pub config: Config,
    pub db: Arc<Database>,
    session_manager: SessionManager,
    auth: Arc<dyn AuthClientTrait>,
    api: Arc<dyn BookmarkApiTrait>,
    realtime: Arc<dyn RealtimeClientTrait>,
    session_tx: watch::Sender<Option<AuthSession>>,
    store: Mutex<Option<Arc<BookmarkStore>>>,
    feed: Mutex<Option<FeedHandle>>,
}

impl App {
    /// Creates a new App against the real backend described by `config`.
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| format!("data dir {}: {}", config.data_dir.display(), e))?;
        let db = Arc::new(Database::open(config.db_path())?);

        let http = reqwest::Client::new();
        let auth: Arc<dyn AuthClientTrait> = Arc::new(AuthClient::new(
            http.clone(),
            &config.supabase_url,
            &config.anon_key,
            &config.provider,
        ));
        let api: Arc<dyn BookmarkApiTrait> = Arc::new(BookmarkApi::new(
            http,
            &config.supabase_url,
            &config.anon_key,
        ));
        let realtime: Arc<dyn RealtimeClientTrait> =
            Arc::new(RealtimeClient::new(&config.supabase_url, &config.anon_key));

        Self::with_services(config, db, auth, api, realtime)
    }

    /// Creates an App over explicit collaborators.
    pub fn with_services(
        config: Config,
        db: Arc<Database>,
        auth: Arc<dyn AuthClientTrait>,
        api: Arc<dyn BookmarkApiTrait>,
        realtime: Arc<dyn RealtimeClientTrait>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session_manager = SessionManager::new(db.clone())
            .map_err(|e| format!("SessionManager init failed: {}", e))?;
        let (session_tx, _) = watch::channel(None);

        Ok(Self {
            config,
            db,
            session_manager,
            auth,
            api,
            realtime,
            session_tx,
            store: Mutex::new(None),
            feed: Mutex::new(None),
        })
    }

    /// The URL the user opens in a browser to start the OAuth flow.
    pub fn signin_url(&self) -> String {
        self.auth.authorize_url(&self.config.redirect_url)
    }

    /// Completes sign-in from the refresh token the OAuth redirect
    /// delivered, persists the session, and installs the store.
    pub async fn complete_sign_in(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let session = self.auth.exchange_refresh_token(refresh_token).await?;
        if let Err(e) = self.session_manager.save_session(&session) {
            warn!(error = %e, "failed to persist session, continuing in memory");
        }
        self.install_store(&session);
        info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    /// Restores the persisted session from the vault, refreshing the
    /// access token when it is near expiry. A rejected refresh token
    /// clears the vault and restores to the signed-out state; network
    /// failures propagate so a flaky connection does not wipe the vault.
    pub async fn restore_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let saved = self
            .session_manager
            .load_session()
            .map_err(|e| AuthError::ApiError(format!("session vault: {}", e)))?;
        let Some(saved) = saved else {
            return Ok(None);
        };

        let session = match self.auth.refresh_if_needed(&saved).await {
            Ok(session) => session,
            Err(AuthError::NetworkError(e)) => return Err(AuthError::NetworkError(e)),
            Err(e) => {
                warn!(error = %e, "stored session rejected, clearing vault");
                if let Err(e) = self.session_manager.clear_session() {
                    warn!(error = %e, "failed to clear session vault");
                }
                return Ok(None);
            }
        };

        if session.access_token != saved.access_token {
            if let Err(e) = self.session_manager.save_session(&session) {
                warn!(error = %e, "failed to persist refreshed session");
            }
        }

        self.install_store(&session);
        info!(user_id = %session.user_id, "session restored");
        Ok(Some(session))
    }

    /// Refreshes the current access token if it is near expiry and
    /// republishes it to the watch channel.
    pub async fn refresh_session_if_needed(&self) -> Result<AuthSession, AuthError> {
        let current = self.session().ok_or(AuthError::NotAuthenticated)?;
        if !current.needs_refresh() {
            return Ok(current);
        }

        let refreshed = self.auth.refresh_if_needed(&current).await?;
        if refreshed.access_token != current.access_token {
            if let Err(e) = self.session_manager.save_session(&refreshed) {
                warn!(error = %e, "failed to persist refreshed session");
            }
            self.session_tx.send_replace(Some(refreshed.clone()));
        }
        Ok(refreshed)
    }

    /// Signs out: stops the feed, closes the store, clears the vault,
    /// and revokes the token server-side on a best-effort basis.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.session();

        let handle = { self.feed_slot().take() };
        if let Some(handle) = handle {
            handle.stop().await;
        }
        if let Some(store) = self.store_slot().take() {
            store.close();
        }

        self.session_manager
            .clear_session()
            .map_err(|e| AuthError::ApiError(format!("session vault: {}", e)))?;
        self.session_tx.send_replace(None);

        if let Some(session) = session {
            if let Err(e) = self.auth.sign_out(&session.access_token).await {
                warn!(error = %e, "server-side sign-out failed");
            }
        }
        info!("signed out");
        Ok(())
    }

    /// The current session, if signed in.
    pub fn session(&self) -> Option<AuthSession> {
        self.session_tx.borrow().clone()
    }

    /// Subscribes to session changes.
    pub fn watch_session(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session_tx.subscribe()
    }

    /// The bookmark store for the signed-in user, if any.
    pub fn store(&self) -> Option<Arc<BookmarkStore>> {
        self.store_slot().clone()
    }

    /// Opens the realtime feed for the current store. Replacing an
    /// active feed stops the old drain task.
    pub async fn subscribe_store(&self) -> Result<(), StoreError> {
        let store = self
            .store()
            .ok_or_else(|| StoreError::Channel("not signed in".to_string()))?;
        let handle = store.subscribe().await?;
        let previous = { self.feed_slot().replace(handle) };
        drop(previous);
        Ok(())
    }

    /// Stops the active realtime feed, if any.
    pub async fn unsubscribe_store(&self) {
        let handle = { self.feed_slot().take() };
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    /// Subscribes to store change notifications, if a store is installed.
    pub fn store_events(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        self.store().map(|store| store.subscribe_events())
    }

    /// Shutdown sequence: stop the feed; the vault keeps the session.
    pub async fn shutdown(&self) {
        self.unsubscribe_store().await;
    }

    /// Installs (or keeps) the store for the session's user and
    /// publishes the session.
    fn install_store(&self, session: &AuthSession) {
        {
            let mut slot = self.store_slot();
            let keep = matches!(slot.as_ref(), Some(store) if store.user_id() == session.user_id);
            if !keep {
                if let Some(old) = slot.take() {
                    old.close();
                }
                *slot = Some(Arc::new(BookmarkStore::new(
                    session.user_id,
                    self.session_tx.subscribe(),
                    Arc::clone(&self.api),
                    Arc::clone(&self.realtime),
                )));
            }
        }
        self.session_tx.send_replace(Some(session.clone()));
    }

    fn store_slot(&self) -> MutexGuard<'_, Option<Arc<BookmarkStore>>> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn feed_slot(&self) -> MutexGuard<'_, Option<FeedHandle>> {
        self.feed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
