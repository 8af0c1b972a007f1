//! Realtime change feed for the `bookmarks` table.
//!
//! Connects to the hosted platform's phoenix-style websocket, joins a
//! channel scoped to one user's rows, and decodes postgres-changes
//! payloads into typed [`ChangeEvent`]s on an mpsc channel. A dropped
//! connection is rejoined with bounded exponential backoff; the store
//! never sees the gap, only a quiet feed. Dropping the returned
//! [`ChangeFeed`] (or calling `close`) stops the worker on every path.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::bookmark::Bookmark;
use crate::types::errors::RealtimeError;
use crate::types::event::ChangeEvent;

/// Heartbeat interval; the server drops connections quiet for ~60 s.
const HEARTBEAT_SECS: u64 = 25;

/// How long to wait for the channel join to be acknowledged.
const JOIN_TIMEOUT_SECS: u64 = 10;

/// Reconnect backoff bounds in seconds.
const BACKOFF_START_SECS: u64 = 1;
const BACKOFF_MAX_SECS: u64 = 30;

/// Buffered events between the socket worker and the store's drain task.
const FEED_BUFFER: usize = 256;

/// The ref string used for the channel join request.
const JOIN_REF: &str = "1";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Trait defining realtime feed operations.
#[async_trait]
pub trait RealtimeClientTrait: Send + Sync {
    /// Opens a change feed scoped to rows owned by `user_id`.
    ///
    /// Fails only when the initial connect or join fails; once
    /// established, drops are retried internally.
    async fn open_channel(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<ChangeFeed, RealtimeError>;
}

/// Handle to an open change feed. Dropping it shuts the worker down.
pub struct ChangeFeed {
    events: mpsc::Receiver<ChangeEvent>,
    shutdown: watch::Sender<bool>,
}

impl ChangeFeed {
    pub fn new(events: mpsc::Receiver<ChangeEvent>, shutdown: watch::Sender<bool>) -> Self {
        Self { events, shutdown }
    }

    /// Receives the next change event; `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Stops the feed worker.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// A decoded message from the realtime server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// A row change on the subscribed table.
    Change(ChangeEvent),
    /// The channel join was acknowledged.
    JoinOk,
    /// The channel join was rejected.
    JoinError(String),
    /// The server closed or errored the channel; reconnect.
    ChannelClosed,
    /// Heartbeat replies and other protocol chatter.
    Ignored,
}

/// Builds the websocket endpoint from the platform base URL.
pub fn websocket_url(base_url: &str, anon_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("wss://{}", base)
    };
    format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", ws_base, anon_key)
}

/// Topic for one user's bookmark changes.
pub fn channel_topic(user_id: Uuid) -> String {
    format!("realtime:bookmarks:{}", user_id)
}

/// The channel join request, subscribing to all changes on `bookmarks`
/// rows owned by `user_id`.
pub fn join_message(user_id: Uuid, access_token: &str) -> Value {
    serde_json::json!({
        "topic": channel_topic(user_id),
        "event": "phx_join",
        "ref": JOIN_REF,
        "payload": {
            "access_token": access_token,
            "config": {
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": "bookmarks",
                    "filter": format!("user_id=eq.{}", user_id),
                }],
            },
        },
    })
}

/// A heartbeat frame with the given ref.
pub fn heartbeat_message(msg_ref: u64) -> Value {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "ref": msg_ref.to_string(),
        "payload": {},
    })
}

/// Delay before reconnect attempt `attempt` (1-based), doubling from
/// one second and capped at thirty.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(5);
    Duration::from_secs((BACKOFF_START_SECS << exp).min(BACKOFF_MAX_SECS))
}

/// Parses one text frame from the server.
///
/// Junk frames are a protocol error the caller can log and skip; they do
/// not tear the channel down.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, RealtimeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| RealtimeError::ProtocolError(e.to_string()))?;
    let event = value.get("event").and_then(Value::as_str).unwrap_or_default();

    match event {
        "postgres_changes" => {
            let data = value
                .pointer("/payload/data")
                .ok_or_else(|| RealtimeError::ProtocolError("change without data".to_string()))?;
            decode_change(data).map(ServerMessage::Change)
        }
        "phx_reply" => {
            if value.get("ref").and_then(Value::as_str) != Some(JOIN_REF) {
                return Ok(ServerMessage::Ignored);
            }
            let status = value
                .pointer("/payload/status")
                .and_then(Value::as_str)
                .unwrap_or("error");
            if status == "ok" {
                Ok(ServerMessage::JoinOk)
            } else {
                let detail = value
                    .pointer("/payload/response")
                    .map(Value::to_string)
                    .unwrap_or_else(|| "no detail".to_string());
                Ok(ServerMessage::JoinError(detail))
            }
        }
        "phx_error" | "phx_close" => Ok(ServerMessage::ChannelClosed),
        _ => Ok(ServerMessage::Ignored),
    }
}

/// Decodes the `data` object of a postgres-changes payload.
///
/// Insert and update frames carry the full row under `record`; delete
/// frames carry only the identity columns under `old_record`.
pub fn decode_change(data: &Value) -> Result<ChangeEvent, RealtimeError> {
    let kind = data.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "INSERT" | "UPDATE" => {
            let record = data.get("record").cloned().ok_or_else(|| {
                RealtimeError::ProtocolError(format!("{} without record", kind))
            })?;
            let bookmark: Bookmark = serde_json::from_value(record)
                .map_err(|e| RealtimeError::ProtocolError(format!("bad record: {}", e)))?;
            if kind == "INSERT" {
                Ok(ChangeEvent::Insert(bookmark))
            } else {
                Ok(ChangeEvent::Update(bookmark))
            }
        }
        "DELETE" => {
            let id = data
                .pointer("/old_record/id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| {
                    RealtimeError::ProtocolError("delete without old_record id".to_string())
                })?;
            Ok(ChangeEvent::Delete(id))
        }
        other => Err(RealtimeError::ProtocolError(format!(
            "unknown change type: {}",
            other
        ))),
    }
}

/// Websocket-backed implementation of the realtime feed.
pub struct RealtimeClient {
    base_url: String,
    anon_key: String,
}

impl RealtimeClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl RealtimeClientTrait for RealtimeClient {
    async fn open_channel(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<ChangeFeed, RealtimeError> {
        let url = websocket_url(&self.base_url, &self.anon_key);

        // The first connect and join run inline so the caller sees a
        // failure to establish; reconnects happen inside the worker.
        let ws = connect_and_join(&url, access_token, user_id).await?;
        info!(%user_id, "realtime channel joined");

        let (events_tx, events_rx) = mpsc::channel(FEED_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = FeedWorker {
            url,
            access_token: access_token.to_string(),
            user_id,
            events: events_tx,
            shutdown: shutdown_rx,
        };
        tokio::spawn(worker.run(ws));

        Ok(ChangeFeed::new(events_rx, shutdown_tx))
    }
}

/// Connects, sends the channel join, and waits for the acknowledgement.
async fn connect_and_join(
    url: &str,
    access_token: &str,
    user_id: Uuid,
) -> Result<WsStream, RealtimeError> {
    let (mut ws, _) = connect_async(url)
        .await
        .map_err(|e| RealtimeError::ConnectFailed(e.to_string()))?;

    let join = join_message(user_id, access_token).to_string();
    ws.send(tungstenite::Message::Text(join))
        .await
        .map_err(|e| RealtimeError::ConnectFailed(e.to_string()))?;

    let joined = tokio::time::timeout(
        Duration::from_secs(JOIN_TIMEOUT_SECS),
        wait_for_join(&mut ws),
    )
    .await
    .map_err(|_| RealtimeError::JoinRejected("join timed out".to_string()))?;
    joined?;

    Ok(ws)
}

async fn wait_for_join(ws: &mut WsStream) -> Result<(), RealtimeError> {
    while let Some(frame) = ws.next().await {
        let frame = frame.map_err(|e| RealtimeError::ConnectFailed(e.to_string()))?;
        let text = match frame {
            tungstenite::Message::Text(text) => text,
            tungstenite::Message::Close(_) => {
                return Err(RealtimeError::ConnectFailed(
                    "closed during join".to_string(),
                ))
            }
            _ => continue,
        };
        match parse_server_message(&text)? {
            ServerMessage::JoinOk => return Ok(()),
            ServerMessage::JoinError(detail) => return Err(RealtimeError::JoinRejected(detail)),
            ServerMessage::ChannelClosed => {
                return Err(RealtimeError::ConnectFailed(
                    "channel closed during join".to_string(),
                ))
            }
            ServerMessage::Change(_) | ServerMessage::Ignored => continue,
        }
    }
    Err(RealtimeError::ConnectFailed(
        "connection ended during join".to_string(),
    ))
}

/// Why a pump session over one socket ended.
enum SessionEnd {
    /// Shutdown was requested or the event receiver is gone.
    Finished,
    /// The socket dropped or errored; reconnect.
    Lost,
}

struct FeedWorker {
    url: String,
    access_token: String,
    user_id: Uuid,
    events: mpsc::Sender<ChangeEvent>,
    shutdown: watch::Receiver<bool>,
}

impl FeedWorker {
    async fn run(mut self, first: WsStream) {
        let mut attempt: u32 = 0;
        let mut socket = Some(first);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let ws = match socket.take() {
                Some(ws) => ws,
                None => match connect_and_join(&self.url, &self.access_token, self.user_id).await {
                    Ok(ws) => {
                        info!(user_id = %self.user_id, "realtime channel rejoined");
                        attempt = 0;
                        ws
                    }
                    Err(e) => {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        warn!(%e, attempt, "realtime rejoin failed, backing off {:?}", delay);
                        if self.sleep_or_shutdown(delay).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            match self.pump(ws).await {
                SessionEnd::Finished => break,
                SessionEnd::Lost => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    warn!(attempt, "realtime channel dropped, reconnecting in {:?}", delay);
                    if self.sleep_or_shutdown(delay).await {
                        break;
                    }
                }
            }
        }

        debug!(user_id = %self.user_id, "realtime feed worker stopped");
    }

    /// Sleeps for `delay`, returning true if shutdown arrived meanwhile.
    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => *self.shutdown.borrow(),
            _ = self.shutdown.changed() => *self.shutdown.borrow(),
        }
    }

    /// Drives one joined socket until shutdown or loss.
    async fn pump(&mut self, ws: WsStream) -> SessionEnd {
        let (mut ws_tx, mut ws_rx) = ws.split();

        let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_SECS));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The interval fires immediately; the join just went out, so skip one.
        heartbeat.tick().await;
        let mut heartbeat_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        let _ = ws_tx.send(tungstenite::Message::Close(None)).await;
                        return SessionEnd::Finished;
                    }
                }
                _ = heartbeat.tick() => {
                    let frame = heartbeat_message(heartbeat_ref).to_string();
                    heartbeat_ref += 1;
                    if ws_tx.send(tungstenite::Message::Text(frame)).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
                frame = ws_rx.next() => {
                    let Some(frame) = frame else { return SessionEnd::Lost; };
                    let Ok(frame) = frame else { return SessionEnd::Lost; };
                    let text = match frame {
                        tungstenite::Message::Text(text) => text,
                        tungstenite::Message::Ping(payload) => {
                            let _ = ws_tx.send(tungstenite::Message::Pong(payload)).await;
                            continue;
                        }
                        tungstenite::Message::Close(_) => return SessionEnd::Lost,
                        _ => continue,
                    };
                    match parse_server_message(&text) {
                        Ok(ServerMessage::Change(event)) => {
                            if self.events.send(event).await.is_err() {
                                return SessionEnd::Finished;
                            }
                        }
                        Ok(ServerMessage::ChannelClosed) => return SessionEnd::Lost,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(%e, "skipping malformed realtime frame");
                        }
                    }
                }
            }
        }
    }
}
