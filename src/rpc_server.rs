//! Smartmark RPC server — JSON-RPC over stdin/stdout for UI shells.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmarks.add", "params":{"url":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Pushes:   {"event":"ready"|"session"|"store", ...} lines, unprompted.

use std::io::{self, Write};
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use smartmark::app::App;
use smartmark::config::Config;
use smartmark::rpc_handler::handle_method;

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            request_count: 0,
            max_per_second,
        }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

/// Writes one protocol line to stdout.
fn emit_line(value: &Value) {
    println!("{}", value);
    let _ = io::stdout().flush();
}

// The session vault holds a SQLite connection, so the app stays on one
// thread; spawned tasks only carry channel handles.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr; stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with_writer(io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {}", e);
            std::process::exit(1);
        }
    };
    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("init error: {}", e);
            std::process::exit(1);
        }
    };

    match app.restore_session().await {
        Ok(Some(session)) => info!(user_id = %session.user_id, "restored session"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "session restore failed"),
    }

    // Push session transitions as event lines.
    let mut session_rx = app.watch_session();
    tokio::spawn(async move {
        while session_rx.changed().await.is_ok() {
            let data = session_rx
                .borrow()
                .as_ref()
                .map(|s| json!({"user_id": s.user_id, "email": s.email}));
            emit_line(&json!({"event": "session", "data": data}));
        }
    });

    // Signal ready
    emit_line(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    // Max 200 RPC requests per second.
    let mut rate_limiter = RateLimiter::new(200);
    let mut store_events_forwarded = false;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                emit_line(&json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            emit_line(&json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let result = handle_method(&app, method, &params).await;

        // The first successful subscribe starts forwarding store events.
        // Logout drops the store, which ends the forwarder task.
        if method == "bookmarks.subscribe" && result.is_ok() && !store_events_forwarded {
            if let Some(mut events) = app.store_events() {
                store_events_forwarded = true;
                tokio::spawn(async move {
                    loop {
                        match events.recv().await {
                            Ok(event) => match serde_json::to_value(&event) {
                                Ok(data) => emit_line(&json!({"event": "store", "data": data})),
                                Err(e) => warn!(error = %e, "failed to encode store event"),
                            },
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "store event stream lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                });
            }
        }
        if method == "auth.logout" && result.is_ok() {
            store_events_forwarded = false;
        }

        let response = match result {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        emit_line(&response);
    }

    app.shutdown().await;
}
