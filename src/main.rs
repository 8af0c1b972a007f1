//! Smartmark — a single-user bookmark manager with realtime sync.
//!
//! Entry point: a small command-line interface over the app core. Run
//! without arguments for usage.

use std::io;

use tokio::sync::broadcast;
use uuid::Uuid;

use smartmark::app::App;
use smartmark::config::Config;
use smartmark::managers::bookmark_store::BookmarkStoreTrait;
use smartmark::types::bookmark::Bookmark;
use smartmark::types::event::StoreEvent;
use smartmark::types::session::AuthSession;

// The session vault holds a SQLite connection, so the app stays on one
// thread; spawned tasks only carry channel handles.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {}", e);
            std::process::exit(2);
        }
    };
    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("init error: {}", e);
            std::process::exit(2);
        }
    };

    let result = run(&app, command, &args[2..]).await;
    app.shutdown().await;
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(app: &App, command: &str, args: &[String]) -> Result<(), String> {
    match command {
        "signin-url" => {
            println!("{}", app.signin_url());
            eprintln!("Open the URL, authorize, then run: smartmark login <refresh-token>");
            Ok(())
        }
        "login" => {
            let token = args
                .first()
                .ok_or("usage: smartmark login <refresh-token>")?;
            let session = app
                .complete_sign_in(token)
                .await
                .map_err(|e| e.to_string())?;
            println!("signed in as {}", identity(&session));
            Ok(())
        }
        "logout" => {
            if app.restore_session().await.map_err(|e| e.to_string())?.is_none() {
                println!("not signed in");
                return Ok(());
            }
            app.sign_out().await.map_err(|e| e.to_string())?;
            println!("signed out");
            Ok(())
        }
        "status" => {
            match app.restore_session().await.map_err(|e| e.to_string())? {
                Some(session) => {
                    println!("signed in as {}", identity(&session));
                    println!("user id:    {}", session.user_id);
                    println!("expires at: {}", session.expires_at.to_rfc3339());
                }
                None => println!("not signed in"),
            }
            Ok(())
        }
        "list" => {
            require_session(app).await?;
            let store = app.store().ok_or("not signed in")?;
            let list = store.load().await.map_err(|e| e.to_string())?;
            if list.is_empty() {
                println!("no bookmarks");
            }
            for bookmark in &list {
                print_bookmark(bookmark);
            }
            Ok(())
        }
        "add" => {
            let url = args.first().ok_or("usage: smartmark add <url> [title] [tags]")?;
            let title = args.get(1).map(String::as_str).unwrap_or("");
            let tags = args.get(2).map(String::as_str).unwrap_or("");
            require_session(app).await?;
            let store = app.store().ok_or("not signed in")?;
            store
                .create(title, url, tags)
                .await
                .map_err(|e| e.to_string())?;
            println!("added {}", url);
            Ok(())
        }
        "remove" => {
            let id = args.first().ok_or("usage: smartmark remove <id>")?;
            let id = Uuid::parse_str(id).map_err(|e| format!("invalid id: {}", e))?;
            require_session(app).await?;
            let store = app.store().ok_or("not signed in")?;
            store.remove(id).await.map_err(|e| e.to_string())?;
            println!("removed {}", id);
            Ok(())
        }
        "search" => {
            let query = args.first().ok_or("usage: smartmark search <query>")?;
            require_session(app).await?;
            let store = app.store().ok_or("not signed in")?;
            store.load().await.map_err(|e| e.to_string())?;
            let matches = store.search(query);
            if matches.is_empty() {
                println!("no matches");
            }
            for bookmark in &matches {
                print_bookmark(bookmark);
            }
            Ok(())
        }
        "watch" => {
            require_session(app).await?;
            let store = app.store().ok_or("not signed in")?;
            store.load().await.map_err(|e| e.to_string())?;
            let mut events = app.store_events().ok_or("not signed in")?;
            app.subscribe_store().await.map_err(|e| e.to_string())?;
            eprintln!("watching for changes (ctrl-c to stop)");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    next = events.recv() => match next {
                        Ok(event) => print_event(&event),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            app.unsubscribe_store().await;
            Ok(())
        }
        other => Err(format!("unknown command: {} (try `smartmark help`)", other)),
    }
}

/// Restores the persisted session; errors if there is none.
async fn require_session(app: &App) -> Result<AuthSession, String> {
    match app.restore_session().await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err("not signed in (run `smartmark signin-url` to begin)".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn identity(session: &AuthSession) -> String {
    session
        .email
        .clone()
        .unwrap_or_else(|| session.user_id.to_string())
}

fn print_bookmark(bookmark: &Bookmark) {
    let tags = if bookmark.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", bookmark.tags.join(", "))
    };
    println!("{}  {}  {}{}", bookmark.id, bookmark.title, bookmark.url, tags);
}

fn print_event(event: &StoreEvent) {
    match event {
        StoreEvent::Loaded { count } => println!("loaded {} bookmarks", count),
        StoreEvent::Inserted { bookmark } => println!("+ {}  {}", bookmark.title, bookmark.url),
        StoreEvent::Updated { bookmark } => println!("~ {}  {}", bookmark.title, bookmark.url),
        StoreEvent::Removed { id } => println!("- {}", id),
    }
}

fn print_usage() {
    println!("Smartmark — bookmarks with realtime sync");
    println!();
    println!("Usage: smartmark <command> [args]");
    println!();
    println!("Commands:");
    println!("  signin-url                 Print the OAuth sign-in URL");
    println!("  login <refresh-token>      Complete sign-in with the redirect token");
    println!("  logout                     Sign out and clear the local session");
    println!("  status                     Show the current session");
    println!("  list                       Fetch and print all bookmarks");
    println!("  add <url> [title] [tags]   Add a bookmark (tags comma-separated)");
    println!("  remove <id>                Delete a bookmark by id");
    println!("  search <query>             Fetch and filter bookmarks");
    println!("  watch                      Stream live changes until interrupted");
    println!();
    println!("Environment: SUPABASE_URL, SUPABASE_ANON_KEY, SMARTMARK_DATA_DIR,");
    println!("  SMARTMARK_PROVIDER, SMARTMARK_REDIRECT_URL (a .env file is honored)");
}
