//! HTTP server for slide decks.
//!
//! Serves a directory of `*.slide` markdown decks:
//! - `GET /` lists every deck in the root
//! - `GET /{name}.slide` renders a deck through `slides.tpl`
//! - `GET /res/{*path}` serves static files
//! - `GET /ws` pushes a refresh to the browser when a watched file changes
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use slides_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root_dir: PathBuf::from("talks"),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router
//!                        │
//!                        ├─► index / deck / asset handlers ──► templates (shared, read-only)
//!                        │
//!                        └─► /ws ──► Session (one per connection)
//!                                       │
//!                                       └─► ChangeWatcher ──► notify
//! ```

mod app;
mod error;
mod handlers;
mod live_reload;
mod middleware;
mod protocol;
mod source;
mod state;
mod templates;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use error::ServerError;
use state::AppState;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Deck root directory.
    pub root_dir: PathBuf,
    /// Enable live reload.
    pub live_reload_enabled: bool,
    /// Files watched by every live reload session, relative to the root.
    pub watch: Vec<String>,
    /// How long live sessions get to finish after shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        server_config_from_config(&slides_config::Config::default())
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if templates cannot be loaded or the listener cannot
/// be bound.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let templates = templates::load_templates(&config.root_dir)?;

    let shutdown = CancellationToken::new();
    let sessions = TaskTracker::new();
    let state = Arc::new(AppState {
        root_dir: config.root_dir.clone(),
        templates: Arc::new(templates),
        live_reload_enabled: config.live_reload_enabled,
        initial_watch: config.watch.clone(),
        shutdown: shutdown.clone(),
        sessions: sessions.clone(),
    });

    let app = app::create_router(state);

    let addr = bind_address(&config.host, config.port)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Starting server");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await?;

    // Sessions were cancelled with the root token; give them a bounded
    // window to release their watchers and close their connections
    shutdown.cancel();
    sessions.close();
    if tokio::time::timeout(config.shutdown_grace, sessions.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = sessions.len(),
            "Live reload sessions did not finish in time"
        );
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn bind_address(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let ip = if host == "localhost" {
        IpAddr::from([127, 0, 0, 1])
    } else {
        host.parse::<IpAddr>()
            .map_err(|_| ServerError::Address(format!("{host}:{port}")))?
    };
    Ok(SocketAddr::new(ip, port))
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for Ctrl+C, shutting down");
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from the loaded config file.
#[must_use]
pub fn server_config_from_config(config: &slides_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root_dir: config.deck_resolved.root_dir.clone(),
        live_reload_enabled: config.live_reload.enabled,
        watch: config.live_reload.watch.clone(),
        shutdown_grace: config.server.shutdown_grace(),
    }
}
