//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use minijinja::Environment;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Deck root: templates, `res/` and `*.slide` files.
    pub(crate) root_dir: PathBuf,
    /// Templates loaded at startup.
    pub(crate) templates: Arc<Environment<'static>>,
    /// Whether the `/ws` endpoint is served.
    pub(crate) live_reload_enabled: bool,
    /// Files every live reload session watches from the start.
    pub(crate) initial_watch: Vec<String>,
    /// Root token; each session watches a child of it.
    pub(crate) shutdown: CancellationToken,
    /// Running live reload sessions.
    pub(crate) sessions: TaskTracker,
}
