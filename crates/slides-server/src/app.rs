//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;

use crate::handlers;
use crate::live_reload;
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
///
/// Decks are served by the fallback so any `*.slide` path in the root
/// resolves without a route per file.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::index::get_index))
        .route("/res/{*path}", get(handlers::assets::get_asset));

    if state.live_reload_enabled {
        router = router.route("/ws", get(live_reload::ws_handler));
    }

    let [csp, xss, frame, nosniff] = security::security_layers();
    router
        .fallback(handlers::slides::get_deck)
        .layer(
            ServiceBuilder::new()
                .layer(csp)
                .layer(xss)
                .layer(frame)
                .layer(nosniff),
        )
        .with_state(state)
}
