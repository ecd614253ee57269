//! WebSocket entry point for live reload.
//!
//! Checks the origin, creates the connection's watcher before upgrading so
//! a watcher failure can still be reported as an HTTP error, then hands the
//! split socket to a [`Session`].

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use super::session::{Session, session_watcher};
use crate::state::AppState;

/// Handle GET /ws.
///
/// The origin is checked before the upgrade request itself, so cross-origin
/// attempts are always answered with 403.
pub(crate) async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !same_origin(&headers) {
        tracing::warn!(
            origin = ?headers.get(header::ORIGIN),
            host = ?headers.get(header::HOST),
            "Rejected live reload connection"
        );
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let cancel = state.shutdown.child_token();
    let watcher = match session_watcher(&state.root_dir, &cancel) {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::error!(error = %e, "Could not create watcher");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    for path in &state.initial_watch {
        if let Err(e) = watcher.add(path) {
            tracing::warn!(path, error = %e, "Could not watch file");
        }
    }

    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "Live reload upgrade failed"))
        .on_upgrade(move |socket: WebSocket| async move {
            let (sink, stream) = socket.split();
            let session = Session::new(sink, watcher, cancel);
            state.sessions.track_future(session.run(stream)).await;
        })
}

/// Whether `Origin` is exactly `http://<Host>`.
fn same_origin(headers: &HeaderMap) -> bool {
    let (Some(origin), Some(host)) = (headers.get(header::ORIGIN), headers.get(header::HOST)) else {
        return false;
    };
    match (origin.to_str(), host.to_str()) {
        (Ok(origin), Ok(host)) => origin.strip_prefix("http://") == Some(host),
        _ => false,
    }
}
