//! Live reload over WebSocket.
//!
//! Each connection gets its own [`Session`](session::Session) with its own
//! [`ChangeWatcher`](watcher::ChangeWatcher); nothing is shared between
//! connections except the read-only application state.

mod session;
mod watcher;
mod websocket;

pub(crate) use websocket::ws_handler;
