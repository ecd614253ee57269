//! Per-connection live reload session.
//!
//! A session multiplexes three sources into the outbound push stream:
//!
//! - inbound commands, decoded by a reader task and queued,
//! - file changes from the session's own [`ChangeWatcher`],
//! - the cancellation token bound to the connection.
//!
//! The coordination loop owns every receiving end; the reader task and the
//! watch loop each own one sending end. Teardown stops the reader and joins
//! it, closes the watcher and joins its loop, then closes the connection, so
//! no task outlives [`Session::run`].

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use axum::extract::ws::Message as Frame;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::watcher::{ChangeEvent, ChangeWatcher, WatchError};
use crate::protocol::{Message, ProtocolError};

/// Capacity of the inbound command queue.
pub(crate) const COMMAND_QUEUE_CAPACITY: usize = 5;

/// How long teardown waits for the connection to close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The connection's cancellation token fired.
    Cancelled,
    /// The inbound stream ended or failed.
    Disconnected,
    /// The watch loop failed.
    WatcherFailed,
}

/// Create the watcher for a session bound to `cancel`.
///
/// The watcher gets a child token: closing the watcher stops its watch loop
/// without cancelling the session.
pub(crate) fn session_watcher(
    root: &Path,
    cancel: &CancellationToken,
) -> Result<ChangeWatcher, WatchError> {
    ChangeWatcher::new(root, cancel.child_token())
}

/// One live reload connection.
pub(crate) struct Session<S> {
    sink: S,
    watcher: ChangeWatcher,
    cancel: CancellationToken,
}

impl<S> Session<S>
where
    S: Sink<Frame> + Unpin,
    S::Error: Display,
{
    /// Create a session that pushes frames into `sink`.
    ///
    /// `watcher` should already hold the initial watch set; its watch loop
    /// is started by [`run`](Self::run).
    pub(crate) fn new(sink: S, watcher: ChangeWatcher, cancel: CancellationToken) -> Self {
        Self {
            sink,
            watcher,
            cancel,
        }
    }

    /// Serve the session until a terminal condition, then tear it down.
    pub(crate) async fn run<R, E>(mut self, inbound: R) -> SessionEnd
    where
        R: Stream<Item = Result<Frame, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
    {
        let (commands_tx, mut commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let stop_reading = CancellationToken::new();
        let reader = tokio::spawn(read_commands(inbound, commands_tx, stop_reading.clone()));
        let mut pump = tokio::spawn(self.watcher.watch());
        let mut pump_running = true;

        tracing::debug!("Live reload session started");
        let end = self
            .coordinate(&mut commands, &mut pump, &mut pump_running)
            .await;
        tracing::debug!(reason = ?end, "Live reload session ending");

        // Stop accepting commands and join the reader
        commands.close();
        stop_reading.cancel();
        if let Err(e) = reader.await {
            tracing::error!(error = %e, "Live reload reader task failed");
        }

        // Release the watcher before the connection so no push races the close
        self.watcher.close();
        if pump_running {
            match pump.await {
                Ok(Ok(()) | Err(WatchError::AlreadyWatching)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Watcher stopped with error"),
                Err(e) => tracing::error!(error = %e, "Watcher task failed"),
            }
        }

        match tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Connection already closed"),
            Err(_) => tracing::debug!("Connection did not close in time"),
        }

        end
    }

    /// The coordination loop.
    async fn coordinate(
        &mut self,
        commands: &mut mpsc::Receiver<Message>,
        pump: &mut JoinHandle<Result<(), WatchError>>,
        pump_running: &mut bool,
    ) -> SessionEnd {
        let mut changes_open = true;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                command = commands.recv() => match command {
                    Some(message) => self.dispatch(message),
                    None => return SessionEnd::Disconnected,
                },
                change = self.watcher.changed(), if changes_open => match change {
                    Some(event) => {
                        if !self.push_refresh(&event).await {
                            return SessionEnd::Cancelled;
                        }
                    }
                    None => {
                        self.watcher.close();
                        changes_open = false;
                    }
                },
                result = &mut *pump, if *pump_running => {
                    *pump_running = false;
                    match result {
                        Ok(Ok(())) => tracing::debug!("Watcher stopped"),
                        Ok(Err(e)) => {
                            tracing::warn!(error = %e, "Watcher failed, ending session");
                            return SessionEnd::WatcherFailed;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Watcher task failed, ending session");
                            return SessionEnd::WatcherFailed;
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, message: Message) {
        match message {
            Message::Watch(path) => {
                let path = path.strip_prefix('/').unwrap_or(&path);
                if let Err(e) = self.watcher.add(path) {
                    tracing::warn!(path, error = %e, "Could not watch file");
                }
            }
            Message::Error(diagnostic) => {
                tracing::warn!(message = %diagnostic, "Client reported error");
            }
            other @ Message::Refresh => {
                tracing::warn!(message = ?other, "Unhandled message");
            }
        }
    }

    /// Push a refresh; a failed write is left for the reader to detect.
    ///
    /// Returns `false` if cancellation fired while the write was pending.
    async fn push_refresh(&mut self, event: &ChangeEvent) -> bool {
        let text = match Message::Refresh.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Could not encode refresh message");
                return true;
            }
        };
        tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::debug!(path = %event.path, "Refresh abandoned on cancellation");
                return false;
            }
            sent = self.sink.send(Frame::Text(text.into())) => match sent {
                Ok(()) => tracing::info!(path = %event.path, "Sent refresh"),
                Err(e) => tracing::warn!(path = %event.path, error = %e, "Could not send refresh"),
            },
        }
        true
    }
}

/// Reader task: decode inbound text frames into the command queue.
///
/// Returning drops the queue's sender, which is how the coordination loop
/// learns the remote end is gone.
async fn read_commands<R, E>(mut inbound: R, commands: mpsc::Sender<Message>, stop: CancellationToken)
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            () = stop.cancelled() => return,
            frame = inbound.next() => frame,
        };

        let text = match frame {
            Some(Ok(Frame::Text(text))) => text,
            Some(Ok(Frame::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Live reload connection read failed");
                return;
            }
        };

        let message = match Message::decode(text.as_str()) {
            Ok(message) => message,
            Err(e @ ProtocolError::Json(_)) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unhandled message");
                continue;
            }
        };

        tokio::select! {
            () = stop.cancelled() => return,
            sent = commands.send(message) => if sent.is_err() {
                return;
            },
        }
    }
}
