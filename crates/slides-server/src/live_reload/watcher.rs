//! Per-session file change watcher.
//!
//! Wraps a non-recursive `notify` watcher over an explicit set of files.
//! Writes and renames of a watched file are reported on a bounded change
//! queue; a removal silently re-subscribes the same path so editors that
//! save by delete-and-recreate keep being observed.
//!
//! The OS callback thread forwards raw events into a channel drained by the
//! watch loop ([`ChangeWatcher::watch`]), which runs as its own task. The
//! session that owns the watcher consumes [`ChangeWatcher::changed`].

use std::collections::HashMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Capacity of the change queue between the watch loop and the session.
pub(crate) const CHANGE_QUEUE_CAPACITY: usize = 5;

/// How often paths lost to a delete are retried while still missing.
const RESUBSCRIBE_INTERVAL: Duration = Duration::from_millis(100);

/// A watched file changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChangeEvent {
    /// The path exactly as it was passed to [`ChangeWatcher::add`].
    pub path: String,
}

/// Watcher error.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WatchError {
    /// The OS watcher could not be created.
    #[error("failed to create file watcher: {0}")]
    Init(#[source] notify::Error),
    /// Subscribing to a path failed (usually because it does not exist).
    #[error("cannot watch {path}: {source}")]
    Subscribe {
        /// Path as requested.
        path: String,
        #[source]
        source: notify::Error,
    },
    /// Path is empty or reaches outside the deck root.
    #[error("cannot watch {0:?}: not a file path inside the deck root")]
    InvalidPath(String),
    /// The watcher was already closed.
    #[error("watcher is closed")]
    Closed,
    /// The OS notification stream reported an error.
    #[error("file notification stream failed: {0}")]
    Stream(#[source] notify::Error),
    /// [`ChangeWatcher::watch`] was called more than once.
    #[error("watch loop already started")]
    AlreadyWatching,
}

/// Subscription state of one watched path.
#[derive(Debug)]
struct WatchEntry {
    /// Path as requested, reported back in [`ChangeEvent`]s.
    name: String,
    /// `false` while waiting to re-subscribe after a delete.
    active: bool,
}

/// State shared between the owning session and the watch loop.
struct WatchState {
    /// OS watcher; `None` once closed.
    os: Option<RecommendedWatcher>,
    /// Change queue sender; `None` once closed so nothing is sent after close.
    changed: Option<mpsc::Sender<ChangeEvent>>,
    /// Every path ever added, keyed by absolute path.
    paths: HashMap<PathBuf, WatchEntry>,
}

/// File change watcher owned by a single session.
pub(crate) struct ChangeWatcher {
    root: PathBuf,
    shared: Arc<Mutex<WatchState>>,
    raw: Option<mpsc::UnboundedReceiver<notify::Result<Event>>>,
    changed: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl ChangeWatcher {
    /// Create a watcher for files under `root`.
    ///
    /// The watch loop stops when `cancel` fires or [`close`](Self::close)
    /// is called.
    pub(crate) fn new(root: &Path, cancel: CancellationToken) -> Result<Self, WatchError> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        Self::with_raw_channel(root, cancel, raw_tx, raw_rx)
    }

    /// Like [`new`](Self::new), also returning a sender into the raw event
    /// channel so tests can feed the watch loop directly.
    #[cfg(test)]
    pub(crate) fn with_raw_sender(
        root: &Path,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedSender<notify::Result<Event>>) {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let watcher = Self::with_raw_channel(root, cancel, raw_tx.clone(), raw_rx).unwrap();
        (watcher, raw_tx)
    }

    fn with_raw_channel(
        root: &Path,
        cancel: CancellationToken,
        raw_tx: mpsc::UnboundedSender<notify::Result<Event>>,
        raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ) -> Result<Self, WatchError> {
        let (changed_tx, changed_rx) = mpsc::channel(CHANGE_QUEUE_CAPACITY);

        // Runs on the notify thread; must never block, since the watch loop
        // calls back into the OS watcher while holding the state lock
        let os = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })
        .map_err(WatchError::Init)?;

        // Backends may report canonical paths, so key the watch set the same way
        let root = std::fs::canonicalize(root)
            .or_else(|_| std::path::absolute(root))
            .unwrap_or_else(|_| root.to_path_buf());

        Ok(Self {
            root,
            shared: Arc::new(Mutex::new(WatchState {
                os: Some(os),
                changed: Some(changed_tx),
                paths: HashMap::new(),
            })),
            raw: Some(raw_rx),
            changed: changed_rx,
            cancel,
        })
    }

    /// Watch `path`, relative to the deck root.
    ///
    /// Adding a path that is already watched is a no-op. Directories are
    /// not watched recursively.
    pub(crate) fn add(&self, path: &str) -> Result<(), WatchError> {
        let absolute = self.resolve(path)?;

        let mut guard = lock(&self.shared);
        let state = &mut *guard;
        let os = state.os.as_mut().ok_or(WatchError::Closed)?;

        if state.paths.get(&absolute).is_some_and(|entry| entry.active) {
            return Ok(());
        }

        os.watch(&absolute, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Subscribe {
                path: path.to_owned(),
                source,
            })?;
        state.paths.insert(
            absolute,
            WatchEntry {
                name: path.to_owned(),
                active: true,
            },
        );
        tracing::debug!(path, "Watching file");

        Ok(())
    }

    /// Build the watch loop future.
    ///
    /// The loop runs until cancellation, [`close`](Self::close), or an OS
    /// stream error, which is returned. Spawn it on its own task; calling
    /// this twice yields a future that fails with
    /// [`WatchError::AlreadyWatching`].
    pub(crate) fn watch(&mut self) -> impl Future<Output = Result<(), WatchError>> + Send + use<> {
        let raw = self.raw.take();
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();

        async move {
            let raw = raw.ok_or(WatchError::AlreadyWatching)?;
            WatchLoop { shared, raw }.run(cancel).await
        }
    }

    /// Wait for the next change.
    ///
    /// `None` means the watcher has stopped for good; callers must stop
    /// polling rather than treat it as "nothing yet".
    pub(crate) async fn changed(&mut self) -> Option<ChangeEvent> {
        self.changed.recv().await
    }

    /// Release the OS watcher and close the change queue.
    ///
    /// Idempotent: calls after the first do nothing. Changes already queued
    /// can still be drained from [`changed`](Self::changed).
    pub(crate) fn close(&self) {
        if close_shared(&self.shared, &self.cancel) {
            tracing::debug!(root = %self.root.display(), "Watcher closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.shared).os.is_none()
    }

    /// A handle that closes this watcher from outside its owner.
    #[cfg(test)]
    pub(crate) fn closer(&self) -> impl Fn() + Send + 'static {
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        move || {
            close_shared(&shared, &cancel);
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, WatchError> {
        let relative = Path::new(path);
        let mut has_name = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                _ => return Err(WatchError::InvalidPath(path.to_owned())),
            }
        }
        if !has_name {
            return Err(WatchError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// The watch loop: drains raw OS events into the change queue.
struct WatchLoop {
    shared: Arc<Mutex<WatchState>>,
    raw: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl WatchLoop {
    async fn run(mut self, cancel: CancellationToken) -> Result<(), WatchError> {
        let mut retry = tokio::time::interval(RESUBSCRIBE_INTERVAL);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                event = self.raw.recv() => match event {
                    Some(Ok(event)) => self.handle_event(&event),
                    Some(Err(e)) => return Err(WatchError::Stream(e)),
                    // The OS watcher was dropped
                    None => return Ok(()),
                },
                _ = retry.tick() => self.resubscribe_pending(),
            }
        }
    }

    fn handle_event(&self, event: &Event) {
        let removed = match event.kind {
            EventKind::Remove(_) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => false,
            _ => return,
        };

        let mut guard = lock(&self.shared);
        let state = &mut *guard;
        let Some(os) = state.os.as_mut() else {
            return;
        };

        for path in &event.paths {
            let Some(entry) = state.paths.get_mut(path) else {
                continue;
            };

            if !removed {
                emit(state.changed.as_ref(), &entry.name);
                continue;
            }

            // Some backends keep a stale subscription for the deleted inode
            let _ = os.unwatch(path);
            entry.active = os.watch(path, RecursiveMode::NonRecursive).is_ok();
            if entry.active {
                tracing::debug!(path = %entry.name, "Re-subscribed after remove");
            } else {
                tracing::debug!(path = %entry.name, "Removed, waiting for it to reappear");
            }
        }
    }

    /// Retry paths whose re-subscription failed because the file was gone.
    ///
    /// A path that comes back is reported as changed: it reappeared with
    /// new content.
    fn resubscribe_pending(&self) {
        let mut guard = lock(&self.shared);
        let state = &mut *guard;
        let Some(os) = state.os.as_mut() else {
            return;
        };

        let mut recovered = Vec::new();
        for (path, entry) in state.paths.iter_mut().filter(|(_, entry)| !entry.active) {
            if os.watch(path, RecursiveMode::NonRecursive).is_ok() {
                entry.active = true;
                tracing::debug!(path = %entry.name, "Re-subscribed after file reappeared");
                recovered.push(entry.name.clone());
            }
        }
        for name in &recovered {
            emit(state.changed.as_ref(), name);
        }
    }
}

/// Queue a change without blocking the watch loop.
///
/// A full queue drops the event: the session already has refreshes pending,
/// so one more would not change what the client sees.
fn emit(changed: Option<&mpsc::Sender<ChangeEvent>>, name: &str) {
    let Some(changed) = changed else {
        return;
    };
    match changed.try_send(ChangeEvent {
        path: name.to_owned(),
    }) {
        Ok(()) => tracing::debug!(path = name, "File changed"),
        Err(TrySendError::Full(_)) => {
            tracing::warn!(path = name, "Change queue full, dropping event");
        }
        Err(TrySendError::Closed(_)) => {}
    }
}

/// Release the OS watcher and drop the change sender; `false` if already closed.
fn close_shared(shared: &Mutex<WatchState>, cancel: &CancellationToken) -> bool {
    let mut state = lock(shared);
    let Some(os) = state.os.take() else {
        return false;
    };
    state.changed = None;
    drop(state);

    cancel.cancel();
    drop(os);
    true
}

fn lock(shared: &Mutex<WatchState>) -> MutexGuard<'_, WatchState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
