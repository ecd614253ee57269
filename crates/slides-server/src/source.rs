//! Deck files on disk.

use std::path::{Component, Path, PathBuf};

use crate::error::ServerError;
use crate::templates::DeckLink;

/// Extension of slide deck sources.
pub(crate) const SLIDE_EXTENSION: &str = "slide";

/// Attempts made by [`read_with_retry`].
pub(crate) const READ_ATTEMPTS: usize = 5;

/// Resolve a URL path against `root`.
///
/// Only plain file name components are accepted, so `..`, absolute paths
/// and empty paths resolve to nothing.
pub(crate) fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = Path::new(url_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    let mut any = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                any = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    any.then_some(resolved)
}

/// Read a file as text, retrying immediately on failure.
///
/// Editors often replace a file by removing and recreating it, so a read
/// racing a save can briefly see no file at all. Invalid UTF-8 is replaced
/// rather than treated as a read failure.
pub(crate) async fn read_with_retry(path: &Path) -> std::io::Result<String> {
    let mut attempt = 1;
    loop {
        match tokio::fs::read(path).await {
            Ok(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if attempt < READ_ATTEMPTS => {
                tracing::debug!(path = %path.display(), attempt, error = %e, "Read failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// List the `*.slide` files directly inside `root`, sorted by name.
pub(crate) async fn list_decks(root: &Path) -> Result<Vec<DeckLink>, ServerError> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut decks = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SLIDE_EXTENSION) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        decks.push(DeckLink {
            name: name.to_owned(),
            path: format!("/{name}"),
        });
    }
    decks.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(decks)
}
