//! Rendered slide decks.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::response::Html;
use slides_renderer::Deck;

use crate::error::ServerError;
use crate::source::{SLIDE_EXTENSION, read_with_retry, resolve};
use crate::state::AppState;
use crate::templates::render_deck;

/// Handle GET /{path}.slide.
///
/// Registered as the router fallback, so every unmatched path lands here
/// and anything that is not a deck inside the root is a 404.
pub(crate) async fn get_deck(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Html<String>, ServerError> {
    let url_path = uri.path();
    let not_found = || ServerError::NotFound(url_path.to_owned());

    let path = resolve(&state.root_dir, url_path).ok_or_else(not_found)?;
    if path.extension().and_then(|e| e.to_str()) != Some(SLIDE_EXTENSION) {
        return Err(not_found());
    }

    let source = read_with_retry(&path).await?;
    let deck = Deck::parse(&source, &fallback_title(&path));
    tracing::debug!(path = url_path, slides = deck.slides.len(), "Rendered deck");

    let page = render_deck(&state.templates, deck, state.live_reload_enabled)?;
    Ok(Html(page))
}

fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fallback_title_is_file_stem() {
        assert_eq!(fallback_title(Path::new("/deck/intro.slide")), "intro");
        assert_eq!(fallback_title(Path::new("/deck/v1.2.slide")), "v1.2");
    }
}
