//! Index page listing every deck.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;

use crate::error::ServerError;
use crate::source::list_decks;
use crate::state::AppState;
use crate::templates::render_index;

/// Handle GET /.
pub(crate) async fn get_index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    let decks = list_decks(&state.root_dir).await?;
    let page = render_index(&state.templates, &decks, state.live_reload_enabled)?;
    Ok(Html(page))
}
