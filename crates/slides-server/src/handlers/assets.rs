//! Static files under `res/`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::source::resolve;
use crate::state::AppState;

/// Directory static files are served from, relative to the deck root.
pub(crate) const ASSET_DIR: &str = "res";

/// Handle GET /res/{*path}.
pub(crate) async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ServerError> {
    let not_found = || ServerError::NotFound(format!("/{ASSET_DIR}/{path}"));
    let file = resolve(&state.root_dir.join(ASSET_DIR), &path).ok_or_else(not_found)?;
    if !tokio::fs::metadata(&file).await?.is_file() {
        return Err(not_found());
    }

    let bytes = tokio::fs::read(&file).await?;
    let mime = mime_guess::from_path(&file).first_or_octet_stream();

    Ok(([(header::CONTENT_TYPE, mime.as_ref().to_owned())], bytes).into_response())
}
