//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Requested file does not exist or is outside the deck.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Template file is missing or invalid at startup.
    #[error("Template error in {path}: {source}")]
    TemplateLoad {
        /// Template file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: minijinja::Error,
    },

    /// A required template is absent from the deck root.
    #[error("Required template {0} not found")]
    MissingTemplate(&'static str),

    /// Template rendering failed for a request.
    #[error("Template render error: {0}")]
    Render(#[from] minijinja::Error),

    /// Invalid template glob pattern.
    #[error("Invalid template pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Invalid bind address.
    #[error("Invalid address {0}")]
    Address(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request failed");
        }

        // Canonical reason only, internals stay in the log
        let reason = status.canonical_reason().unwrap_or_default();
        (status, reason).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = ServerError::NotFound("/missing.slide".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "Not Found");
    }

    #[tokio::test]
    async fn test_missing_file_io_error_is_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let response = ServerError::Io(err).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "secret path");
        let response = ServerError::Io(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, "Internal Server Error");
    }
}
