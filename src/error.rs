use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures that prevent a download from being served.
///
/// Range problems are not errors: they are planning outcomes and end up as a
/// `416` response (see [`crate::RangeError`]).
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Opening, seeking or reading the byte source failed.
    #[error("byte source I/O failed: {0}")]
    SourceIo(#[from] io::Error),
    /// The collaborator handed over metadata that cannot describe an entity.
    #[error("invalid entity metadata: {0}")]
    InvalidEntityMetadata(String),
    #[error("invalid content type '{0}'")]
    InvalidContentType(String),
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        let status = match &self {
            DownloadError::SourceIo(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self, %status, "download could not be served");
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}
