//! Typed ingest-surface errors mapped onto HTTP responses, in the
//! `axum::response::IntoResponse` idiom.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Surfaced verbatim so callers can match on the literal substring
    /// "Unknown office" per the external contract.
    #[error("Unknown office: {0}")]
    UnknownOffice(String),
    #[error("malformed request body: {0}")]
    BadRequest(String),
    #[error("internal store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownOffice(name) => IngestError::UnknownOffice(name),
            StoreError::Sqlite(e) => IngestError::Store(e),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngestError::UnknownOffice(_) | IngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}
