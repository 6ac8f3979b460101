use crate::completion::CompletionError;
use crate::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Completion API failure; the response detail carries the upstream message
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// Compilation or source-download failure during the compile flow.
    /// The client always sees the same fixed detail; compiler diagnostics are
    /// logged server-side only.
    #[error("Error compiling LaTeX to PDF.")]
    Compilation,

    /// Object storage failure (upload, download, list, remove, signed URL)
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid request data, e.g. a malformed object name
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested object not found
    #[error("{resource} {name:?} not found")]
    NotFound { resource: &'static str, name: String },

    /// Local I/O failure while handling scratch files
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Completion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Compilation => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `detail` string returned to clients.
    ///
    /// Upstream-service messages are surfaced verbatim; local I/O and
    /// unexpected errors collapse to a generic message.
    pub fn detail(&self) -> String {
        match self {
            Error::Completion(e) => e.to_string(),
            Error::Compilation => "Error compiling LaTeX to PDF.".to_string(),
            Error::Storage(StorageError::NotFound) => "Object not found".to_string(),
            Error::Storage(e) => e.to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, name } => format!("{resource} {name:?} not found"),
            Error::Io(_) | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Completion(_) | Error::Storage(StorageError::NotFound) => {
                tracing::warn!("Upstream service error: {:#}", self);
            }
            Error::Compilation | Error::Storage(_) | Error::Io(_) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "detail": self.detail() });
        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
