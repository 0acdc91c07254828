use crate::services::storage_service::StorageError;
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// An HTTP error carrying a stable, machine-readable code.
///
/// Rendered as `{"ok": false, "error": <code>}`. Details of server-side
/// failures are logged where they happen and never put in the body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
}

impl AppError {
    /// Create a new AppError with a specific status and code.
    pub fn new(status: StatusCode, code: &'static str) -> Self {
        Self { status, code }
    }

    pub fn bad_request(code: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(code: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.status)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "ok": false,
            "error": self.code,
        }));

        (self.status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::EmptyFile => AppError::bad_request("empty_file"),
            StorageError::UnsupportedType(_) => {
                AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_type")
            }
            StorageError::Unauthorized => AppError::new(StatusCode::UNAUTHORIZED, "unauthorized"),
            StorageError::Forbidden(reference) => {
                tracing::warn!(reference = %reference, "rejected path escape");
                AppError::new(StatusCode::FORBIDDEN, "forbidden")
            }
            StorageError::NotFound(_) => AppError::not_found(),
            StorageError::CreateDir { .. } => {
                tracing::error!(error = %err, "upload failed");
                AppError::internal("mkdir_failed")
            }
            StorageError::CreateFile { .. } => {
                tracing::error!(error = %err, "upload failed");
                AppError::internal("write_failed")
            }
            StorageError::TooLarge { .. } | StorageError::Save(_) => {
                tracing::error!(error = %err, "upload failed");
                AppError::internal("save_failed")
            }
            StorageError::Delete(_) => {
                tracing::error!(error = %err, "delete failed");
                AppError::internal("delete_failed")
            }
            StorageError::Io(_) => {
                tracing::error!(error = %err, "storage i/o failed");
                AppError::internal("internal_error")
            }
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        tracing::debug!(error = %err, "rejected multipart request");
        AppError::bad_request("invalid_form")
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        tracing::debug!(error = %err, "malformed multipart body");
        AppError::bad_request("invalid_form")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_errors_map_to_stable_codes() {
        let cases = [
            (StorageError::EmptyFile, StatusCode::BAD_REQUEST, "empty_file"),
            (
                StorageError::UnsupportedType("text/plain".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_type",
            ),
            (StorageError::Unauthorized, StatusCode::UNAUTHORIZED, "unauthorized"),
            (
                StorageError::Forbidden("../x".into()),
                StatusCode::FORBIDDEN,
                "forbidden",
            ),
            (StorageError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (
                StorageError::TooLarge { limit: 1 },
                StatusCode::INTERNAL_SERVER_ERROR,
                "save_failed",
            ),
            (
                StorageError::Delete(io::Error::other("denied")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "delete_failed",
            ),
        ];

        for (err, status, code) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status, status);
            assert_eq!(app_err.code, code);
        }
    }
}
