// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tailview_core::{DiscoveryError, ParseError};
use thiserror::Error;
use ts_rs::TS;

use crate::live::WatchError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Log not found: {0}")]
    LogNotFound(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::LogNotFound(path) => {
                tracing::warn!(path = %path, "Log not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Log not found", format!("Path: {path}")),
                )
            }
            ApiError::Parse(parse_err) => {
                let (status, error_msg) = match parse_err {
                    ParseError::NotFound { path } => {
                        tracing::warn!(path = %path.display(), "File not found");
                        (StatusCode::NOT_FOUND, "File not found")
                    }
                    ParseError::PermissionDenied { path } => {
                        tracing::error!(path = %path.display(), "Permission denied");
                        (StatusCode::FORBIDDEN, "Permission denied")
                    }
                    ParseError::Io { path, source } => {
                        tracing::error!(path = %path.display(), error = %source, "IO error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "IO error reading file")
                    }
                };
                (
                    status,
                    ErrorResponse::with_details(error_msg, parse_err.to_string()),
                )
            }
            ApiError::Discovery(discovery_err) => {
                let (status, error_msg) = match discovery_err {
                    DiscoveryError::ProjectsDirNotFound { path } => {
                        tracing::error!(path = %path.display(), "Projects directory not found");
                        (StatusCode::NOT_FOUND, "Projects directory not found")
                    }
                    DiscoveryError::PermissionDenied { path } => {
                        tracing::error!(path = %path.display(), "Permission denied accessing projects");
                        (StatusCode::FORBIDDEN, "Cannot access projects directory")
                    }
                    DiscoveryError::Io { path, source } => {
                        tracing::error!(path = %path.display(), error = %source, "IO error during discovery");
                        (StatusCode::INTERNAL_SERVER_ERROR, "IO error accessing projects")
                    }
                    DiscoveryError::HomeDirNotFound => {
                        tracing::error!("Home directory not found");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Home directory not found")
                    }
                };
                (
                    status,
                    ErrorResponse::with_details(error_msg, discovery_err.to_string()),
                )
            }
            ApiError::Watch(msg) => {
                tracing::error!(message = %msg, "Failed to start file watcher");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Watch failed", msg.clone()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::Parse(e) => ApiError::Parse(e),
            WatchError::Notify(e) => ApiError::Watch(e.to_string()),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::path::PathBuf;

    /// Helper to extract status code and body from a response
    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_log_not_found_returns_404() {
        let (status, body) =
            extract_response(ApiError::LogNotFound("/logs/a.jsonl".into()).into_response()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Log not found");
        assert!(body.details.unwrap().contains("/logs/a.jsonl"));
    }

    #[tokio::test]
    async fn test_parse_not_found_returns_404() {
        let error = ApiError::Parse(ParseError::NotFound {
            path: PathBuf::from("/path/to/session.jsonl"),
        });
        let (status, body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "File not found");
        assert!(body.details.unwrap().contains("/path/to/session.jsonl"));
    }

    #[tokio::test]
    async fn test_parse_permission_denied_returns_403() {
        let error = ApiError::Parse(ParseError::PermissionDenied {
            path: PathBuf::from("/secret/file.jsonl"),
        });
        let (status, body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Permission denied");
    }

    #[tokio::test]
    async fn test_parse_io_error_returns_500() {
        let error = ApiError::Parse(ParseError::Io {
            path: PathBuf::from("/path/file.jsonl"),
            source: std::io::Error::other("disk error"),
        });
        let (status, body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "IO error reading file");
    }

    #[tokio::test]
    async fn test_discovery_permission_denied_returns_403() {
        let error = ApiError::Discovery(DiscoveryError::PermissionDenied {
            path: PathBuf::from("/root/.claude/projects"),
        });
        let (status, _) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_request_returns_400() {
        let (status, body) =
            extract_response(ApiError::BadRequest("path must be absolute".into()).into_response())
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.details.as_deref(), Some("path must be absolute"));
    }

    #[tokio::test]
    async fn test_watch_error_mapping() {
        let missing = WatchError::Parse(ParseError::NotFound {
            path: PathBuf::from("/logs/gone.jsonl"),
        });
        let (status, _) = extract_response(ApiError::from(missing).into_response()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let notify_err = WatchError::Notify(notify::Error::generic("backend gone"));
        let (status, body) = extract_response(ApiError::from(notify_err).into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Watch failed");
    }
}
