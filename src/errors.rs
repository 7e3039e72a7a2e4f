use crate::services::object_store::ObjectStoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Domain errors raised by the ingestion, registry, lifecycle and serving
/// services. Every variant is either user-correctable (4xx) or a system
/// failure (5xx); `AppError` performs the mapping.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("digest mismatch: claimed {claimed}, computed {computed}")]
    Integrity { claimed: String, computed: String },
    #[error("{message}")]
    Validation { message: String, files: Vec<String> },
    #[error("{0} not found")]
    NotFound(String),
    #[error("name `{0}` is already taken")]
    NameConflict(String),
    #[error("deployment limit of {limit} reached")]
    QuotaExceeded { limit: i64 },
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl ServiceError {
    /// Validation failure with no diagnostic file list.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            files: Vec::new(),
        }
    }

    /// Stable machine-readable kind, used in HTTP bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Integrity { .. } => "INTEGRITY_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NameConflict(_) => "NAME_CONFLICT",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Sqlx(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ObjectStoreError> for ServiceError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound(key) => ServiceError::NotFound(format!("object `{}`", key)),
            ObjectStoreError::InvalidKey(key) => {
                ServiceError::InvalidInput(format!("invalid object key `{}`", key))
            }
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// A lightweight wrapper for errors returned by HTTP handlers.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Diagnostic file list, present for archives without an entry point.
    pub files: Option<Vec<String>>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
            files: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "code": self.code,
            "status": self.status.as_u16()
        });
        if let Some(files) = self.files {
            body["files"] = json!(files);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.kind();
        let status = match &err {
            ServiceError::InvalidInput(_)
            | ServiceError::Integrity { .. }
            | ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::NameConflict(_) | ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            ServiceError::Storage(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match err {
            ServiceError::Sqlx(inner) => {
                tracing::error!(error = %inner, "database error");
                AppError::internal("internal error")
            }
            ServiceError::Validation { message, files } => AppError {
                status,
                code,
                message,
                files: (!files.is_empty()).then_some(files),
            },
            ServiceError::Storage(msg) => {
                tracing::error!(error = %msg, "storage backend error");
                AppError::new(status, code, format!("storage failure: {}", msg))
            }
            other => AppError::new(status, code, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_with_files_keeps_file_list() {
        let err = ServiceError::Validation {
            message: "no index.html".into(),
            files: vec!["about.html".into()],
        };
        let app: AppError = err.into();
        assert_eq!(app.status, StatusCode::BAD_REQUEST);
        assert_eq!(app.files.as_deref(), Some(&["about.html".to_string()][..]));
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::NameConflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::InvalidState("x".into()), StatusCode::CONFLICT),
            (ServiceError::QuotaExceeded { limit: 1 }, StatusCode::FORBIDDEN),
            (ServiceError::Storage("down".into()), StatusCode::BAD_GATEWAY),
            (
                ServiceError::Integrity {
                    claimed: "a".into(),
                    computed: "b".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status, expected);
        }
    }

    #[test]
    fn database_errors_are_masked() {
        let app: AppError = ServiceError::Sqlx(sqlx::Error::RowNotFound).into();
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.message, "internal error");
    }
}
