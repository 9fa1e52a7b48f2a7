use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Request-level failure. Rendered as `{"message": ...}` with the matching
/// status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("record store unavailable")]
    StoreUnavailable,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal Server Error")]
    Internal,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::StoreUnavailable | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "message": self.to_string() }))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { collection, .. } => {
                AppError::NotFound(format!("{} record not found", collection))
            }
            StoreError::Conflict { collection, key } => {
                AppError::Conflict(format!("{} record conflict ({})", collection, key))
            }
            StoreError::Unavailable(reason) => {
                tracing::error!(error = %reason, "Record store unavailable");
                AppError::StoreUnavailable
            }
            e @ StoreError::Malformed { .. } => {
                tracing::error!(error = %e, "Malformed record");
                AppError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let not_found: AppError = StoreError::NotFound {
            collection: Collection::Tasks,
            id: "x".into(),
        }
        .into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict: AppError = StoreError::Conflict {
            collection: Collection::Attendance,
            key: "u1|2024-01-01".into(),
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::BAD_REQUEST);

        let down: AppError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(down.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
