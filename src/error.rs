use crate::domain::lifecycle::TransitionError;
use crate::ports::{RepositoryError, UploadError};
use crate::validation::ValidationError;
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

static EXPOSE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include internal error detail in response bodies. Enabled outside production at startup.
pub fn expose_internal_details(enabled: bool) {
    EXPOSE_INTERNAL_DETAILS.store(enabled, Ordering::Relaxed);
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<ValidationError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Cannot delete: still referenced by {relation}. {hint}")]
    Dependency { relation: String, hint: String },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Repository(RepositoryError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn format_fields(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![ValidationError::new(field, message)])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) | AppError::InvalidTransition(_) | AppError::Dependency { .. } => {
                StatusCode::CONFLICT
            }
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Repository(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-checkable category.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Dependency { .. } => "has_dependents",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::RateLimited => "rate_limited",
            AppError::Upstream(_) => "upstream_failure",
            AppError::Repository(_) | AppError::Internal(_) => "internal_error",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, AppError::Repository(_) | AppError::Internal(_))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::Conflict(constraint) => {
                AppError::Conflict(format!("a record with the same unique value exists ({constraint})"))
            }
            RepositoryError::ForeignKey(constraint) => AppError::Dependency {
                relation: constraint,
                hint: "Remove the dependent records or deactivate this record instead".to_string(),
            },
            RepositoryError::Stale(what) => {
                AppError::Conflict(format!("{what} was modified concurrently, retry the request"))
            }
            other => AppError::Repository(other),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::DisallowedType(_) | UploadError::Empty => {
                AppError::validation("file", err.to_string())
            }
            UploadError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            UploadError::Storage(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::validation("body", err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!(error = %self, "Request failed with internal error");
        }

        let message = if self.is_internal() && !EXPOSE_INTERNAL_DETAILS.load(Ordering::Relaxed) {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": message,
            "code": self.category(),
            "status": status.as_u16(),
        });

        if let AppError::Validation(fields) = &self {
            body["details"] = json!(fields
                .iter()
                .map(|field| json!({ "field": field.field, "message": field.message }))
                .collect::<Vec<_>>());
        }
        if let AppError::Dependency { relation, hint } = &self {
            body["details"] = json!({ "relation": relation, "hint": hint });
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TxStatus;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::validation("amount", "is required");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.category(), "validation_error");
    }

    #[test]
    fn test_forbidden_and_not_found_are_distinct() {
        assert_eq!(
            AppError::Forbidden("not yours".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("Transaction".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_transition_error_is_conflict() {
        let error = AppError::from(TransitionError::Terminal {
            from: TxStatus::Success,
        });
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.category(), "invalid_transition");
    }

    #[test]
    fn test_repository_error_mapping() {
        let fk = AppError::from(RepositoryError::ForeignKey("transactions_deposit_bank_id_fkey".into()));
        assert_eq!(fk.category(), "has_dependents");

        let unique = AppError::from(RepositoryError::Conflict("betting_sites_name_key".into()));
        assert_eq!(unique.status_code(), StatusCode::CONFLICT);

        let storage = AppError::from(RepositoryError::Storage("connection reset".into()));
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upload_error_mapping() {
        let too_large = AppError::from(UploadError::TooLarge { size: 10, max: 5 });
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let wrong_type = AppError::from(UploadError::DisallowedType("application/pdf".into()));
        assert_eq!(wrong_type.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validation_response_lists_fields() {
        let error = AppError::Validation(vec![
            ValidationError::new("amount", "is required"),
            ValidationError::new("currency", "must be a 3-letter code"),
        ]);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "validation_error");
        assert_eq!(body["details"][0]["field"], "amount");
        assert_eq!(body["details"][1]["field"], "currency");
    }

    #[tokio::test]
    async fn test_internal_detail_hidden_by_default() {
        let response = AppError::Internal("pool exhausted".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }
}
