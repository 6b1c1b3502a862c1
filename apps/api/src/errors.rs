use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::models::chat::ErrorBody;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Chat is disabled: no usable LLM API key configured")]
    ChatDisabled,

    #[error("LLM error: {0}")]
    Upstream(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            AppError::ChatDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(e) => e.status_code(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::InvalidJson(_) => "INVALID_REQUEST",
            AppError::ChatDisabled => "MISSING_ENV",
            AppError::Upstream(e) => e.code(),
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, message, errors) = match self {
            AppError::Validation(errors) => {
                ("Validation Error", errors.join(", "), errors.clone())
            }
            AppError::InvalidJson(_) => (
                "Invalid Request",
                "Request body must be valid JSON".to_string(),
                Vec::new(),
            ),
            AppError::ChatDisabled => (
                "Configuration Error",
                "Chat service is not available. Please check configuration.".to_string(),
                Vec::new(),
            ),
            AppError::Upstream(e) => (
                "LLM Service Error",
                e.public_message().to_string(),
                Vec::new(),
            ),
            AppError::Internal(_) => (
                "Internal Server Error",
                "An unexpected error occurred".to_string(),
                Vec::new(),
            ),
        };

        ErrorBody {
            error: error.to_string(),
            code: self.code().to_string(),
            message,
            errors,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upstream(e) => tracing::error!("LLM error: {e}"),
            AppError::Internal(e) => tracing::error!("Internal error: {e:?}"),
            _ => {}
        }

        let retry_after = match &self {
            AppError::Upstream(e) => e.retry_after(),
            _ => None,
        };

        let mut response = (self.status(), Json(self.body())).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_body_lists_errors() {
        let err = AppError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.body();
        assert_eq!(body.code, "INVALID_REQUEST");
        assert_eq!(body.message, "a, b");
        assert_eq!(body.errors.len(), 2);
    }

    #[test]
    fn test_chat_disabled_is_503() {
        let err = AppError::ChatDisabled;
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "MISSING_ENV");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let err = AppError::from(LlmError::RateLimited {
            retry_after: Some(12),
            message: "slow down".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::from(anyhow::anyhow!("invalid type: null, expected a sequence"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.body();
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.message.contains("sequence"));
    }

    #[test]
    fn test_upstream_details_not_leaked() {
        let err = AppError::from(LlmError::Authentication {
            status: 401,
            message: "Incorrect API key sk-abc".to_string(),
        });
        assert!(!err.body().message.contains("sk-abc"));
    }
}
