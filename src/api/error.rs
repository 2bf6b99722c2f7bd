use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::authz::AuthzError;
use crate::executor::error::{ErrorCode, ExecutorError};
use crate::queue::QueueError;
use crate::store::StoreError;

/// Single `IntoResponse` boundary generalizing the donor's `ApiError` to
/// the client-facing string-code taxonomy in spec §6.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid URL: {0}")]
    BadRequestInvalidUrl(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("schema too complex")]
    SchemaTooComplex,
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("rate limited")]
    RateLimited,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("job expired")]
    JobExpired,
    #[error("extract failed: {0}")]
    ExtractFailed(String),
    #[error("llm not configured")]
    LlmNotConfigured,
    #[error("upstream error: {0}")]
    UpstreamError(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_)
            | ApiError::BadRequestInvalidUrl(_)
            | ApiError::InvalidSchema(_)
            | ApiError::SchemaTooComplex
            | ApiError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::JobExpired => StatusCode::GONE,
            ApiError::ExtractFailed(_) | ApiError::LlmNotConfigured | ApiError::UpstreamError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::BadRequestInvalidUrl(_) => "BAD_REQUEST_INVALID_URL",
            ApiError::InvalidSchema(_) => "INVALID_SCHEMA",
            ApiError::SchemaTooComplex => "SCHEMA_TOO_COMPLEX",
            ApiError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::JobExpired => "JOB_EXPIRED",
            ApiError::ExtractFailed(_) => "EXTRACT_FAILED",
            ApiError::LlmNotConfigured => "LLM_NOT_CONFIGURED",
            ApiError::UpstreamError(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse { success: false, code: self.code(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(value: QueueError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated => ApiError::Unauthenticated,
            AuthzError::Forbidden => ApiError::Forbidden,
            AuthzError::RateLimited => ApiError::RateLimited,
        }
    }
}

impl From<ExecutorError> for ApiError {
    fn from(value: ExecutorError) -> Self {
        match value.code {
            ErrorCode::BadRequestInvalidUrl => ApiError::BadRequestInvalidUrl(value.message),
            ErrorCode::InvalidSchema => ApiError::InvalidSchema(value.message),
            ErrorCode::SchemaTooComplex => ApiError::SchemaTooComplex,
            ErrorCode::UnsupportedFormat => ApiError::UnsupportedFormat(value.message),
            ErrorCode::UpstreamError => ApiError::UpstreamError(value.message),
            ErrorCode::ExtractFailed | ErrorCode::ExtractEmptyResult | ErrorCode::ExtractIncompleteFields => {
                ApiError::ExtractFailed(value.message)
            }
            ErrorCode::LlmNotConfigured => ApiError::LlmNotConfigured,
            ErrorCode::Internal => ApiError::Internal(value.message),
        }
    }
}

impl ApiError {
    /// Reconstructs an `ApiError` from a terminal job's `error` string.
    /// Executors format job failures as `"{CODE}: {message}"` (see
    /// `executor::scrape::execute`/`executor::map::execute`); unrecognized
    /// or missing codes fall back to `INTERNAL` rather than panicking.
    pub fn from_job_error(error: &str) -> Self {
        let (code, message) = error.split_once(": ").unwrap_or(("INTERNAL", error));
        match code {
            "BAD_REQUEST_INVALID_URL" => ApiError::BadRequestInvalidUrl(message.to_string()),
            "INVALID_SCHEMA" => ApiError::InvalidSchema(message.to_string()),
            "SCHEMA_TOO_COMPLEX" => ApiError::SchemaTooComplex,
            "UNSUPPORTED_FORMAT" => ApiError::UnsupportedFormat(message.to_string()),
            "UPSTREAM_ERROR" => ApiError::UpstreamError(message.to_string()),
            "EXTRACT_FAILED" | "EXTRACT_EMPTY_RESULT" | "EXTRACT_INCOMPLETE_FIELDS" => {
                ApiError::ExtractFailed(message.to_string())
            }
            "LLM_NOT_CONFIGURED" => ApiError::LlmNotConfigured,
            _ => ApiError::Internal(error.to_string()),
        }
    }
}

impl From<ErrorCode> for ApiError {
    fn from(value: ErrorCode) -> Self {
        match value {
            ErrorCode::BadRequestInvalidUrl => ApiError::BadRequestInvalidUrl(value.as_str().to_string()),
            ErrorCode::InvalidSchema => ApiError::InvalidSchema(value.as_str().to_string()),
            ErrorCode::SchemaTooComplex => ApiError::SchemaTooComplex,
            ErrorCode::UnsupportedFormat => ApiError::UnsupportedFormat(value.as_str().to_string()),
            ErrorCode::UpstreamError => ApiError::UpstreamError(value.as_str().to_string()),
            ErrorCode::ExtractFailed | ErrorCode::ExtractEmptyResult | ErrorCode::ExtractIncompleteFields => {
                ApiError::ExtractFailed(value.as_str().to_string())
            }
            ErrorCode::LlmNotConfigured => ApiError::LlmNotConfigured,
            ErrorCode::Internal => ApiError::Internal(value.as_str().to_string()),
        }
    }
}
