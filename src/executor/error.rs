use thiserror::Error;

/// Error-code taxonomy surfaced to clients (spec §6). Executors classify
/// failures into these so `summary.failedByCode` (extract) and job `error`
/// strings (crawl/batch) carry a stable machine-readable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadRequestInvalidUrl,
    InvalidSchema,
    SchemaTooComplex,
    UnsupportedFormat,
    UpstreamError,
    ExtractFailed,
    ExtractEmptyResult,
    ExtractIncompleteFields,
    LlmNotConfigured,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequestInvalidUrl => "BAD_REQUEST_INVALID_URL",
            ErrorCode::InvalidSchema => "INVALID_SCHEMA",
            ErrorCode::SchemaTooComplex => "SCHEMA_TOO_COMPLEX",
            ErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::ExtractFailed => "EXTRACT_FAILED",
            ErrorCode::ExtractEmptyResult => "EXTRACT_EMPTY_RESULT",
            ErrorCode::ExtractIncompleteFields => "EXTRACT_INCOMPLETE_FIELDS",
            ErrorCode::LlmNotConfigured => "LLM_NOT_CONFIGURED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ExecutorError {
    pub code: ErrorCode,
    pub message: String,
}

impl ExecutorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
