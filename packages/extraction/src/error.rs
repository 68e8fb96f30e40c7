//! Typed errors for the extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide strongly
//! typed, composable error handling. Every variant carries a stable `code()`
//! so the query service boundary (outside this crate) can map it to an HTTP
//! status without string matching.

use thiserror::Error;

/// The taxonomy from spec §7, shared by every layer of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    ExtractionParseError,
    UnsupportedExtractionType,
    AuthError,
    BadRequest,
    ApiError,
    StorageError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ExtractionParseError => "EXTRACTION_PARSE_ERROR",
            ErrorCode::UnsupportedExtractionType => "UNSUPPORTED_EXTRACTION_TYPE",
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Errors raised by the LLM Gateway (spec §4.3).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rate-limited or timed out; caller already exhausted the retry budget.
    #[error("LLM gateway transient failure after retries: {0}")]
    Transient(String),

    #[error("LLM gateway authentication failed: {0}")]
    Auth(String),

    #[error("LLM gateway rejected the request: {0}")]
    BadRequest(String),

    #[error("LLM gateway error: {0}")]
    Api(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Transient(_) | GatewayError::Api(_) => ErrorCode::ApiError,
            GatewayError::Auth(_) => ErrorCode::AuthError,
            GatewayError::BadRequest(_) => ErrorCode::BadRequest,
        }
    }
}

/// Errors shared across the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported extraction type: {0}")]
    UnsupportedExtractionType(String),

    #[error("extraction parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExtractionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExtractionError::Validation(_) => ErrorCode::ValidationError,
            ExtractionError::NotFound(_) => ErrorCode::NotFound,
            ExtractionError::UnsupportedExtractionType(_) => ErrorCode::UnsupportedExtractionType,
            ExtractionError::Parse(_) => ErrorCode::ExtractionParseError,
            ExtractionError::Gateway(g) => g.code(),
            ExtractionError::Storage(_) => ErrorCode::StorageError,
            ExtractionError::Config(_) => ErrorCode::InternalError,
            ExtractionError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
