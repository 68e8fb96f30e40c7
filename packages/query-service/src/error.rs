//! Typed API errors and their mapping to HTTP (spec §7: "the query service
//! is the only layer that maps errors to HTTP").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::Tier;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    Forbidden { current_tier: Tier, required_tier: Tier },
    NotFound(String),
    RateLimited { retry_after_secs: u64, limit: u32, reset_at: i64 },
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(m) | ApiError::Unauthorized(m) | ApiError::NotFound(m) | ApiError::Internal(m) => {
                m.clone()
            }
            ApiError::Forbidden { current_tier, required_tier } => {
                format!("tier {current_tier} cannot access a {required_tier}-tier endpoint")
            }
            ApiError::RateLimited { .. } => "rate limit exceeded".to_string(),
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::Forbidden { current_tier, required_tier } => json!({
                "current_tier": current_tier.as_str(),
                "required_tier": required_tier.as_str(),
            }),
            ApiError::RateLimited { limit, reset_at, .. } => json!({
                "limit": limit,
                "reset_at": reset_at,
            }),
            _ => json!({}),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    details: Value,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = if let ApiError::RateLimited { retry_after_secs, .. } = &self {
            Some(*retry_after_secs)
        } else {
            None
        };
        let body = ErrorEnvelope {
            error: ErrorBody { code: self.code().to_string(), message: self.message(), details: self.details() },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert("retry-after", secs.to_string().parse().expect("numeric header value"));
        }
        response
    }
}

/// Maps library faults onto `INTERNAL_ERROR`/`NOT_FOUND`/`VALIDATION_ERROR`
/// by the error's own `code()`, so this crate never re-derives the taxonomy.
impl From<extraction::ExtractionError> for ApiError {
    fn from(err: extraction::ExtractionError) -> Self {
        use extraction::ErrorCode;
        match err.code() {
            ErrorCode::ValidationError => ApiError::Validation(err.to_string()),
            ErrorCode::NotFound => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
