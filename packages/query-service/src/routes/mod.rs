pub mod categories;
pub mod health;
pub mod search;

use crate::error::ApiError;

/// Shared by every endpoint's `limit` parameter (spec §8 boundary
/// behaviors: `limit=0` and one past the max both reject).
pub(crate) fn validate_limit(raw: Option<u64>, default: u64, min: u64, max: u64) -> Result<u64, ApiError> {
    let limit = raw.unwrap_or(default);
    if limit < min || limit > max {
        return Err(ApiError::Validation(format!("limit must be between {min} and {max}, got {limit}")));
    }
    Ok(limit)
}

pub(crate) fn validate_query(query: &str) -> Result<(), ApiError> {
    if query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".into()));
    }
    Ok(())
}
