//! Request validation helpers

use crate::api::error::{ApiError, ApiResult};

/// Validate that a required string field is not blank
pub fn validate_not_empty(value: &str, field_name: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{} cannot be empty", field_name)));
    }
    Ok(())
}

/// Validate a list limit query parameter
pub fn validate_limit(limit: i64, max: i64) -> ApiResult<()> {
    if limit <= 0 {
        return Err(ApiError::ValidationError("limit must be greater than 0".to_string()));
    }
    if limit > max {
        return Err(ApiError::ValidationError(format!("limit cannot exceed {}", max)));
    }
    Ok(())
}
