use axum::http::{HeaderMap, StatusCode};
use engine::{EngineError, TokenError};
use tracing::error;

pub type ApiError = (StatusCode, String);
pub type ApiResult<T> = Result<T, ApiError>;

pub fn engine_error(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidParent { .. } | EngineError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::DepthExceeded { .. } => StatusCode::CONFLICT,
        EngineError::Store(inner) => {
            error!("store failure: {:?}", inner);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal storage error".to_string(),
            );
        }
    };
    (status, e.to_string())
}

pub fn token_error(e: TokenError) -> ApiError {
    (StatusCode::BAD_REQUEST, format!("Invalid link: {}", e))
}

/// Reads the caller's UTC offset in minutes from `x-timezone-offset`.
pub fn timezone_offset(headers: &HeaderMap) -> i32 {
    headers
        .get("x-timezone-offset")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
