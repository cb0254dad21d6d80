//! Error types for the canteen server.
//!
//! Every handler returns [`ApiResult`]. Domain and database errors convert
//! into [`ApiError`], which renders as
//! `{"success": false, "code": "...", "message": "..."}`.
//!
//! ```text
//! CoreError / ValidationError ──► 400 (404 for unknown tickets/users)
//! DbError::NotFound           ──► 404
//! DbError::UniqueViolation    ──► 409 (raced write)
//! DbError::* (infrastructure) ──► 500, details only in the log
//! ```

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use canteen_core::{CoreError, ValidationError};
use canteen_db::DbError;

/// Machine-readable error code carried in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    PriceMismatch,
    QuantityNotOffered,
    TicketAlreadyCancelled,
    TicketIsWinner,
    NoEligibleTickets,
    ConfirmationRequired,
    CouponNotApplicable,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    TooManyAttempts,
    InternalError,
}

/// HTTP-facing error.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
    /// Seconds, sent as `Retry-After` on 429.
    pub retry_after: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    code: ErrorCode,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, ErrorCode::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ErrorCode::Conflict, message)
    }

    pub fn too_many_attempts(retry_after_secs: u64) -> Self {
        let minutes = retry_after_secs.div_ceil(60).max(1);
        ApiError {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: ErrorCode::TooManyAttempts,
            message: format!("Too many login attempts. Try again in {minutes} minute(s)."),
            retry_after: Some(retry_after_secs),
        }
    }

    /// Generic 500. The detail is logged, never returned.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal server error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Internal server error",
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}): {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            code: self.code,
            message: &self.message,
        };

        let mut response = (self.status, Json(body)).into_response();

        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let (status, code) = match &err {
            CoreError::TicketNotFound(_) | CoreError::UserNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NotFound)
            }
            CoreError::PriceMismatch { .. } => (StatusCode::BAD_REQUEST, ErrorCode::PriceMismatch),
            CoreError::QuantityNotOffered { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::QuantityNotOffered)
            }
            CoreError::TicketAlreadyCancelled(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::TicketAlreadyCancelled)
            }
            CoreError::TicketIsWinner(_) => (StatusCode::BAD_REQUEST, ErrorCode::TicketIsWinner),
            CoreError::NoEligibleTickets => {
                (StatusCode::BAD_REQUEST, ErrorCode::NoEligibleTickets)
            }
            CoreError::ConfirmationRequired => {
                (StatusCode::BAD_REQUEST, ErrorCode::ConfirmationRequired)
            }
            CoreError::CouponNotApplicable { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::CouponNotApplicable)
            }
            CoreError::Validation(inner) => {
                return ApiError::bad_request(inner.to_string());
            }
        };

        ApiError::new(status, code, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(format!("{entity} not found: {id}")),
            DbError::UniqueViolation { field, value } if field == "username" => {
                ApiError::conflict(format!("Username '{value}' is already taken"))
            }
            raced @ (DbError::UniqueViolation { .. } | DbError::CheckViolation { .. }) => {
                error!(error = %raced, "Write lost a race with a concurrent request");
                ApiError::conflict("The request conflicted with a concurrent change; retry")
            }
            other => ApiError::internal(other),
        }
    }
}

/// Result type for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use canteen_core::Money;

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::PriceMismatch {
            expected: Money::from_cents(50),
            claimed: 0.49,
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::PriceMismatch);
        assert!(err.message.contains("0.50"));

        let err: ApiError = CoreError::TicketNotFound("x".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = CoreError::NoEligibleTickets.into();
        assert_eq!(err.code, ErrorCode::NoEligibleTickets);
    }

    #[test]
    fn test_db_error_mapping() {
        let err: ApiError = DbError::duplicate("tickets.ticket_number", "unknown").into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = DbError::duplicate("username", "alice").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(err.message.contains("alice"));

        let err: ApiError = DbError::PoolExhausted.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_rate_limit_message_rounds_up() {
        let err = ApiError::too_many_attempts(61);
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(err.message.contains("2 minute"));
        assert_eq!(err.retry_after, Some(61));
    }
}
