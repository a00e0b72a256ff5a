use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::wire::{self, ErrorBody};

/// Errors returned by the assignment backend routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("card {0} not found")]
    CardNotFound(String),
    #[error("card {0} is already assigned to a customer")]
    CardAlreadyAssigned(String),
    #[error("card {0} has already been delivered")]
    CardDelivered(String),
    #[error("no customer with mobile number {0}")]
    CustomerNotFound(String),
    #[error("customer is not registered")]
    CustomerNotRegistered,
    #[error("customer account is inactive")]
    CustomerInactive,
    #[error("no pending assignment for this card and customer")]
    NoPendingAssignment,
    #[error("invalid OTP")]
    InvalidOtp,
    #[error("OTP has expired")]
    OtpExpired,
    #[error("too many incorrect OTP attempts; start the assignment again")]
    OtpAttemptsExceeded,
    #[error("OTP was sent recently, retry in {0}s")]
    ResendTooSoon(i64),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CardNotFound(_) => wire::CARD_NOT_FOUND,
            Self::CardAlreadyAssigned(_) => wire::CARD_ALREADY_ASSIGNED,
            Self::CardDelivered(_) => wire::CARD_DELIVERED,
            Self::CustomerNotFound(_) => wire::CUSTOMER_NOT_FOUND,
            Self::CustomerNotRegistered => wire::CUSTOMER_NOT_REGISTERED,
            Self::CustomerInactive => wire::CUSTOMER_INACTIVE,
            Self::NoPendingAssignment => wire::NO_PENDING_ASSIGNMENT,
            Self::InvalidOtp => wire::INVALID_OTP,
            Self::OtpExpired => wire::OTP_EXPIRED,
            Self::OtpAttemptsExceeded => wire::OTP_ATTEMPTS_EXCEEDED,
            Self::ResendTooSoon(_) => wire::OTP_RESEND_TOO_SOON,
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::CardNotFound(_) | Self::CustomerNotFound(_) | Self::NoPendingAssignment => {
                StatusCode::NOT_FOUND
            }
            Self::CardAlreadyAssigned(_) | Self::CardDelivered(_) => StatusCode::CONFLICT,
            Self::CustomerNotRegistered | Self::CustomerInactive => StatusCode::FORBIDDEN,
            Self::InvalidOtp => StatusCode::UNAUTHORIZED,
            Self::OtpExpired => StatusCode::GONE,
            Self::ResendTooSoon(_) | Self::OtpAttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // TraceLayer already records status for every request; only the
        // anyhow chain behind a 500 needs logging here.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, "internal error");
        }
        (self.status(), axum::Json(self.body())).into_response()
    }
}
