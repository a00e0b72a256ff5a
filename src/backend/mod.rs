//! Client view of the five backend operations used by an assignment run.
//!
//! Every expected failure comes back as an outcome variant. `BackendError` is
//! reserved for transport trouble: the request never got a usable answer.

pub mod http;

use async_trait::async_trait;
use std::fmt;

use crate::wire::{self, CustomerResponse, ValidateCardResponse};

pub use http::HttpBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Assignable,
    NotFound,
    /// Covers both `assigned` and `delivered` cards; carries the backend's reason
    AlreadyAssigned(String),
}

impl From<ValidateCardResponse> for ValidationOutcome {
    fn from(resp: ValidateCardResponse) -> Self {
        if resp.valid {
            return ValidationOutcome::Assignable;
        }
        match resp.error {
            Some(err) if err.code == wire::CARD_NOT_FOUND => ValidationOutcome::NotFound,
            Some(err) => ValidationOutcome::AlreadyAssigned(err.message),
            None => ValidationOutcome::AlreadyAssigned("card is not assignable".to_string()),
        }
    }
}

/// Customer as confirmed by the backend for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCustomer {
    pub id: i64,
    pub name: String,
    pub mobile_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    NotRegistered,
    Inactive,
}

impl Ineligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ineligibility::NotRegistered => "not_registered",
            Ineligibility::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerOutcome {
    Eligible(VerifiedCustomer),
    NotFound,
    Ineligible(Ineligibility),
}

impl CustomerOutcome {
    /// An unregistered customer is reported as such even if also inactive
    pub fn from_response(mobile_number: &str, resp: CustomerResponse) -> Self {
        if !resp.is_registered {
            return CustomerOutcome::Ineligible(Ineligibility::NotRegistered);
        }
        if !resp.can_assign_card {
            return CustomerOutcome::Ineligible(Ineligibility::Inactive);
        }
        CustomerOutcome::Eligible(VerifiedCustomer {
            id: resp.id,
            name: resp.name,
            mobile_number: mobile_number.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiateOutcome {
    Dispatched { message: String },
    Rejected(String),
}

/// Opaque code to be written onto the card; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedCode(String);

impl HashedCode {
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            None
        } else {
            Some(Self(code))
        }
    }
}

impl fmt::Display for HashedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success(HashedCode),
    InvalidOtp,
    Expired,
    OtherFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    Dispatched { message: String },
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response (HTTP {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },
}

/// Backend operations consumed by the assignment state machine.
///
/// Callers pass serials and mobiles already normalized.
#[async_trait]
pub trait AssignmentBackend: Send + Sync {
    async fn validate_card(&self, serial: &str) -> Result<ValidationOutcome, BackendError>;

    async fn verify_customer(&self, mobile: &str) -> Result<CustomerOutcome, BackendError>;

    /// Dispatches an OTP on success. There is no way to take that back.
    async fn initiate_assignment(
        &self,
        card_serial: &str,
        customer_mobile: &str,
    ) -> Result<InitiateOutcome, BackendError>;

    async fn verify_assignment_otp(
        &self,
        card_serial: &str,
        customer_mobile: &str,
        otp: &str,
    ) -> Result<VerifyOutcome, BackendError>;

    async fn resend_assignment_otp(
        &self,
        card_serial: &str,
        customer_mobile: &str,
    ) -> Result<ResendOutcome, BackendError>;
}
