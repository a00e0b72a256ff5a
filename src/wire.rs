//! JSON bodies exchanged between the assignment client and the backend.

use serde::{Deserialize, Serialize};

pub const CARD_NOT_FOUND: &str = "CARD_NOT_FOUND";
pub const CARD_ALREADY_ASSIGNED: &str = "CARD_ALREADY_ASSIGNED";
pub const CARD_DELIVERED: &str = "CARD_DELIVERED";
pub const CUSTOMER_NOT_FOUND: &str = "CUSTOMER_NOT_FOUND";
pub const CUSTOMER_NOT_REGISTERED: &str = "CUSTOMER_NOT_REGISTERED";
pub const CUSTOMER_INACTIVE: &str = "CUSTOMER_INACTIVE";
pub const INVALID_OTP: &str = "INVALID_OTP";
pub const OTP_EXPIRED: &str = "OTP_EXPIRED";
pub const OTP_ATTEMPTS_EXCEEDED: &str = "OTP_ATTEMPTS_EXCEEDED";
pub const OTP_RESEND_TOO_SOON: &str = "OTP_RESEND_TOO_SOON";
pub const NO_PENDING_ASSIGNMENT: &str = "NO_PENDING_ASSIGNMENT";

/// `{code, message}` body carried by every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCardRequest {
    pub serial_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCardResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCustomerRequest {
    pub mobile_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerResponse {
    pub id: i64,
    pub name: String,
    pub is_registered: bool,
    pub can_assign_card: bool,
}

/// Body shared by initiate and resend; both address the same pending pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub card_serial: String,
    pub customer_mobile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub card_serial: String,
    pub customer_mobile: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedCodeResponse {
    pub hashed_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionCardRequest {
    pub serial_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResponse {
    pub serial_number: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub mobile_number: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_registered: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
