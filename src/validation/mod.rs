use crate::{
    db::models::{Card, CardStatus, Customer},
    error::ApiError,
};

/// Card must exist and still be `available` before any OTP goes out
pub fn check_card_assignable<'a>(serial: &str, card: Option<&'a Card>) -> Result<&'a Card, ApiError> {
    let card = card.ok_or_else(|| ApiError::CardNotFound(serial.to_string()))?;

    match card.status() {
        Some(CardStatus::Available) => Ok(card),
        Some(CardStatus::Delivered) => Err(ApiError::CardDelivered(serial.to_string())),
        // Unknown statuses are never assignable
        Some(CardStatus::Assigned) | None => Err(ApiError::CardAlreadyAssigned(serial.to_string())),
    }
}

/// Registration is checked before activity so the operator sees the remediation
/// that applies first.
pub fn check_customer_eligible<'a>(
    mobile: &str,
    customer: Option<&'a Customer>,
) -> Result<&'a Customer, ApiError> {
    let customer = customer.ok_or_else(|| ApiError::CustomerNotFound(mobile.to_string()))?;

    if !customer.is_registered {
        return Err(ApiError::CustomerNotRegistered);
    }
    if !customer.is_active {
        return Err(ApiError::CustomerInactive);
    }
    Ok(customer)
}

/// Reject blank identifiers before touching the database
pub fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}
