use axum::{extract::State, Json};
use chrono::{Duration, Utc};

use crate::{
    app_state::AppState,
    crypto::{derive_hashed_code, generate_otp, otp_digest, verify_otp_digest},
    db::{models::{PendingAssignment, format_timestamp}, queries},
    error::ApiError,
    serial::{normalize, normalize_mobile},
    validation::{check_card_assignable, check_customer_eligible, require},
    wire::{AssignmentRequest, HashedCodeResponse, MessageResponse, VerifyOtpRequest},
};

/// Wrong OTPs tolerated per dispatch before the pending assignment is dropped
pub(crate) const MAX_OTP_ATTEMPTS: i64 = 5;

/// Only the last four digits of a mobile number go back to the operator
fn mask_mobile(mobile: &str) -> String {
    let visible: String = mobile
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", visible)
}

fn pair(card_serial: &str, customer_mobile: &str) -> Result<(String, String), ApiError> {
    let serial = normalize(card_serial);
    let mobile = normalize_mobile(customer_mobile);
    require("card_serial", &serial)?;
    require("customer_mobile", &mobile)?;
    Ok((serial, mobile))
}

/// Generate, store and send a new OTP for the pair
async fn dispatch_otp(state: &AppState, serial: &str, mobile: &str) -> Result<(), ApiError> {
    let otp = generate_otp();
    let now = Utc::now();

    let pending = PendingAssignment {
        card_serial: serial.to_string(),
        customer_mobile: mobile.to_string(),
        otp_digest: otp_digest(&state.code_key, serial, mobile, &otp)?,
        otp_dispatched_at: format_timestamp(now),
        otp_expires_at: format_timestamp(now + Duration::seconds(state.config.otp_ttl_secs)),
        failed_attempts: 0,
    };
    queries::upsert_pending(&state.pool, &pending).await?;

    state.otp_sender.send_otp(mobile, serial, &otp).await?;
    Ok(())
}

/// POST /api/assignments/initiate
/// Re-checks card and customer, then dispatches an OTP to the customer
pub async fn initiate_assignment(
    State(state): State<AppState>,
    Json(req): Json<AssignmentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (serial, mobile) = pair(&req.card_serial, &req.customer_mobile)?;

    let card = queries::get_card(&state.pool, &serial).await?;
    check_card_assignable(&serial, card.as_ref())?;

    let customer = queries::get_customer_by_mobile(&state.pool, &mobile).await?;
    let customer = check_customer_eligible(&mobile, customer.as_ref())?;

    dispatch_otp(&state, &serial, &mobile).await?;
    tracing::info!(card = %serial, customer_id = customer.customer_id, "assignment initiated");

    Ok(Json(MessageResponse {
        message: format!("OTP sent to {}", mask_mobile(&mobile)),
    }))
}

/// POST /api/assignments/resend-otp
pub async fn resend_assignment_otp(
    State(state): State<AppState>,
    Json(req): Json<AssignmentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (serial, mobile) = pair(&req.card_serial, &req.customer_mobile)?;

    let pending = queries::get_pending(&state.pool, &serial, &mobile)
        .await?
        .ok_or(ApiError::NoPendingAssignment)?;

    let elapsed = pending.secs_since_dispatch(Utc::now())?;
    if elapsed < state.config.resend_cooldown_secs {
        return Err(ApiError::ResendTooSoon(state.config.resend_cooldown_secs - elapsed));
    }

    // The card may have been taken while the OTP was outstanding
    let card = queries::get_card(&state.pool, &serial).await?;
    check_card_assignable(&serial, card.as_ref())?;

    dispatch_otp(&state, &serial, &mobile).await?;
    tracing::info!(card = %serial, "assignment OTP resent");

    Ok(Json(MessageResponse {
        message: format!("OTP resent to {}", mask_mobile(&mobile)),
    }))
}

/// POST /api/assignments/verify-otp
/// Confirms the OTP and binds the card to the customer, returning the code to
/// write onto the card. A wrong OTP leaves the pending assignment in place
/// until `MAX_OTP_ATTEMPTS` is reached.
pub async fn verify_assignment_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<HashedCodeResponse>, ApiError> {
    let (serial, mobile) = pair(&req.card_serial, &req.customer_mobile)?;
    let otp = req.otp.trim();
    require("otp", otp)?;

    let pending = queries::get_pending(&state.pool, &serial, &mobile)
        .await?
        .ok_or(ApiError::NoPendingAssignment)?;

    let now = Utc::now();
    if pending.is_expired(now)? {
        return Err(ApiError::OtpExpired);
    }
    if !verify_otp_digest(&state.code_key, &serial, &mobile, otp, &pending.otp_digest)? {
        let attempts = queries::record_failed_otp(&state.pool, &serial, &mobile).await?;
        tracing::debug!(card = %serial, attempts, "OTP mismatch");
        if attempts >= MAX_OTP_ATTEMPTS {
            queries::delete_pending(&state.pool, &serial, &mobile).await?;
            tracing::warn!(card = %serial, "pending assignment dropped after repeated wrong OTPs");
            return Err(ApiError::OtpAttemptsExceeded);
        }
        return Err(ApiError::InvalidOtp);
    }

    let customer = queries::get_customer_by_mobile(&state.pool, &mobile).await?;
    let customer = check_customer_eligible(&mobile, customer.as_ref())?;

    let nonce: [u8; 16] = rand::random();
    let hashed_code = derive_hashed_code(&state.code_key, &serial, customer.customer_id, &nonce)?;

    if !queries::complete_assignment(&state.pool, &serial, customer.customer_id, &hashed_code, now).await? {
        queries::delete_pending(&state.pool, &serial, &mobile).await?;
        return Err(ApiError::CardAlreadyAssigned(serial));
    }

    tracing::info!(card = %serial, customer_id = customer.customer_id, "card assigned");
    Ok(Json(HashedCodeResponse { hashed_code }))
}
