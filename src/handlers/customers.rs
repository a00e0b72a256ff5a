use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    app_state::AppState,
    db::{models::Customer, queries},
    error::ApiError,
    serial::normalize_mobile,
    validation::require,
    wire::{CustomerResponse, RegisterCustomerRequest, VerifyCustomerRequest},
};

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        let can_assign_card = customer.can_assign_card();
        CustomerResponse {
            id: customer.customer_id,
            name: customer.name,
            is_registered: customer.is_registered,
            can_assign_card,
        }
    }
}

/// POST /api/customers/verify
/// Resolves a mobile number to the customer and their eligibility flags, 404 if unknown
pub async fn verify_customer(
    State(state): State<AppState>,
    Json(req): Json<VerifyCustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let mobile = normalize_mobile(&req.mobile_number);
    require("mobile_number", &mobile)?;

    let customer = queries::get_customer_by_mobile(&state.pool, &mobile)
        .await?
        .ok_or_else(|| ApiError::CustomerNotFound(mobile.clone()))?;

    Ok(Json(customer.into()))
}

/// POST /api/customers
pub async fn register_customer(
    State(state): State<AppState>,
    Json(req): Json<RegisterCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let mobile = normalize_mobile(&req.mobile_number);
    require("mobile_number", &mobile)?;
    require("name", req.name.trim())?;

    queries::upsert_customer(
        &state.pool,
        &mobile,
        req.name.trim(),
        req.is_registered,
        req.is_active,
    )
    .await?;

    let customer = queries::get_customer_by_mobile(&state.pool, &mobile)
        .await?
        .ok_or_else(|| ApiError::CustomerNotFound(mobile.clone()))?;

    tracing::info!(customer_id = customer.customer_id, "customer registered");
    Ok((StatusCode::CREATED, Json(customer.into())))
}
