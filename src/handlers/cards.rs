use axum::{Json, extract::State, http::StatusCode};

use crate::{
    app_state::AppState,
    db::queries,
    error::ApiError,
    serial::normalize,
    validation::{check_card_assignable, require},
    wire::{CardResponse, ProvisionCardRequest, ValidateCardRequest, ValidateCardResponse},
};

/// POST /api/cards/validate
/// Answers whether the card can be assigned right now. Expected rejections are
/// reported in the body with `valid: false`, not as an HTTP error.
pub async fn validate_card(
    State(state): State<AppState>,
    Json(req): Json<ValidateCardRequest>,
) -> Result<Json<ValidateCardResponse>, ApiError> {
    let serial = normalize(&req.serial_number);
    require("serial_number", &serial)?;

    let card = queries::get_card(&state.pool, &serial).await?;

    let response = match check_card_assignable(&serial, card.as_ref()) {
        Ok(_) => ValidateCardResponse {
            valid: true,
            error: None,
        },
        Err(e) => {
            tracing::debug!(card = %serial, code = e.code(), "card not assignable");
            ValidateCardResponse {
                valid: false,
                error: Some(e.body()),
            }
        }
    };

    Ok(Json(response))
}

/// POST /api/cards
/// Provisions a blank card in the `available` state
pub async fn provision_card(
    State(state): State<AppState>,
    Json(req): Json<ProvisionCardRequest>,
) -> Result<(StatusCode, Json<CardResponse>), ApiError> {
    let serial = normalize(&req.serial_number);
    require("serial_number", &serial)?;

    let created = queries::insert_card(&state.pool, &serial).await?;
    let card = queries::get_card(&state.pool, &serial)
        .await?
        .ok_or_else(|| ApiError::CardNotFound(serial.clone()))?;

    let status = if created {
        tracing::info!(card = %serial, "card provisioned");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(CardResponse {
            serial_number: card.serial_number,
            status: card.status,
        }),
    ))
}
