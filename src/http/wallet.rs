//! `/api/wallet/{userId}/...` (spec §6).

use super::dto::{AmountRequestDto, LimitQuery};
use super::{map_error, ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn deposit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(dto): Json<AmountRequestDto>,
) -> Result<Response, ApiError> {
    let (amount, reference_id) = dto.into_money().map_err(map_error)?;
    let client = state.registries.wallet.client_for(&user_id).await;
    let result = client.deposit(amount, reference_id).await.map_err(map_error)?;
    state.bus.publish("wallet", "deposited", &result);
    Ok(Json(result).into_response())
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(dto): Json<AmountRequestDto>,
) -> Result<Response, ApiError> {
    let (amount, reference_id) = dto.into_money().map_err(map_error)?;
    let client = state.registries.wallet.client_for(&user_id).await;
    let result = client.withdraw(amount, reference_id).await.map_err(map_error)?;
    state.bus.publish("wallet", "withdrawn", &result);
    Ok(Json(result).into_response())
}

pub async fn balance(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.wallet.client_for(&user_id).await;
    let total = client.balance().await.map_err(map_error)?;
    let available = client.available_balance().await.map_err(map_error)?;
    Ok(Json(serde_json::json!({"total": total, "available": available})).into_response())
}

pub async fn transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let client = state.registries.wallet.client_for(&user_id).await;
    let history = client.transaction_history(query.limit).await.map_err(map_error)?;
    Ok(Json(history).into_response())
}
