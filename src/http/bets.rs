//! `POST /api/bets` and friends (spec §6). `Idempotency-Key` resolves the
//! betId an actor is addressed by: callers that retry a request with the
//! same key land on the same bet actor, which rejects a second `PlaceBet`
//! with `AlreadyProcessed` - the HTTP layer turns that into a 200 replay of
//! the already-accepted bet instead of surfacing the conflict.

use super::dto::{LimitQuery, PlaceBetRequestDto, VoidBetRequestDto};
use super::{map_error, ApiError, AppState};
use crate::error::DomainError;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

fn idempotency_bet_id(headers: &HeaderMap) -> String {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn place_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dto): Json<PlaceBetRequestDto>,
) -> Result<Response, ApiError> {
    let request = dto.into_domain().map_err(map_error)?;
    let bet_id = idempotency_bet_id(&headers);
    let client = state.registries.bet.client_for(&bet_id).await;

    match client.place_bet(request).await {
        Ok(bet) => {
            state.bus.publish("bet", "placed", &bet);
            Ok((StatusCode::CREATED, Json(bet)).into_response())
        }
        Err(DomainError::AlreadyProcessed) => match client.get_bet_details().await {
            Ok(Some(bet)) => Ok((StatusCode::OK, Json(bet)).into_response()),
            _ => Err(map_error(DomainError::AlreadyProcessed)),
        },
        Err(e) => Err(map_error(e)),
    }
}

pub async fn get_bet(State(state): State<AppState>, Path(bet_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.bet.client_for(&bet_id).await;
    match client.get_bet_details().await.map_err(map_error)? {
        Some(bet) => Ok(Json(bet).into_response()),
        None => Err(map_error(DomainError::BetNotFound(bet_id))),
    }
}

pub async fn void_bet(
    State(state): State<AppState>,
    Path(bet_id): Path<String>,
    Json(dto): Json<VoidBetRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.bet.client_for(&bet_id).await;
    let bet = client.void_bet(dto.reason).await.map_err(map_error)?;
    state.bus.publish("bet", "voided", &bet);
    Ok(Json(bet).into_response())
}

pub async fn cash_out(State(state): State<AppState>, Path(bet_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.bet.client_for(&bet_id).await;
    let bet = client.cash_out().await.map_err(map_error)?;
    state.bus.publish("bet", "cashed_out", &bet);
    Ok(Json(bet).into_response())
}

pub async fn user_bets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let client = state.registries.bet_index.client_for(&user_id).await;
    let ids = client.user_bets(query.limit).await.map_err(map_error)?;
    Ok(Json(ids).into_response())
}

pub async fn active_bets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let client = state.registries.bet_index.client_for(&user_id).await;
    let bets = client.active_bets(query.limit, state.registries.bet.as_ref()).await.map_err(map_error)?;
    Ok(Json(bets).into_response())
}

pub async fn bet_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let client = state.registries.bet_index.client_for(&user_id).await;
    let bets = client.bet_history(query.limit, state.registries.bet.as_ref()).await.map_err(map_error)?;
    Ok(Json(bets).into_response())
}
