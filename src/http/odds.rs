//! `/api/odds/{marketId}[/history|/suspend|/resume|/lock|/unlock|/volatility]`
//! (spec §6, §4.3).

use super::dto::{source_or_manual, InitializeMarketRequestDto, LockRequestDto, ReasonRequestDto, UpdateOddsRequestDto, VolatilityScoreQuery};
use super::{map_error, ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub async fn current_odds(State(state): State<AppState>, Path(market_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let odds = client.current_odds().await.map_err(map_error)?;
    Ok(Json(odds).into_response())
}

pub async fn initialize_market(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Json(dto): Json<InitializeMarketRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let source = source_or_manual(dto.source);
    let snapshot = client.initialize_market(dto.selection_odds, source).await.map_err(map_error)?;
    state.bus.publish("odds", "initialized", &snapshot);
    Ok(Json(snapshot).into_response())
}

pub async fn odds_history(State(state): State<AppState>, Path(market_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let history = client.all_odds_history().await.map_err(map_error)?;
    Ok(Json(history).into_response())
}

pub async fn suspend(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Json(dto): Json<ReasonRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let snapshot = client.suspend(dto.reason).await.map_err(map_error)?;
    state.bus.publish("odds", "suspended", &snapshot);
    Ok(Json(snapshot).into_response())
}

pub async fn resume(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Json(dto): Json<ReasonRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let snapshot = client.resume(dto.reason).await.map_err(map_error)?;
    state.bus.publish("odds", "resumed", &snapshot);
    Ok(Json(snapshot).into_response())
}

pub async fn lock_for_bet(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Json(dto): Json<LockRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let snapshot = client.lock_for_bet(dto.bet_id, dto.selection_id).await.map_err(map_error)?;
    Ok(Json(snapshot).into_response())
}

pub async fn unlock(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Json(dto): Json<super::dto::BetIdRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let snapshot = client.unlock(dto.bet_id).await.map_err(map_error)?;
    Ok(Json(snapshot).into_response())
}

pub async fn volatility(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Query(query): Query<VolatilityScoreQuery>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let level = client.current_volatility().await.map_err(map_error)?;
    let score = client.volatility_score(query.window_minutes).await.map_err(map_error)?;
    Ok(Json(serde_json::json!({"level": level, "score": score})).into_response())
}

pub async fn update_odds(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Json(dto): Json<UpdateOddsRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.odds.client_for(&market_id).await;
    let source = source_or_manual(dto.source);
    let updates: HashMap<String, (Decimal, Option<String>)> =
        dto.updates.into_iter().map(|(k, v)| (k, (v.odds, v.reason))).collect();
    let snapshot = client.update_odds(updates, source).await.map_err(map_error)?;
    state.bus.publish("odds", "updated", &snapshot);
    Ok(Json(snapshot).into_response())
}
