//! `/api/events[...]` (spec §6, §4.6).

use super::dto::{SetMarketResultRequestDto, UpdateEventRequestDto, UpdateMarketStatusRequestDto};
use super::{map_error, ApiError, AppState};
use crate::error::DomainError;
use crate::sport_event::{AddMarketRequest, CreateEventRequest};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Response, ApiError> {
    let event_id = Uuid::new_v4().to_string();
    let client = state.registries.sport_event.client_for(&event_id).await;
    let event = client.create_event(request).await.map_err(map_error)?;
    state.bus.publish("event", "created", &event);
    Ok((StatusCode::CREATED, Json(event)).into_response())
}

pub async fn get_event(State(state): State<AppState>, Path(event_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    match client.get_event().await.map_err(map_error)? {
        Some(event) => Ok(Json(event).into_response()),
        None => Err(map_error(DomainError::EventNotFound(event_id))),
    }
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(dto): Json<UpdateEventRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let event = client.update_event(dto.name, dto.start_time).await.map_err(map_error)?;
    Ok(Json(event).into_response())
}

pub async fn start_event(State(state): State<AppState>, Path(event_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let event = client.start_event().await.map_err(map_error)?;
    state.bus.publish("event", "started", &event);
    Ok(Json(event).into_response())
}

pub async fn cancel_event(State(state): State<AppState>, Path(event_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let event = client.cancel_event().await.map_err(map_error)?;
    state.bus.publish("event", "cancelled", &event);
    Ok(Json(event).into_response())
}

pub async fn complete_event(State(state): State<AppState>, Path(event_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let results = client.complete_event().await.map_err(map_error)?;
    state.bus.publish("event", "completed", &results);
    Ok(Json(results).into_response())
}

pub async fn get_markets(State(state): State<AppState>, Path(event_id): Path<String>) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let markets = client.get_markets().await.map_err(map_error)?;
    Ok(Json(markets).into_response())
}

pub async fn add_market(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<AddMarketRequest>,
) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let market = client.add_market(request).await.map_err(map_error)?;
    state.bus.publish("market", "added", &market);
    Ok((StatusCode::CREATED, Json(market)).into_response())
}

pub async fn update_market_status(
    State(state): State<AppState>,
    Path((event_id, market_id)): Path<(String, String)>,
    Json(dto): Json<UpdateMarketStatusRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let market = client.update_market_status(market_id, dto.status.into()).await.map_err(map_error)?;
    state.bus.publish("market", "status_changed", &market);
    Ok(Json(market).into_response())
}

pub async fn set_market_result(
    State(state): State<AppState>,
    Path((event_id, market_id)): Path<(String, String)>,
    Json(dto): Json<SetMarketResultRequestDto>,
) -> Result<Response, ApiError> {
    let client = state.registries.sport_event.client_for(&event_id).await;
    let market = client.set_market_result(market_id, dto.winning_outcome).await.map_err(map_error)?;
    state.bus.publish("market", "result_set", &market);
    Ok(Json(market).into_response())
}
