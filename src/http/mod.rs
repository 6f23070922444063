//! HTTP surface in front of the CORE actors (spec §6). Follows the teacher's
//! `main.rs` handler shape - `State<AppState>` extraction, a `Json<Value>`-ish
//! result alias, `Path`/`Query` extractors - generalized to a typed
//! `ApiError` that maps `DomainError` to HTTP status per spec §7.

pub mod bets;
pub mod dto;
pub mod events;
pub mod odds;
pub mod ratelimit;
pub mod wallet;

use crate::config::Config;
use crate::error::DomainError;
use crate::eventbus::EventBus;
use crate::runtime::AppRegistries;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub registries: Arc<AppRegistries>,
    pub bus: Arc<EventBus>,
    pub config: Arc<Config>,
}

/// Mirrors the teacher's `ApiResult<T>` alias, with the error half carrying a
/// typed status/body pair produced by `map_error`.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Maps a domain error to its HTTP status per spec §7; the body always
/// carries the domain error's own `code`/`message` shape (see
/// `DomainError`'s `#[serde(tag = "code", content = "message")]`).
pub fn map_error(error: DomainError) -> ApiError {
    let status = match &error {
        DomainError::InvalidRequest(_)
        | DomainError::NonPositiveAmount
        | DomainError::NegativeAmount
        | DomainError::CurrencyMismatch
        | DomainError::InsufficientAmount
        | DomainError::InvalidOdds
        | DomainError::UnknownSelection(_)
        | DomainError::InvalidTransition { .. }
        | DomainError::InsufficientBalance
        | DomainError::InsufficientAvailableBalance
        | DomainError::CannotVoidInStatus(_)
        | DomainError::CannotCashOutInStatus(_)
        | DomainError::CannotUpdateInStatus(_)
        | DomainError::CannotSetResultInStatus(_) => StatusCode::BAD_REQUEST,

        DomainError::BetNotFound(_) | DomainError::EventNotFound(_) | DomainError::MarketNotFound(_) => {
            StatusCode::NOT_FOUND
        }

        DomainError::DuplicateReservation(_)
        | DomainError::ReservationNotFound(_)
        | DomainError::MarketSuspended
        | DomainError::OddsChanged { .. }
        | DomainError::AlreadyProcessed
        | DomainError::AlreadyExists
        | DomainError::AlreadyInitialized => StatusCode::CONFLICT,

        DomainError::PersistenceError(_)
        | DomainError::WalletDepositFailed(_)
        | DomainError::OperationCancelled
        | DomainError::ActorUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = serde_json::to_value(&error).unwrap_or_else(|_| json!({"code": "Unknown", "message": error.to_string()}));
    ApiError { status, body }
}

pub fn router(state: AppState) -> Router {
    let rate_limit = ratelimit::RateLimitLayer::new(
        state.config.server.rate_limit_per_window,
        state.config.server.rate_limit_window_secs,
    );

    Router::new()
        .route("/health", get(health))
        .route("/api/bets", post(bets::place_bet))
        .route("/api/bets/:bet_id", get(bets::get_bet))
        .route("/api/bets/:bet_id/void", post(bets::void_bet))
        .route("/api/bets/:bet_id/cashout", post(bets::cash_out))
        .route("/api/bets/users/:user_id", get(bets::user_bets))
        .route("/api/bets/users/:user_id/active", get(bets::active_bets))
        .route("/api/bets/users/:user_id/history", get(bets::bet_history))
        .route("/api/wallet/:user_id/deposit", post(wallet::deposit))
        .route("/api/wallet/:user_id/withdraw", post(wallet::withdraw))
        .route("/api/wallet/:user_id/balance", get(wallet::balance))
        .route("/api/wallet/:user_id/transactions", get(wallet::transactions))
        .route("/api/events", post(events::create_event))
        .route("/api/events/:event_id", get(events::get_event))
        .route("/api/events/:event_id", put(events::update_event))
        .route("/api/events/:event_id/start", post(events::start_event))
        .route("/api/events/:event_id/complete", post(events::complete_event))
        .route("/api/events/:event_id/cancel", post(events::cancel_event))
        .route("/api/events/:event_id/markets", get(events::get_markets))
        .route("/api/events/:event_id/markets", post(events::add_market))
        .route("/api/events/:event_id/markets/:market_id/status", put(events::update_market_status))
        .route("/api/events/:event_id/markets/:market_id/result", post(events::set_market_result))
        .route("/api/odds/:market_id", get(odds::current_odds))
        .route("/api/odds/:market_id", post(odds::initialize_market))
        .route("/api/odds/:market_id", put(odds::update_odds))
        .route("/api/odds/:market_id/history", get(odds::odds_history))
        .route("/api/odds/:market_id/suspend", post(odds::suspend))
        .route("/api/odds/:market_id/resume", post(odds::resume))
        .route("/api/odds/:market_id/lock", post(odds::lock_for_bet))
        .route("/api/odds/:market_id/unlock", post(odds::unlock))
        .route("/api/odds/:market_id/volatility", get(odds::volatility))
        .route("/api/stream", get(stream_handler))
        .layer(rate_limit)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_connection(socket, state))
}

async fn stream_connection(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.bus.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else { continue };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_)) = receiver.next().await {
            // Clients only subscribe; inbound messages are ignored.
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
    debug!("stream client disconnected");
}
