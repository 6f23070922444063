//! Domain error codes (spec §7). These are returned as data from actor
//! operations, never thrown across an actor boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A domain failure, surfaced verbatim to the HTTP layer (see `http::map_error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "code", content = "message")]
pub enum DomainError {
    // --- Input errors ---
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("negative amount")]
    NegativeAmount,
    #[error("currency mismatch")]
    CurrencyMismatch,
    #[error("insufficient amount for subtraction")]
    InsufficientAmount,
    #[error("odds must be at least 1.01")]
    InvalidOdds,
    #[error("unknown selection: {0}")]
    UnknownSelection(String),
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // --- Contention / state errors ---
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient available balance")]
    InsufficientAvailableBalance,
    #[error("duplicate reservation for bet {0}")]
    DuplicateReservation(String),
    #[error("reservation not found for bet {0}")]
    ReservationNotFound(String),
    #[error("market is suspended")]
    MarketSuspended,
    #[error("odds changed: requested {acceptable}, current {current}")]
    OddsChanged { acceptable: String, current: String },
    #[error("already processed")]
    AlreadyProcessed,
    #[error("already exists")]
    AlreadyExists,
    #[error("market already initialized")]
    AlreadyInitialized,
    #[error("bet not found: {0}")]
    BetNotFound(String),
    #[error("cannot void bet in status {0}")]
    CannotVoidInStatus(String),
    #[error("cannot cash out bet in status {0}")]
    CannotCashOutInStatus(String),
    #[error("event not found: {0}")]
    EventNotFound(String),
    #[error("market not found: {0}")]
    MarketNotFound(String),
    #[error("cannot update event in status {0}")]
    CannotUpdateInStatus(String),
    #[error("cannot set market result in status {0}")]
    CannotSetResultInStatus(String),

    // --- Infrastructure errors ---
    #[error("persistence error: {0}")]
    PersistenceError(String),
    #[error("wallet deposit failed: {0}")]
    WalletDepositFailed(String),
    #[error("operation cancelled")]
    OperationCancelled,
    #[error("actor unavailable: {0}")]
    ActorUnavailable(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
