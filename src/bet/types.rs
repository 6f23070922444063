use crate::money::Money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetType {
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetStatus {
    Pending,
    Accepted,
    Rejected,
    Void,
    Won,
    Lost,
    CashOut,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BetStatus::Rejected | BetStatus::Void | BetStatus::Won | BetStatus::Lost | BetStatus::CashOut
        )
    }
}

/// Caller-supplied request to place a bet. `acceptable_odds` is the worst
/// decimal odds the caller will accept (spec: "at least this good").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub event_id: String,
    pub market_id: String,
    pub selection_id: String,
    pub stake: Money,
    pub acceptable_odds: Decimal,
}

/// The bet aggregate, reconstructed by folding its event stream (spec §4.4,
/// invariant B1). Returned by value - never a live reference into actor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub bet_id: String,
    pub user_id: String,
    pub event_id: String,
    pub market_id: String,
    pub selection_id: String,
    pub stake: Money,
    pub acceptable_odds: Decimal,
    pub final_odds: Option<Decimal>,
    pub bet_type: BetType,
    pub status: BetStatus,
    pub placed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub payout: Option<Money>,
    pub rejection_reason: Option<String>,
    pub void_reason: Option<String>,
    pub version: u64,
}

impl Bet {
    pub fn potential_payout(&self) -> Option<Money> {
        let odds = self.final_odds?;
        self.stake.multiply(odds).ok()
    }
}
