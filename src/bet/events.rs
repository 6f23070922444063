//! Bet event stream and fold-to-aggregate (spec §4.4, invariant B1: folding
//! the stream n times yields the same aggregate; version = stream length).

use super::types::{Bet, BetStatus, BetType, PlaceBetRequest};
use crate::money::Money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BetEvent {
    Placed { request: PlaceBetRequest },
    Accepted { final_odds: Decimal, potential_payout: Money },
    Rejected { reason: String },
    Settled { outcome: SettlementOutcome, payout: Option<Money> },
    Voided { reason: String },
    CashedOut { payout: Money },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetEventEnvelope {
    pub event_id: Uuid,
    pub bet_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: BetEvent,
}

impl BetEventEnvelope {
    pub fn new(bet_id: impl Into<String>, payload: BetEvent) -> Self {
        BetEventEnvelope {
            event_id: Uuid::new_v4(),
            bet_id: bet_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Rebuilds the current aggregate from a complete event stream. `None` means
/// the stream is empty (no bet has ever been placed under this id).
pub fn fold(bet_id: &str, events: &[BetEventEnvelope]) -> Option<Bet> {
    let mut bet: Option<Bet> = None;
    for event in events {
        bet = Some(apply(bet, bet_id, event));
    }
    bet
}

fn apply(current: Option<Bet>, bet_id: &str, event: &BetEventEnvelope) -> Bet {
    match (&current, &event.payload) {
        (None, BetEvent::Placed { request }) => Bet {
            bet_id: bet_id.to_string(),
            user_id: request.user_id.clone(),
            event_id: request.event_id.clone(),
            market_id: request.market_id.clone(),
            selection_id: request.selection_id.clone(),
            stake: request.stake,
            acceptable_odds: request.acceptable_odds,
            final_odds: None,
            bet_type: BetType::Single,
            status: BetStatus::Pending,
            placed_at: Some(event.timestamp),
            settled_at: None,
            payout: None,
            rejection_reason: None,
            void_reason: None,
            version: 1,
        },
        (Some(bet), BetEvent::Accepted { final_odds, potential_payout }) => Bet {
            status: BetStatus::Accepted,
            final_odds: Some(*final_odds),
            payout: Some(*potential_payout),
            version: bet.version + 1,
            ..bet.clone()
        },
        (Some(bet), BetEvent::Rejected { reason }) => Bet {
            status: BetStatus::Rejected,
            rejection_reason: Some(reason.clone()),
            payout: None,
            version: bet.version + 1,
            ..bet.clone()
        },
        (Some(bet), BetEvent::Settled { outcome, payout }) => Bet {
            status: match outcome {
                SettlementOutcome::Won => BetStatus::Won,
                SettlementOutcome::Lost => BetStatus::Lost,
            },
            settled_at: Some(event.timestamp),
            payout: *payout,
            version: bet.version + 1,
            ..bet.clone()
        },
        (Some(bet), BetEvent::Voided { reason }) => Bet {
            status: BetStatus::Void,
            void_reason: Some(reason.clone()),
            settled_at: Some(event.timestamp),
            payout: refund_payout(bet),
            version: bet.version + 1,
            ..bet.clone()
        },
        (Some(bet), BetEvent::CashedOut { payout }) => Bet {
            status: BetStatus::CashOut,
            settled_at: Some(event.timestamp),
            payout: Some(*payout),
            version: bet.version + 1,
            ..bet.clone()
        },
        (None, _) => unreachable!("first event on a stream must be BetPlaced"),
        (Some(_), BetEvent::Placed { .. }) => unreachable!("AlreadyProcessed is checked before appending"),
    }
}

fn refund_payout(bet: &Bet) -> Option<Money> {
    if bet.status == BetStatus::Accepted {
        Some(bet.stake)
    } else {
        None
    }
}

/// Every `BetAggregate` snapshot after applying one event, in chronological
/// order (spec §4.4 `GetBetHistory`).
pub fn history(bet_id: &str, events: &[BetEventEnvelope]) -> Vec<Bet> {
    let mut out = Vec::with_capacity(events.len());
    let mut bet: Option<Bet> = None;
    for event in events {
        bet = Some(apply(bet, bet_id, event));
        out.push(bet.clone().expect("just applied"));
    }
    out
}
