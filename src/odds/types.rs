use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Manual,
    Feed,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsValue {
    pub decimal: Decimal,
    pub market_id: String,
    pub selection_id: String,
    pub source: Source,
    pub timestamp: DateTime<Utc>,
}

impl OddsValue {
    pub fn implied_probability(&self) -> f64 {
        1.0 / self.decimal.to_string().parse::<f64>().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsUpdate {
    pub previous_odds: Decimal,
    pub new_odds: Decimal,
    pub source: Source,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl OddsUpdate {
    /// |new - previous| / previous * 100.
    pub fn percentage_change(&self) -> f64 {
        let previous: f64 = self.previous_odds.to_string().parse().unwrap_or(0.0);
        let new: f64 = self.new_odds.to_string().parse().unwrap_or(0.0);
        if previous == 0.0 {
            return 0.0;
        }
        ((new - previous) / previous * 100.0).abs()
    }
}

/// Per-(marketId, selectionId) change history: an initial baseline plus an
/// ordered sequence of applied updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsHistory {
    pub selection_id: String,
    pub initial_odds: Decimal,
    pub updates: Vec<OddsUpdate>,
}

impl OddsHistory {
    pub fn new(selection_id: impl Into<String>, initial_odds: Decimal) -> Self {
        OddsHistory {
            selection_id: selection_id.into(),
            initial_odds,
            updates: Vec::new(),
        }
    }

    pub fn current_odds(&self) -> Decimal {
        self.updates.last().map(|u| u.new_odds).unwrap_or(self.initial_odds)
    }

    pub fn updates_in_window(&self, now: DateTime<Utc>, window_minutes: i64) -> Vec<&OddsUpdate> {
        let cutoff = now - chrono::Duration::minutes(window_minutes.max(1));
        self.updates.iter().filter(|u| u.updated_at >= cutoff).collect()
    }
}

/// Current public view of a market: per-selection odds, suspension state,
/// and the most recently computed volatility level. Returned by value -
/// callers never hold a mutable reference into actor state (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub market_id: String,
    pub odds: HashMap<String, Decimal>,
    pub suspended: bool,
    pub suspension_reason: Option<String>,
    pub volatility: super::volatility::VolatilityLevel,
    pub timestamp: DateTime<Utc>,
}
