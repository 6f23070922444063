use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EventStatus {
    Scheduled,
    Live,
    Suspended,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// Spec §4.6's event lifecycle: Scheduled -> Live -> Completed is the
    /// main line; Scheduled <-> Suspended covers a delayed kickoff;
    /// Suspended -> Cancelled and Scheduled -> Cancelled cover abandonment.
    /// Everything else is `InvalidTransition`.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        use EventStatus::*;
        matches!(
            (self, next),
            (Scheduled, Live) | (Scheduled, Suspended) | (Suspended, Scheduled) | (Scheduled, Cancelled)
                | (Live, Suspended) | (Live, Completed) | (Suspended, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MarketStatus {
    Open,
    Suspended,
    Closed,
    Settled,
}

impl MarketStatus {
    pub fn can_transition_to(self, next: MarketStatus) -> bool {
        use MarketStatus::*;
        matches!(
            (self, next),
            (Open, Suspended) | (Suspended, Open) | (Open, Closed) | (Suspended, Closed) | (Closed, Settled)
        )
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SportEvent {
    pub event_id: String,
    pub name: String,
    pub sport_type: String,
    pub competition: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
    /// Ordered role -> name pairs, e.g. ("home", "Arsenal").
    pub participants: Vec<(String, String)>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Market {
    pub market_id: String,
    pub event_id: String,
    pub name: String,
    pub description: String,
    /// Selection ids this market offers, e.g. "home"/"draw"/"away".
    pub outcomes: Vec<String>,
    pub status: MarketStatus,
    pub winning_outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub sport_type: String,
    pub competition: String,
    pub start_time: DateTime<Utc>,
    pub participants: Vec<(String, String)>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddMarketRequest {
    pub name: String,
    pub description: String,
    pub outcomes: Vec<String>,
}

/// Per-bet settlement outcome produced by `CompleteEvent`'s dispatch.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SettlementDispatchResult {
    pub bet_id: String,
    pub outcome: crate::bet::SettlementOutcome,
    pub applied: bool,
    pub error: Option<String>,
}
