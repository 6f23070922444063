//! Request DTOs for bodies that combine an amount with a currency tag - the
//! domain types (`Bet`, `SportEvent`, `Market`, `OddsSnapshot`,
//! `WalletTransaction`, ...) already derive `Serialize`/`Deserialize` and are
//! returned as-is, so only inputs needing translation live here.

use crate::error::DomainError;
use crate::money::{Currency, Money};
use crate::odds::Source;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequestDto {
    pub user_id: String,
    pub event_id: String,
    pub market_id: String,
    pub selection_id: String,
    pub stake: Decimal,
    pub currency: String,
    pub acceptable_odds: Decimal,
}

impl PlaceBetRequestDto {
    pub fn into_domain(self) -> Result<crate::bet::PlaceBetRequest, DomainError> {
        let currency = Currency::parse(&self.currency)?;
        let stake = Money::new(self.stake, currency)?;
        Ok(crate::bet::PlaceBetRequest {
            user_id: self.user_id,
            event_id: self.event_id,
            market_id: self.market_id,
            selection_id: self.selection_id,
            stake,
            acceptable_odds: self.acceptable_odds,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VoidBetRequestDto {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequestDto {
    pub amount: Decimal,
    pub currency: String,
    pub transaction_id: String,
}

impl AmountRequestDto {
    pub fn into_money(self) -> Result<(Money, String), DomainError> {
        let currency = Currency::parse(&self.currency)?;
        Ok((Money::new(self.amount, currency)?, self.transaction_id))
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct InitializeMarketRequestDto {
    pub selection_odds: HashMap<String, Decimal>,
    #[serde(default)]
    pub source: Option<SourceDto>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOddsRequestDto {
    pub updates: HashMap<String, OddsUpdateEntryDto>,
    #[serde(default)]
    pub source: Option<SourceDto>,
}

#[derive(Debug, Deserialize)]
pub struct OddsUpdateEntryDto {
    pub odds: Decimal,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDto {
    Manual,
    Feed,
    Provider,
}

impl From<SourceDto> for Source {
    fn from(value: SourceDto) -> Self {
        match value {
            SourceDto::Manual => Source::Manual,
            SourceDto::Feed => Source::Feed,
            SourceDto::Provider => Source::Provider,
        }
    }
}

pub fn source_or_manual(source: Option<SourceDto>) -> Source {
    source.map(Source::from).unwrap_or(Source::Manual)
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequestDto {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LockRequestDto {
    pub bet_id: String,
    pub selection_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BetIdRequestDto {
    pub bet_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VolatilityScoreQuery {
    #[serde(default = "default_window")]
    pub window_minutes: i64,
}

fn default_window() -> i64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventRequestDto {
    pub name: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMarketStatusRequestDto {
    pub status: MarketStatusDto,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatusDto {
    Open,
    Suspended,
    Closed,
    Settled,
}

impl From<MarketStatusDto> for crate::sport_event::MarketStatus {
    fn from(value: MarketStatusDto) -> Self {
        use crate::sport_event::MarketStatus::*;
        match value {
            MarketStatusDto::Open => Open,
            MarketStatusDto::Suspended => Suspended,
            MarketStatusDto::Closed => Closed,
            MarketStatusDto::Settled => Settled,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetMarketResultRequestDto {
    pub winning_outcome: String,
}
