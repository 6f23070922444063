//! Sportsbook platform backend: wallet, odds, bet, bet index, and sport
//! event actors behind an HTTP surface.

pub mod actor;
pub mod bet;
pub mod bet_index;
pub mod config;
pub mod error;
pub mod eventbus;
pub mod http;
pub mod ledger;
pub mod market_bet_index;
pub mod money;
pub mod odds;
pub mod runtime;
pub mod sport_event;
pub mod store;
pub mod wallet;
