//! Per-market registry of accepted bets (supplemental: spec §4.6's settlement
//! dispatch needs to enumerate "every market's accepted bets", which requires
//! somewhere to have recorded which bets reference which selection of which
//! market - not an explicitly named actor in spec §3/§4, but required to make
//! `CompleteEvent`'s "(betId, outcome) pairs" dispatch literal rather than
//! hand-waved). Write-only from the bet actor on acceptance, read-only from
//! the sport event actor during settlement - kept as its own mailbox so
//! neither the bet actor nor the sport event actor need a handle to the
//! other, avoiding a dependency cycle between their registries.

use crate::actor::Mailbox;
use crate::error::DomainResult;
use crate::store::StateStore;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MarketBetIndexState {
    market_id: String,
    entries: Vec<(String, String)>, // (betId, selectionId)
}

impl MarketBetIndexState {
    fn new(market_id: String) -> Self {
        MarketBetIndexState { market_id, entries: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub enum MarketBetIndexRequest {
    Register { bet_id: String, selection_id: String },
    GetEntries,
}

#[derive(Debug, Clone)]
pub enum MarketBetIndexResponse {
    Registered,
    Entries(Vec<(String, String)>),
}

pub type MarketBetIndexMailbox = Mailbox<MarketBetIndexRequest, MarketBetIndexResponse>;

#[derive(Clone)]
pub struct MarketBetIndexClient {
    mailbox: MarketBetIndexMailbox,
}

impl MarketBetIndexClient {
    pub fn new(mailbox: MarketBetIndexMailbox) -> Self {
        MarketBetIndexClient { mailbox }
    }

    pub async fn register(&self, bet_id: String, selection_id: String) -> DomainResult<()> {
        self.mailbox
            .call(MarketBetIndexRequest::Register { bet_id, selection_id })
            .await
            .map(|_| ())
    }

    pub async fn entries(&self) -> DomainResult<Vec<(String, String)>> {
        match self.mailbox.call(MarketBetIndexRequest::GetEntries).await? {
            MarketBetIndexResponse::Entries(e) => Ok(e),
            _ => unreachable!(),
        }
    }
}

#[async_trait]
pub trait MarketBetIndexLookup: Send + Sync {
    async fn client_for(&self, market_id: &str) -> MarketBetIndexClient;
}

pub fn spawn_market_bet_index_actor(
    market_id: String,
    store: Arc<dyn StateStore<MarketBetIndexState>>,
) -> MarketBetIndexMailbox {
    let snapshot_key = format!("market_bet_index:{market_id}");
    Mailbox::spawn(
        (MarketBetIndexState::new(market_id), store, snapshot_key),
        move |(state, store, key): &mut (MarketBetIndexState, Arc<dyn StateStore<MarketBetIndexState>>, String),
              request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

pub async fn spawn_market_bet_index_actor_restoring(
    market_id: String,
    store: Arc<dyn StateStore<MarketBetIndexState>>,
) -> MarketBetIndexMailbox {
    let snapshot_key = format!("market_bet_index:{market_id}");
    let initial = match store.get(&snapshot_key).await {
        Ok(Some(state)) => state,
        _ => MarketBetIndexState::new(market_id),
    };
    Mailbox::spawn(
        (initial, store, snapshot_key),
        move |(state, store, key): &mut (MarketBetIndexState, Arc<dyn StateStore<MarketBetIndexState>>, String),
              request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

async fn handle_request(
    state: &mut MarketBetIndexState,
    request: MarketBetIndexRequest,
    store: Arc<dyn StateStore<MarketBetIndexState>>,
    key: String,
) -> MarketBetIndexResponse {
    match request {
        MarketBetIndexRequest::Register { bet_id, selection_id } => {
            if !state.entries.iter().any(|(b, _)| b == &bet_id) {
                state.entries.push((bet_id, selection_id));
                let _ = store.put(&key, state).await;
            }
            MarketBetIndexResponse::Registered
        }
        MarketBetIndexRequest::GetEntries => MarketBetIndexResponse::Entries(state.entries.clone()),
    }
}
