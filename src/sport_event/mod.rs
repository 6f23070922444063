//! Sport event actor (spec §4.6): event and market lifecycle plus the
//! settlement dispatch that drives `CompleteEvent` fan-out to individual
//! bets. Per-eventId, same mailbox-actor shape as the other actors.

pub mod types;

use crate::actor::Mailbox;
use crate::bet::{BetLookup, SettlementOutcome};
use crate::error::{DomainError, DomainResult};
use crate::market_bet_index::MarketBetIndexLookup;
use crate::store::StateStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use types::{AddMarketRequest, CreateEventRequest, EventStatus, Market, MarketStatus, SettlementDispatchResult, SportEvent};

pub struct SportEventDeps {
    pub bets: Arc<dyn BetLookup>,
    pub market_bets: Arc<dyn MarketBetIndexLookup>,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SportEventState {
    event: Option<SportEvent>,
    markets: HashMap<String, Market>,
}

#[derive(Clone)]
pub enum SportEventRequest {
    CreateEvent(CreateEventRequest),
    UpdateEvent { name: Option<String>, start_time: Option<chrono::DateTime<Utc>> },
    StartEvent,
    CompleteEvent,
    CancelEvent,
    AddMarket(AddMarketRequest),
    UpdateMarketStatus { market_id: String, status: MarketStatus },
    SetMarketResult { market_id: String, winning_outcome: String },
    GetEvent,
    GetMarkets,
}

pub enum SportEventResponse {
    Event(DomainResult<SportEvent>),
    Market(DomainResult<Market>),
    Markets(Vec<Market>),
    MaybeEvent(Option<SportEvent>),
    Settlement(DomainResult<Vec<SettlementDispatchResult>>),
}

pub type SportEventMailbox = Mailbox<SportEventRequest, SportEventResponse>;

#[derive(Clone)]
pub struct SportEventClient {
    mailbox: SportEventMailbox,
}

impl SportEventClient {
    pub fn new(mailbox: SportEventMailbox) -> Self {
        SportEventClient { mailbox }
    }

    async fn call(&self, request: SportEventRequest) -> DomainResult<SportEventResponse> {
        self.mailbox.call(request).await
    }

    pub async fn create_event(&self, request: CreateEventRequest) -> DomainResult<SportEvent> {
        match self.call(SportEventRequest::CreateEvent(request)).await? {
            SportEventResponse::Event(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn update_event(
        &self,
        name: Option<String>,
        start_time: Option<chrono::DateTime<Utc>>,
    ) -> DomainResult<SportEvent> {
        match self.call(SportEventRequest::UpdateEvent { name, start_time }).await? {
            SportEventResponse::Event(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn start_event(&self) -> DomainResult<SportEvent> {
        match self.call(SportEventRequest::StartEvent).await? {
            SportEventResponse::Event(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn cancel_event(&self) -> DomainResult<SportEvent> {
        match self.call(SportEventRequest::CancelEvent).await? {
            SportEventResponse::Event(r) => r,
            _ => unreachable!(),
        }
    }

    /// Transitions the event to Completed and drives settlement of every
    /// accepted bet across every settled market, one bet at a time.
    pub async fn complete_event(&self) -> DomainResult<Vec<SettlementDispatchResult>> {
        match self.call(SportEventRequest::CompleteEvent).await? {
            SportEventResponse::Settlement(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn add_market(&self, request: AddMarketRequest) -> DomainResult<Market> {
        match self.call(SportEventRequest::AddMarket(request)).await? {
            SportEventResponse::Market(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn update_market_status(&self, market_id: String, status: MarketStatus) -> DomainResult<Market> {
        match self.call(SportEventRequest::UpdateMarketStatus { market_id, status }).await? {
            SportEventResponse::Market(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn set_market_result(&self, market_id: String, winning_outcome: String) -> DomainResult<Market> {
        match self.call(SportEventRequest::SetMarketResult { market_id, winning_outcome }).await? {
            SportEventResponse::Market(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn get_event(&self) -> DomainResult<Option<SportEvent>> {
        match self.call(SportEventRequest::GetEvent).await? {
            SportEventResponse::MaybeEvent(e) => Ok(e),
            _ => unreachable!(),
        }
    }

    pub async fn get_markets(&self) -> DomainResult<Vec<Market>> {
        match self.call(SportEventRequest::GetMarkets).await? {
            SportEventResponse::Markets(m) => Ok(m),
            _ => unreachable!(),
        }
    }
}

fn snapshot_key(event_id: &str) -> String {
    format!("sport_event:{event_id}")
}

pub async fn spawn_sport_event_actor_restoring(
    event_id: String,
    deps: Arc<SportEventDeps>,
    store: Arc<dyn StateStore<SportEventState>>,
) -> SportEventMailbox {
    let key = snapshot_key(&event_id);
    let initial = match store.get(&key).await {
        Ok(Some(state)) => state,
        _ => SportEventState::default(),
    };
    Mailbox::spawn(
        (event_id, initial, deps, store),
        move |(event_id, state, deps, store): &mut (
            String,
            SportEventState,
            Arc<SportEventDeps>,
            Arc<dyn StateStore<SportEventState>>,
        ),
              request| {
            let deps = deps.clone();
            let store = store.clone();
            let event_id = event_id.clone();
            Box::pin(handle_request(event_id, state, request, deps, store))
        },
    )
}

async fn persist(store: &Arc<dyn StateStore<SportEventState>>, event_id: &str, state: &SportEventState) {
    if let Err(e) = store.put(&snapshot_key(event_id), state).await {
        warn!(event_id = %event_id, error = %e, "sport event persistence failed");
    }
}

async fn handle_request(
    event_id: String,
    state: &mut SportEventState,
    request: SportEventRequest,
    deps: Arc<SportEventDeps>,
    store: Arc<dyn StateStore<SportEventState>>,
) -> SportEventResponse {
    match request {
        SportEventRequest::CreateEvent(req) => {
            let result = handle_create(&event_id, state, req).await;
            if result.is_ok() {
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Event(result)
        }
        SportEventRequest::UpdateEvent { name, start_time } => {
            let result = handle_update(state, name, start_time);
            if result.is_ok() {
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Event(result)
        }
        SportEventRequest::StartEvent => {
            let result = transition_event(state, EventStatus::Live);
            if result.is_ok() {
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Event(result)
        }
        SportEventRequest::CancelEvent => {
            let result = transition_event(state, EventStatus::Cancelled);
            if result.is_ok() {
                suspend_open_markets(state);
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Event(result)
        }
        SportEventRequest::CompleteEvent => {
            let result = handle_complete(&event_id, state, &deps).await;
            persist(&store, &event_id, state).await;
            SportEventResponse::Settlement(result)
        }
        SportEventRequest::AddMarket(req) => {
            let result = handle_add_market(&event_id, state, req);
            if result.is_ok() {
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Market(result)
        }
        SportEventRequest::UpdateMarketStatus { market_id, status } => {
            let result = handle_update_market_status(state, &market_id, status);
            if result.is_ok() {
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Market(result)
        }
        SportEventRequest::SetMarketResult { market_id, winning_outcome } => {
            let result = handle_set_market_result(state, &market_id, winning_outcome);
            if result.is_ok() {
                persist(&store, &event_id, state).await;
            }
            SportEventResponse::Market(result)
        }
        SportEventRequest::GetEvent => SportEventResponse::MaybeEvent(state.event.clone()),
        SportEventRequest::GetMarkets => {
            SportEventResponse::Markets(state.markets.values().cloned().collect())
        }
    }
}

async fn handle_create(event_id: &str, state: &mut SportEventState, req: CreateEventRequest) -> DomainResult<SportEvent> {
    if state.event.is_some() {
        return Err(DomainError::AlreadyExists);
    }
    let now = Utc::now();
    if req.start_time <= now {
        return Err(DomainError::InvalidRequest("startTime must be strictly in the future".into()));
    }
    let event = SportEvent {
        event_id: event_id.to_string(),
        name: req.name,
        sport_type: req.sport_type,
        competition: req.competition,
        start_time: req.start_time,
        end_time: None,
        status: EventStatus::Scheduled,
        participants: req.participants,
        created_at: now,
        last_modified: now,
    };
    state.event = Some(event.clone());
    Ok(event)
}

fn handle_update(
    state: &mut SportEventState,
    name: Option<String>,
    start_time: Option<chrono::DateTime<Utc>>,
) -> DomainResult<SportEvent> {
    let event = state.event.as_mut().ok_or_else(|| DomainError::EventNotFound("unknown".into()))?;
    if event.status != EventStatus::Scheduled {
        return Err(DomainError::CannotUpdateInStatus(format!("{:?}", event.status)));
    }
    if let Some(name) = name {
        event.name = name;
    }
    if let Some(start_time) = start_time {
        event.start_time = start_time;
    }
    event.last_modified = Utc::now();
    Ok(event.clone())
}

fn transition_event(state: &mut SportEventState, next: EventStatus) -> DomainResult<SportEvent> {
    let event = state.event.as_mut().ok_or_else(|| DomainError::EventNotFound("unknown".into()))?;
    if !event.status.can_transition_to(next) {
        return Err(DomainError::InvalidTransition { from: format!("{:?}", event.status), to: format!("{next:?}") });
    }
    event.status = next;
    event.last_modified = Utc::now();
    if next == EventStatus::Completed {
        event.end_time = Some(event.last_modified);
    }
    Ok(event.clone())
}

fn handle_add_market(event_id: &str, state: &mut SportEventState, req: AddMarketRequest) -> DomainResult<Market> {
    if state.event.is_none() {
        return Err(DomainError::EventNotFound(event_id.to_string()));
    }
    let market_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let market = Market {
        market_id: market_id.clone(),
        event_id: event_id.to_string(),
        name: req.name,
        description: req.description,
        outcomes: req.outcomes,
        status: MarketStatus::Open,
        winning_outcome: None,
        created_at: now,
        last_modified: now,
    };
    state.markets.insert(market_id, market.clone());
    Ok(market)
}

fn handle_update_market_status(state: &mut SportEventState, market_id: &str, next: MarketStatus) -> DomainResult<Market> {
    let market = state.markets.get_mut(market_id).ok_or_else(|| DomainError::MarketNotFound(market_id.to_string()))?;
    if !market.status.can_transition_to(next) {
        return Err(DomainError::InvalidTransition { from: format!("{:?}", market.status), to: format!("{next:?}") });
    }
    market.status = next;
    market.last_modified = Utc::now();
    Ok(market.clone())
}

fn handle_set_market_result(state: &mut SportEventState, market_id: &str, winning_outcome: String) -> DomainResult<Market> {
    let market = state.markets.get_mut(market_id).ok_or_else(|| DomainError::MarketNotFound(market_id.to_string()))?;
    if market.status != MarketStatus::Closed {
        return Err(DomainError::CannotSetResultInStatus(format!("{:?}", market.status)));
    }
    if !market.outcomes.contains(&winning_outcome) {
        return Err(DomainError::UnknownSelection(winning_outcome));
    }
    market.winning_outcome = Some(winning_outcome);
    market.status = MarketStatus::Settled;
    market.last_modified = Utc::now();
    Ok(market.clone())
}

/// Drives every still-`Open` market to `Suspended`, called before an event's
/// completion or cancellation is persisted (spec §4.6).
fn suspend_open_markets(state: &mut SportEventState) {
    let now = Utc::now();
    for market in state.markets.values_mut() {
        if market.status == MarketStatus::Open {
            market.status = MarketStatus::Suspended;
            market.last_modified = now;
        }
    }
}

/// `CompleteEvent`'s settlement dispatch: for every market carrying a
/// `winning_outcome`, look up its accepted bets in the market bet index and
/// drive each through the bet actor one at a time, recording per-bet
/// failures without aborting the batch.
async fn handle_complete(
    event_id: &str,
    state: &mut SportEventState,
    deps: &Arc<SportEventDeps>,
) -> DomainResult<Vec<SettlementDispatchResult>> {
    transition_event(state, EventStatus::Completed)?;
    suspend_open_markets(state);

    let mut results = Vec::new();
    let market_ids: Vec<String> = state.markets.keys().cloned().collect();
    for market_id in market_ids {
        let Some(market) = state.markets.get(&market_id) else { continue };
        let Some(winning_outcome) = market.winning_outcome.clone() else {
            debug!(event_id = %event_id, market_id = %market_id, "market has no result at completion, skipping");
            continue;
        };

        let market_bets = deps.market_bets.client_for(&market_id).await;
        let entries = match market_bets.entries().await {
            Ok(e) => e,
            Err(e) => {
                warn!(event_id = %event_id, market_id = %market_id, error = %e, "failed to read market bet index during settlement");
                continue;
            }
        };

        for (bet_id, selection_id) in entries {
            let outcome =
                if selection_id == winning_outcome { SettlementOutcome::Won } else { SettlementOutcome::Lost };
            let client = deps.bets.client_for(&bet_id).await;
            match client.apply_settlement(outcome).await {
                Ok(_) => results.push(SettlementDispatchResult { bet_id, outcome, applied: true, error: None }),
                Err(e) => {
                    warn!(event_id = %event_id, bet_id = %bet_id, error = %e, "bet settlement failed during event completion");
                    results.push(SettlementDispatchResult {
                        bet_id,
                        outcome,
                        applied: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bet::{spawn_bet_actor_restoring, BetClient, BetDeps, BetIndexLookup, CashoutConfig, OddsLookup, PlaceBetRequest, WalletLookup};
    use crate::bet_index::{spawn_bet_index_actor, BetIndexClient};
    use crate::market_bet_index::{spawn_market_bet_index_actor, MarketBetIndexClient};
    use crate::money::{Currency, Money};
    use crate::odds::{spawn_odds_actor, OddsClient, Source, VolatilityConfig};
    use crate::store::{InMemoryEventStore, InMemoryStateStore};
    use crate::wallet::{spawn_wallet_actor, WalletClient};
    use async_trait::async_trait;
    use dashmap::DashMap;
    use rust_decimal::Decimal;
    use std::collections::HashMap as StdHashMap;

    struct FakeWalletLookup(DashMap<String, WalletClient>);
    #[async_trait]
    impl WalletLookup for FakeWalletLookup {
        async fn client_for(&self, user_id: &str) -> WalletClient {
            self.0
                .entry(user_id.to_string())
                .or_insert_with(|| WalletClient::new(spawn_wallet_actor(user_id.to_string(), Currency::USD, InMemoryStateStore::new())))
                .clone()
        }
    }

    struct FakeOddsLookup(DashMap<String, OddsClient>);
    #[async_trait]
    impl OddsLookup for FakeOddsLookup {
        async fn client_for(&self, market_id: &str) -> OddsClient {
            self.0
                .entry(market_id.to_string())
                .or_insert_with(|| OddsClient::new(spawn_odds_actor(market_id.to_string(), VolatilityConfig::default(), InMemoryStateStore::new())))
                .clone()
        }
    }

    struct FakeBetIndexLookup(DashMap<String, BetIndexClient>);
    #[async_trait]
    impl BetIndexLookup for FakeBetIndexLookup {
        async fn client_for(&self, user_id: &str) -> BetIndexClient {
            self.0
                .entry(user_id.to_string())
                .or_insert_with(|| BetIndexClient::new(spawn_bet_index_actor(user_id.to_string(), InMemoryStateStore::new())))
                .clone()
        }
    }

    struct FakeMarketBetIndexLookup(DashMap<String, MarketBetIndexClient>);
    #[async_trait]
    impl MarketBetIndexLookup for FakeMarketBetIndexLookup {
        async fn client_for(&self, market_id: &str) -> MarketBetIndexClient {
            self.0
                .entry(market_id.to_string())
                .or_insert_with(|| MarketBetIndexClient::new(spawn_market_bet_index_actor(market_id.to_string(), InMemoryStateStore::new())))
                .clone()
        }
    }

    struct FakeBetLookup {
        map: DashMap<String, BetClient>,
        deps: Arc<BetDeps>,
        store: Arc<dyn crate::store::EventStore<crate::bet::BetEventEnvelope>>,
    }
    #[async_trait]
    impl BetLookup for FakeBetLookup {
        async fn client_for(&self, bet_id: &str) -> BetClient {
            if let Some(existing) = self.map.get(bet_id) {
                return existing.clone();
            }
            let mailbox = spawn_bet_actor_restoring(bet_id.to_string(), self.deps.clone(), self.store.clone()).await;
            let client = BetClient::new(mailbox);
            self.map.entry(bet_id.to_string()).or_insert(client).clone()
        }
    }

    fn usd(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), Currency::USD).unwrap()
    }

    #[tokio::test]
    async fn complete_event_settles_accepted_bets_e1() {
        let wallet_lookup = Arc::new(FakeWalletLookup(DashMap::new()));
        let odds_lookup = Arc::new(FakeOddsLookup(DashMap::new()));
        let bet_index_lookup = Arc::new(FakeBetIndexLookup(DashMap::new()));
        let market_bets_lookup = Arc::new(FakeMarketBetIndexLookup(DashMap::new()));

        let wallet = wallet_lookup.client_for("u1").await;
        wallet.deposit(usd(100000), "d1".into()).await.unwrap();

        let bet_deps = Arc::new(BetDeps {
            wallet: wallet_lookup,
            odds: odds_lookup.clone(),
            bet_index: bet_index_lookup,
            market_bets: market_bets_lookup.clone(),
            cashout: CashoutConfig::default(),
        });
        let bet_store: Arc<dyn crate::store::EventStore<crate::bet::BetEventEnvelope>> = InMemoryEventStore::new();
        let bet_lookup = Arc::new(FakeBetLookup { map: DashMap::new(), deps: bet_deps, store: bet_store });

        let deps = Arc::new(SportEventDeps { bets: bet_lookup.clone(), market_bets: market_bets_lookup });
        let store = InMemoryStateStore::new();
        let mailbox = spawn_sport_event_actor_restoring("e1".into(), deps, store).await;
        let client = SportEventClient::new(mailbox);

        client
            .create_event(CreateEventRequest {
                name: "Derby".into(),
                sport_type: "Football".into(),
                competition: "League".into(),
                start_time: Utc::now() + chrono::Duration::hours(1),
                participants: vec![("home".into(), "Home".into()), ("away".into(), "Away".into())],
            })
            .await
            .unwrap();
        let market = client
            .add_market(AddMarketRequest {
                name: "Match Winner".into(),
                description: "90 minute result".into(),
                outcomes: vec!["home".into(), "away".into()],
            })
            .await
            .unwrap();

        let odds = odds_lookup.client_for(&market.market_id).await;
        let mut selections = StdHashMap::new();
        selections.insert("home".to_string(), Decimal::new(210, 2));
        selections.insert("away".to_string(), Decimal::new(350, 2));
        odds.initialize_market(selections, Source::Manual).await.unwrap();

        let bet_client = bet_lookup.client_for("b1").await;
        bet_client
            .place_bet(PlaceBetRequest {
                user_id: "u1".into(),
                event_id: "e1".into(),
                market_id: market.market_id.clone(),
                selection_id: "home".into(),
                stake: usd(10000),
                acceptable_odds: Decimal::new(210, 2),
            })
            .await
            .unwrap();

        client.start_event().await.unwrap();
        client.update_market_status(market.market_id.clone(), MarketStatus::Closed).await.unwrap();
        client.set_market_result(market.market_id.clone(), "home".into()).await.unwrap();

        let results = client.complete_event().await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].applied);
        assert_eq!(results[0].outcome, SettlementOutcome::Won);

        let settled = bet_lookup.client_for("b1").await.get_bet_details().await.unwrap().unwrap();
        assert_eq!(settled.status, crate::bet::BetStatus::Won);
        assert_eq!(wallet.balance().await.unwrap(), usd(111000));

        let event = client.get_event().await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Completed);
    }

    #[tokio::test]
    async fn invalid_transition_rejected() {
        let deps = Arc::new(SportEventDeps {
            bets: Arc::new(FakeBetLookup {
                map: DashMap::new(),
                deps: Arc::new(BetDeps {
                    wallet: Arc::new(FakeWalletLookup(DashMap::new())),
                    odds: Arc::new(FakeOddsLookup(DashMap::new())),
                    bet_index: Arc::new(FakeBetIndexLookup(DashMap::new())),
                    market_bets: Arc::new(FakeMarketBetIndexLookup(DashMap::new())),
                    cashout: CashoutConfig::default(),
                }),
                store: InMemoryEventStore::new(),
            }),
            market_bets: Arc::new(FakeMarketBetIndexLookup(DashMap::new())),
        });
        let store = InMemoryStateStore::new();
        let mailbox = spawn_sport_event_actor_restoring("e2".into(), deps, store).await;
        let client = SportEventClient::new(mailbox);
        client
            .create_event(CreateEventRequest {
                name: "Friendly".into(),
                sport_type: "Football".into(),
                competition: "Cup".into(),
                start_time: Utc::now() + chrono::Duration::hours(1),
                participants: vec![],
            })
            .await
            .unwrap();
        let err = client.complete_event().await.unwrap_err();
        match err {
            DomainError::InvalidTransition { .. } => {}
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }
}
