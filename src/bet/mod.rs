//! Event-sourced bet actor (spec §4.4): the PlaceBet workflow, its state
//! machine, void/cashout, and settlement. Every mutating operation appends
//! to the bet's event stream in a single atomic write; on activation the
//! actor folds the stream into the in-memory `Bet` aggregate (spec §9:
//! "event-sourced persistence tied to a specific framework" → an abstract
//! `EventStore`).

pub mod events;
pub mod types;

use crate::actor::Mailbox;
use crate::error::{DomainError, DomainResult};
use crate::store::EventStore;
use crate::wallet::TransactionType;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

pub use events::{BetEvent, BetEventEnvelope, SettlementOutcome};
pub use types::{Bet, BetStatus, BetType, PlaceBetRequest};

/// Conservative default cashout pricing per spec §9's Open Question:
/// `payout = stake * discount_factor * (lockedDecimal / currentDecimal)`,
/// floored at `minimum_payout` so a wild odds swing never prices a cashout
/// at zero or negative.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CashoutConfig {
    pub discount_factor: Decimal,
    pub minimum_payout: Decimal,
}

impl Default for CashoutConfig {
    fn default() -> Self {
        CashoutConfig {
            discount_factor: Decimal::new(95, 2), // 0.95
            minimum_payout: Decimal::new(1, 2),   // 0.01
        }
    }
}

/// Dependencies injected at actor construction per spec §9's "grain factory"
/// redesign: typed handles the bet actor calls out through, resolved by the
/// runtime registries per request rather than obtained mid-operation. Traits
/// so tests can substitute fakes without spinning up real registries.
#[async_trait]
pub trait WalletLookup: Send + Sync {
    async fn client_for(&self, user_id: &str) -> crate::wallet::WalletClient;
}

#[async_trait]
pub trait OddsLookup: Send + Sync {
    async fn client_for(&self, market_id: &str) -> crate::odds::OddsClient;
}

#[async_trait]
pub trait BetIndexLookup: Send + Sync {
    async fn client_for(&self, user_id: &str) -> crate::bet_index::BetIndexClient;
}

/// Resolves a `BetClient` for an arbitrary betId. Used by the bet index
/// actor, which only stores ids and asks the owning bet actor for details.
#[async_trait]
pub trait BetLookup: Send + Sync {
    async fn client_for(&self, bet_id: &str) -> BetClient;
}

pub struct BetDeps {
    pub wallet: Arc<dyn WalletLookup>,
    pub odds: Arc<dyn OddsLookup>,
    pub bet_index: Arc<dyn BetIndexLookup>,
    /// Per-market bet registration so the sport event actor can enumerate
    /// accepted bets at settlement time without holding a handle back to
    /// this bet (spec §4.6's settlement dispatch).
    pub market_bets: Arc<dyn crate::market_bet_index::MarketBetIndexLookup>,
    pub cashout: CashoutConfig,
}

struct BetActorState {
    bet_id: String,
    events: Vec<BetEventEnvelope>,
    deps: Arc<BetDeps>,
}

impl BetActorState {
    fn aggregate(&self) -> Option<Bet> {
        events::fold(&self.bet_id, &self.events)
    }
}

#[derive(Debug, Clone)]
pub enum BetRequest {
    PlaceBet(PlaceBetRequest),
    GetBetDetails,
    GetBetHistory,
    VoidBet { reason: String },
    CashOut,
    ApplySettlement { outcome: SettlementOutcome },
}

#[derive(Debug, Clone)]
pub enum BetResponse {
    Result(DomainResult<Bet>),
    Maybe(Option<Bet>),
    History(Vec<Bet>),
}

pub type BetMailbox = Mailbox<BetRequest, BetResponse>;

#[derive(Clone)]
pub struct BetClient {
    mailbox: BetMailbox,
}

impl BetClient {
    pub fn new(mailbox: BetMailbox) -> Self {
        BetClient { mailbox }
    }

    async fn call(&self, request: BetRequest) -> DomainResult<BetResponse> {
        self.mailbox.call(request).await
    }

    pub async fn place_bet(&self, request: PlaceBetRequest) -> DomainResult<Bet> {
        match self.call(BetRequest::PlaceBet(request)).await? {
            BetResponse::Result(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn get_bet_details(&self) -> DomainResult<Option<Bet>> {
        match self.call(BetRequest::GetBetDetails).await? {
            BetResponse::Maybe(b) => Ok(b),
            _ => unreachable!(),
        }
    }

    pub async fn get_bet_history(&self) -> DomainResult<Vec<Bet>> {
        match self.call(BetRequest::GetBetHistory).await? {
            BetResponse::History(h) => Ok(h),
            _ => unreachable!(),
        }
    }

    pub async fn void_bet(&self, reason: String) -> DomainResult<Bet> {
        match self.call(BetRequest::VoidBet { reason }).await? {
            BetResponse::Result(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn cash_out(&self) -> DomainResult<Bet> {
        match self.call(BetRequest::CashOut).await? {
            BetResponse::Result(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn apply_settlement(&self, outcome: SettlementOutcome) -> DomainResult<Bet> {
        match self.call(BetRequest::ApplySettlement { outcome }).await? {
            BetResponse::Result(r) => r,
            _ => unreachable!(),
        }
    }
}

fn stream_key(bet_id: &str) -> String {
    format!("bet:{bet_id}")
}

/// Spawns a bet actor, replaying its event stream from `store` first (spec
/// §4.4: "on activation the actor reads the stream, folds events... and
/// serves operations").
pub async fn spawn_bet_actor_restoring(
    bet_id: String,
    deps: Arc<BetDeps>,
    store: Arc<dyn EventStore<BetEventEnvelope>>,
) -> BetMailbox {
    let key = stream_key(&bet_id);
    let events = store.read(&key).await.unwrap_or_default();
    let state = BetActorState { bet_id, events, deps };
    Mailbox::spawn(
        (state, store),
        move |(state, store): &mut (BetActorState, Arc<dyn EventStore<BetEventEnvelope>>), request| {
            let store = store.clone();
            Box::pin(handle_request(state, request, store))
        },
    )
}

async fn handle_request(
    state: &mut BetActorState,
    request: BetRequest,
    store: Arc<dyn EventStore<BetEventEnvelope>>,
) -> BetResponse {
    match request {
        BetRequest::PlaceBet(req) => BetResponse::Result(handle_place_bet(state, req, store).await),
        BetRequest::GetBetDetails => BetResponse::Maybe(state.aggregate()),
        BetRequest::GetBetHistory => BetResponse::History(events::history(&state.bet_id, &state.events)),
        BetRequest::VoidBet { reason } => BetResponse::Result(handle_void(state, reason, store).await),
        BetRequest::CashOut => BetResponse::Result(handle_cash_out(state, store).await),
        BetRequest::ApplySettlement { outcome } => {
            BetResponse::Result(handle_settlement(state, outcome, store).await)
        }
    }
}

async fn append(
    state: &mut BetActorState,
    store: &Arc<dyn EventStore<BetEventEnvelope>>,
    new_events: Vec<BetEventEnvelope>,
) -> DomainResult<()> {
    store.append(&stream_key(&state.bet_id), &new_events).await?;
    state.events.extend(new_events);
    Ok(())
}

fn validate_request(request: &PlaceBetRequest) -> DomainResult<()> {
    if request.user_id.trim().is_empty() {
        return Err(DomainError::InvalidRequest("userId is required".into()));
    }
    if request.market_id.trim().is_empty() {
        return Err(DomainError::InvalidRequest("marketId is required".into()));
    }
    if request.selection_id.trim().is_empty() {
        return Err(DomainError::InvalidRequest("selectionId is required".into()));
    }
    if !request.stake.is_positive() {
        return Err(DomainError::NonPositiveAmount);
    }
    if request.acceptable_odds < Decimal::new(101, 2) {
        return Err(DomainError::InvalidOdds);
    }
    Ok(())
}

async fn handle_place_bet(
    state: &mut BetActorState,
    request: PlaceBetRequest,
    store: Arc<dyn EventStore<BetEventEnvelope>>,
) -> DomainResult<Bet> {
    if !state.events.is_empty() {
        return Err(DomainError::AlreadyProcessed);
    }
    validate_request(&request)?;

    let wallet = state.deps.wallet.client_for(&request.user_id).await;
    let odds = state.deps.odds.client_for(&request.market_id).await;

    // Independent reads started together (spec §9: concurrent sub-calls for
    // independent reads, sequential for dependent ones).
    let (available, current_odds) = tokio::join!(wallet.available_balance(), odds.current_odds());
    let available = available?;
    let current_odds = current_odds?;

    if let Err(e) = (|| -> DomainResult<()> {
        if available.compare(&request.stake)?.is_lt() {
            return Err(DomainError::InsufficientBalance);
        }
        let current = current_odds
            .get(&request.selection_id)
            .ok_or_else(|| DomainError::UnknownSelection(request.selection_id.clone()))?;
        if *current < request.acceptable_odds {
            return Err(DomainError::OddsChanged {
                acceptable: request.acceptable_odds.to_string(),
                current: current.to_string(),
            });
        }
        Ok(())
    })() {
        return reject(state, &store, request, e).await;
    }

    if odds.is_suspended().await? {
        return reject(state, &store, request, DomainError::MarketSuspended).await;
    }

    let mut locked = false;
    let mut reserved = false;

    let outcome: DomainResult<Decimal> = async {
        odds.lock_for_bet(state.bet_id.clone(), request.selection_id.clone()).await?;
        locked = true;
        wallet.reserve(request.stake, state.bet_id.clone()).await.and_then(|r| {
            if r.success {
                Ok(())
            } else {
                Err(DomainError::InvalidRequest(r.error_message.unwrap_or_default()))
            }
        })?;
        reserved = true;
        let locked_value = odds.locked_odds_for_bet(state.bet_id.clone()).await?;
        Ok(locked_value.map(|v| v.decimal).unwrap_or(request.acceptable_odds))
    }
    .await;

    let final_odds = match outcome {
        Ok(odds_value) => odds_value,
        Err(e) => {
            if reserved {
                let _ = wallet.release_reservation(state.bet_id.clone()).await;
            }
            if locked {
                let _ = odds.unlock(state.bet_id.clone()).await;
            }
            return reject(state, &store, request, e).await;
        }
    };

    let potential_payout = request.stake.multiply(final_odds).unwrap_or(request.stake);

    let placed = BetEventEnvelope::new(state.bet_id.clone(), BetEvent::Placed { request: request.clone() });
    let accepted = BetEventEnvelope::new(
        state.bet_id.clone(),
        BetEvent::Accepted { final_odds, potential_payout },
    );
    if let Err(e) = append(state, &store, vec![placed, accepted]).await {
        let _ = wallet.release_reservation(state.bet_id.clone()).await;
        let _ = odds.unlock(state.bet_id.clone()).await;
        return Err(e);
    }

    if let Err(e) = wallet.commit_reservation(state.bet_id.clone()).await {
        warn!(bet_id = %state.bet_id, error = %e, "reservation commit failed after bet accepted");
    }
    let bet_index = state.deps.bet_index.client_for(&request.user_id).await;
    if let Err(e) = bet_index.add_bet(state.bet_id.clone()).await {
        warn!(bet_id = %state.bet_id, error = %e, "bet index registration failed after bet accepted");
    }
    let market_bets = state.deps.market_bets.client_for(&request.market_id).await;
    if let Err(e) = market_bets.register(state.bet_id.clone(), request.selection_id.clone()).await {
        warn!(bet_id = %state.bet_id, error = %e, "market bet registration failed after bet accepted");
    }

    debug!(bet_id = %state.bet_id, user_id = %request.user_id, "bet accepted");
    Ok(state.aggregate().expect("just appended"))
}

async fn reject(
    state: &mut BetActorState,
    store: &Arc<dyn EventStore<BetEventEnvelope>>,
    request: PlaceBetRequest,
    reason: DomainError,
) -> DomainResult<Bet> {
    let placed = BetEventEnvelope::new(state.bet_id.clone(), BetEvent::Placed { request });
    let rejected = BetEventEnvelope::new(state.bet_id.clone(), BetEvent::Rejected { reason: reason.to_string() });
    append(state, store, vec![placed, rejected]).await?;
    Err(reason)
}

async fn handle_void(
    state: &mut BetActorState,
    reason: String,
    store: Arc<dyn EventStore<BetEventEnvelope>>,
) -> DomainResult<Bet> {
    let Some(bet) = state.aggregate() else {
        return Err(DomainError::BetNotFound(state.bet_id.clone()));
    };
    if !matches!(bet.status, BetStatus::Pending | BetStatus::Accepted) {
        return Err(DomainError::CannotVoidInStatus(format!("{:?}", bet.status)));
    }

    let wallet = state.deps.wallet.client_for(&bet.user_id).await;
    let odds = state.deps.odds.client_for(&bet.market_id).await;

    if bet.status == BetStatus::Accepted {
        let refund_ref = format!("void-refund-{}", state.bet_id);
        if let Err(e) = wallet.credit_for_bet(bet.stake, refund_ref, TransactionType::BetRefund).await {
            return Err(e);
        }
    } else {
        // Pending without a committed reservation; release is a best-effort
        // no-op if none was ever created.
        let _ = wallet.release_reservation(state.bet_id.clone()).await;
    }
    let _ = odds.unlock(state.bet_id.clone()).await;

    let event = BetEventEnvelope::new(state.bet_id.clone(), BetEvent::Voided { reason });
    append(state, &store, vec![event]).await?;
    Ok(state.aggregate().expect("just appended"))
}

async fn handle_cash_out(
    state: &mut BetActorState,
    store: Arc<dyn EventStore<BetEventEnvelope>>,
) -> DomainResult<Bet> {
    let Some(bet) = state.aggregate() else {
        return Err(DomainError::BetNotFound(state.bet_id.clone()));
    };
    if bet.status != BetStatus::Accepted {
        return Err(DomainError::CannotCashOutInStatus(format!("{:?}", bet.status)));
    }
    let locked_decimal = bet.final_odds.unwrap_or(bet.acceptable_odds);

    let odds = state.deps.odds.client_for(&bet.market_id).await;
    let current_odds = odds.current_odds().await?;
    let current_decimal = current_odds.get(&bet.selection_id).copied().unwrap_or(locked_decimal);

    let config = state.deps.cashout;
    let ratio = locked_decimal / current_decimal;
    let raw_payout = bet.stake.amount() * config.discount_factor * ratio;
    let payout_amount = raw_payout.max(config.minimum_payout);
    let payout = crate::money::Money::new(payout_amount, bet.stake.currency())?;

    let wallet = state.deps.wallet.client_for(&bet.user_id).await;
    let result = wallet.deposit(payout, format!("cashout-{}", state.bet_id)).await?;
    if !result.success {
        return Err(DomainError::WalletDepositFailed(result.error_message.unwrap_or_default()));
    }

    let event = BetEventEnvelope::new(state.bet_id.clone(), BetEvent::CashedOut { payout });
    append(state, &store, vec![event]).await?;
    let _ = odds.unlock(state.bet_id.clone()).await;
    Ok(state.aggregate().expect("just appended"))
}

async fn handle_settlement(
    state: &mut BetActorState,
    outcome: SettlementOutcome,
    store: Arc<dyn EventStore<BetEventEnvelope>>,
) -> DomainResult<Bet> {
    let Some(bet) = state.aggregate() else {
        return Err(DomainError::BetNotFound(state.bet_id.clone()));
    };
    if bet.status != BetStatus::Accepted {
        // Already settled/voided/cashed out elsewhere; nothing to do,
        // satisfies B2 (terminal status reached at most once).
        return Ok(bet);
    }

    let payout = match outcome {
        SettlementOutcome::Won => {
            let final_odds = bet.final_odds.unwrap_or(bet.acceptable_odds);
            let amount = bet.stake.multiply(final_odds)?;
            let wallet = state.deps.wallet.client_for(&bet.user_id).await;
            let result = wallet
                .credit_for_bet(amount, format!("settlement-{}", state.bet_id), TransactionType::BetWin)
                .await?;
            if !result.success {
                return Err(DomainError::WalletDepositFailed(result.error_message.unwrap_or_default()));
            }
            Some(amount)
        }
        SettlementOutcome::Lost => None,
    };

    let event = BetEventEnvelope::new(state.bet_id.clone(), BetEvent::Settled { outcome, payout });
    append(state, &store, vec![event]).await?;

    let odds = state.deps.odds.client_for(&bet.market_id).await;
    let _ = odds.unlock(state.bet_id.clone()).await;

    Ok(state.aggregate().expect("just appended"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bet_index::{spawn_bet_index_actor, BetIndexClient};
    use crate::money::{Currency, Money};
    use crate::odds::{spawn_odds_actor, OddsClient, Source, VolatilityConfig};
    use crate::store::{InMemoryEventStore, InMemoryStateStore};
    use crate::wallet::{spawn_wallet_actor, WalletClient};
    use dashmap::DashMap;
    use std::collections::HashMap;

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

    struct FakeMarketBetIndexLookup(DashMap<String, crate::market_bet_index::MarketBetIndexClient>);
    #[async_trait]
    impl crate::market_bet_index::MarketBetIndexLookup for FakeMarketBetIndexLookup {
        async fn client_for(&self, market_id: &str) -> crate::market_bet_index::MarketBetIndexClient {
            self.0
                .entry(market_id.to_string())
                .or_insert_with(|| {
                    crate::market_bet_index::MarketBetIndexClient::new(
                        crate::market_bet_index::spawn_market_bet_index_actor(market_id.to_string(), InMemoryStateStore::new()),
                    )
                })
                .clone()
        }
    }

    fn usd(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), Currency::USD).unwrap()
    }

    async fn harness() -> (Arc<BetDeps>, WalletClient, OddsClient) {
        let wallet_lookup = Arc::new(FakeWalletLookup(DashMap::new()));
        let odds_lookup = Arc::new(FakeOddsLookup(DashMap::new()));
        let bet_index_lookup = Arc::new(FakeBetIndexLookup(DashMap::new()));
        let market_bets_lookup = Arc::new(FakeMarketBetIndexLookup(DashMap::new()));

        let wallet = wallet_lookup.client_for("u1").await;
        let odds = odds_lookup.client_for("m1").await;
        let mut selections = HashMap::new();
        selections.insert("home".to_string(), Decimal::new(210, 2));
        odds.initialize_market(selections, Source::Manual).await.unwrap();

        let deps = Arc::new(BetDeps {
            wallet: wallet_lookup,
            odds: odds_lookup,
            bet_index: bet_index_lookup,
            market_bets: market_bets_lookup,
            cashout: CashoutConfig::default(),
        });
        (deps, wallet, odds)
    }

    fn place_request() -> PlaceBetRequest {
        PlaceBetRequest {
            user_id: "u1".into(),
            event_id: "e1".into(),
            market_id: "m1".into(),
            selection_id: "home".into(),
            stake: usd(10000),
            acceptable_odds: Decimal::new(210, 2),
        }
    }

    #[tokio::test]
    async fn happy_path_scenario_1() {
        let (deps, wallet, _odds) = harness().await;
        wallet.deposit(usd(100000), "d1".into()).await.unwrap();

        let store = InMemoryEventStore::new();
        let mailbox = spawn_bet_actor_restoring("b1".into(), deps, store).await;
        let client = BetClient::new(mailbox);

        let bet = client.place_bet(place_request()).await.unwrap();
        assert_eq!(bet.status, BetStatus::Accepted);
        assert_eq!(bet.payout.unwrap(), usd(21000));
        assert_eq!(wallet.available_balance().await.unwrap(), usd(90000));

        let settled = client.apply_settlement(SettlementOutcome::Won).await.unwrap();
        assert_eq!(settled.status, BetStatus::Won);
        assert_eq!(wallet.balance().await.unwrap(), usd(111000));
        assert_eq!(wallet.available_balance().await.unwrap(), usd(111000));
    }

    #[tokio::test]
    async fn insufficient_balance_scenario_2() {
        let (deps, wallet, _odds) = harness().await;
        wallet.deposit(usd(5000), "d1".into()).await.unwrap();

        let store = InMemoryEventStore::new();
        let mailbox = spawn_bet_actor_restoring("b2".into(), deps, store).await;
        let client = BetClient::new(mailbox);

        let err = client.place_bet(place_request()).await.unwrap_err();
        assert_eq!(err, DomainError::InsufficientBalance);
        assert_eq!(wallet.balance().await.unwrap(), usd(5000));
    }

    #[tokio::test]
    async fn odds_changed_scenario_3() {
        let (deps, wallet, _odds) = harness().await;
        wallet.deposit(usd(50000), "d1".into()).await.unwrap();

        let store = InMemoryEventStore::new();
        let mailbox = spawn_bet_actor_restoring("b3".into(), deps, store).await;
        let client = BetClient::new(mailbox);

        let mut req = place_request();
        req.acceptable_odds = Decimal::new(250, 2);
        let err = client.place_bet(req).await.unwrap_err();
        match err {
            DomainError::OddsChanged { .. } => {}
            other => panic!("expected OddsChanged, got {other:?}"),
        }
        assert_eq!(wallet.available_balance().await.unwrap(), usd(50000));
    }

    #[tokio::test]
    async fn void_then_cashout_scenario_5() {
        let (deps, wallet, _odds) = harness().await;
        wallet.deposit(usd(100000), "d1".into()).await.unwrap();

        let store = InMemoryEventStore::new();
        let mailbox = spawn_bet_actor_restoring("b5".into(), deps, store).await;
        let client = BetClient::new(mailbox);
        client.place_bet(place_request()).await.unwrap();

        let voided = client.void_bet("Event cancelled".into()).await.unwrap();
        assert_eq!(voided.status, BetStatus::Void);
        assert_eq!(wallet.balance().await.unwrap(), usd(100000));

        let err = client.cash_out().await.unwrap_err();
        assert_eq!(err, DomainError::CannotCashOutInStatus("Void".into()));
    }

    #[tokio::test]
    async fn place_bet_twice_is_already_processed() {
        let (deps, wallet, _odds) = harness().await;
        wallet.deposit(usd(100000), "d1".into()).await.unwrap();

        let store = InMemoryEventStore::new();
        let mailbox = spawn_bet_actor_restoring("b6".into(), deps, store).await;
        let client = BetClient::new(mailbox);
        client.place_bet(place_request()).await.unwrap();
        let err = client.place_bet(place_request()).await.unwrap_err();
        assert_eq!(err, DomainError::AlreadyProcessed);
    }
}
