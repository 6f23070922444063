//! Odds actor (spec §4.3): current snapshot, per-selection history,
//! per-bet odds locking, suspension and auto-suspension on volatility.

pub mod types;
pub mod volatility;

use crate::actor::Mailbox;
use crate::error::{DomainError, DomainResult};
use crate::store::StateStore;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub use types::{OddsHistory, OddsSnapshot, OddsUpdate, OddsValue, Source};
pub use volatility::{VolatilityConfig, VolatilityLevel};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OddsState {
    market_id: String,
    initialized: bool,
    suspended: bool,
    suspension_reason: Option<String>,
    histories: HashMap<String, OddsHistory>,
    /// selectionId -> set of betIds that locked it.
    locks: HashMap<String, HashSet<String>>,
    /// betId -> (selectionId, odds value at lock time).
    bet_locks: HashMap<String, (String, OddsValue)>,
    volatility: VolatilityLevel,
    config: VolatilityConfig,
}

impl OddsState {
    fn new(market_id: String, config: VolatilityConfig) -> Self {
        OddsState {
            market_id,
            initialized: false,
            suspended: false,
            suspension_reason: None,
            histories: HashMap::new(),
            locks: HashMap::new(),
            bet_locks: HashMap::new(),
            volatility: VolatilityLevel::Low,
            config,
        }
    }

    fn snapshot(&self) -> OddsSnapshot {
        OddsSnapshot {
            market_id: self.market_id.clone(),
            odds: self
                .histories
                .iter()
                .map(|(selection, history)| (selection.clone(), history.current_odds()))
                .collect(),
            suspended: self.suspended,
            suspension_reason: self.suspension_reason.clone(),
            volatility: self.volatility,
            timestamp: chrono::Utc::now(),
        }
    }

    fn recompute_volatility(&mut self, now: chrono::DateTime<chrono::Utc>) {
        let window = self.config.window_minutes;
        let max_score = self
            .histories
            .values()
            .map(|h| volatility::score(&h.updates, now, window))
            .fold(0.0_f64, f64::max);
        self.volatility = self.config.level_for_score(max_score);
        if self.volatility == VolatilityLevel::Extreme && !self.suspended {
            self.suspended = true;
            self.suspension_reason = Some("auto:volatility".to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub enum OddsRequest {
    InitializeMarket { selection_odds: HashMap<String, Decimal>, source: Source },
    UpdateOdds { updates: HashMap<String, (Decimal, Option<String>)>, source: Source },
    SuspendOdds { reason: String },
    ResumeOdds { reason: String },
    LockOddsForBet { bet_id: String, selection_id: String },
    UnlockOddsAsync { bet_id: String },
    IsMarketSuspended,
    IsSelectionLocked { selection_id: String },
    GetLockedSelections,
    GetCurrentOdds,
    GetCurrentVolatility,
    GetVolatilityScore { window_minutes: i64 },
    GetOddsHistory { selection_id: String },
    GetAllOddsHistory,
    GetLockedOddsForBet { bet_id: String },
}

#[derive(Debug, Clone)]
pub enum OddsResponse {
    Snapshot(DomainResult<OddsSnapshot>),
    Bool(bool),
    Selections(Vec<String>),
    Odds(HashMap<String, Decimal>),
    Volatility(VolatilityLevel),
    Score(f64),
    History(Option<OddsHistory>),
    AllHistory(HashMap<String, OddsHistory>),
    LockedOdds(Option<OddsValue>),
}

pub type OddsMailbox = Mailbox<OddsRequest, OddsResponse>;

#[derive(Clone)]
pub struct OddsClient {
    mailbox: OddsMailbox,
}

impl OddsClient {
    pub fn new(mailbox: OddsMailbox) -> Self {
        OddsClient { mailbox }
    }

    async fn call(&self, request: OddsRequest) -> DomainResult<OddsResponse> {
        self.mailbox.call(request).await
    }

    pub async fn initialize_market(
        &self,
        selection_odds: HashMap<String, Decimal>,
        source: Source,
    ) -> DomainResult<OddsSnapshot> {
        match self.call(OddsRequest::InitializeMarket { selection_odds, source }).await? {
            OddsResponse::Snapshot(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn update_odds(
        &self,
        updates: HashMap<String, (Decimal, Option<String>)>,
        source: Source,
    ) -> DomainResult<OddsSnapshot> {
        match self.call(OddsRequest::UpdateOdds { updates, source }).await? {
            OddsResponse::Snapshot(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn suspend(&self, reason: String) -> DomainResult<OddsSnapshot> {
        match self.call(OddsRequest::SuspendOdds { reason }).await? {
            OddsResponse::Snapshot(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn resume(&self, reason: String) -> DomainResult<OddsSnapshot> {
        match self.call(OddsRequest::ResumeOdds { reason }).await? {
            OddsResponse::Snapshot(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn lock_for_bet(&self, bet_id: String, selection_id: String) -> DomainResult<OddsSnapshot> {
        match self.call(OddsRequest::LockOddsForBet { bet_id, selection_id }).await? {
            OddsResponse::Snapshot(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn unlock(&self, bet_id: String) -> DomainResult<OddsSnapshot> {
        match self.call(OddsRequest::UnlockOddsAsync { bet_id }).await? {
            OddsResponse::Snapshot(r) => r,
            _ => unreachable!(),
        }
    }

    pub async fn is_suspended(&self) -> DomainResult<bool> {
        match self.call(OddsRequest::IsMarketSuspended).await? {
            OddsResponse::Bool(b) => Ok(b),
            _ => unreachable!(),
        }
    }

    pub async fn is_selection_locked(&self, selection_id: String) -> DomainResult<bool> {
        match self.call(OddsRequest::IsSelectionLocked { selection_id }).await? {
            OddsResponse::Bool(b) => Ok(b),
            _ => unreachable!(),
        }
    }

    pub async fn locked_selections(&self) -> DomainResult<Vec<String>> {
        match self.call(OddsRequest::GetLockedSelections).await? {
            OddsResponse::Selections(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    pub async fn current_odds(&self) -> DomainResult<HashMap<String, Decimal>> {
        match self.call(OddsRequest::GetCurrentOdds).await? {
            OddsResponse::Odds(o) => Ok(o),
            _ => unreachable!(),
        }
    }

    pub async fn current_volatility(&self) -> DomainResult<VolatilityLevel> {
        match self.call(OddsRequest::GetCurrentVolatility).await? {
            OddsResponse::Volatility(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    pub async fn volatility_score(&self, window_minutes: i64) -> DomainResult<f64> {
        match self.call(OddsRequest::GetVolatilityScore { window_minutes }).await? {
            OddsResponse::Score(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    pub async fn odds_history(&self, selection_id: String) -> DomainResult<Option<OddsHistory>> {
        match self.call(OddsRequest::GetOddsHistory { selection_id }).await? {
            OddsResponse::History(h) => Ok(h),
            _ => unreachable!(),
        }
    }

    pub async fn all_odds_history(&self) -> DomainResult<HashMap<String, OddsHistory>> {
        match self.call(OddsRequest::GetAllOddsHistory).await? {
            OddsResponse::AllHistory(h) => Ok(h),
            _ => unreachable!(),
        }
    }

    /// Supplemental read used by the bet actor's cashout pricing - not named
    /// in spec §4.3 but required to price `payout = stake * 0.95 *
    /// (locked/current)` without the bet actor reaching into odds state.
    pub async fn locked_odds_for_bet(&self, bet_id: String) -> DomainResult<Option<OddsValue>> {
        match self.call(OddsRequest::GetLockedOddsForBet { bet_id }).await? {
            OddsResponse::LockedOdds(v) => Ok(v),
            _ => unreachable!(),
        }
    }
}

pub fn spawn_odds_actor(
    market_id: String,
    config: VolatilityConfig,
    store: Arc<dyn StateStore<OddsState>>,
) -> OddsMailbox {
    let snapshot_key = format!("odds:{market_id}");
    Mailbox::spawn(
        (OddsState::new(market_id, config), store, snapshot_key),
        move |(state, store, key): &mut (OddsState, Arc<dyn StateStore<OddsState>>, String), request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

pub async fn spawn_odds_actor_restoring(
    market_id: String,
    config: VolatilityConfig,
    store: Arc<dyn StateStore<OddsState>>,
) -> OddsMailbox {
    let snapshot_key = format!("odds:{market_id}");
    let initial = match store.get(&snapshot_key).await {
        Ok(Some(state)) => state,
        _ => OddsState::new(market_id, config),
    };
    Mailbox::spawn(
        (initial, store, snapshot_key),
        move |(state, store, key): &mut (OddsState, Arc<dyn StateStore<OddsState>>, String), request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

async fn persist(state: &OddsState, store: Arc<dyn StateStore<OddsState>>, key: String) -> DomainResult<()> {
    store.put(&key, state).await
}

async fn handle_request(
    state: &mut OddsState,
    request: OddsRequest,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> OddsResponse {
    match request {
        OddsRequest::InitializeMarket { selection_odds, source } => {
            OddsResponse::Snapshot(handle_initialize(state, selection_odds, source, store, key).await)
        }
        OddsRequest::UpdateOdds { updates, source } => {
            OddsResponse::Snapshot(handle_update(state, updates, source, store, key).await)
        }
        OddsRequest::SuspendOdds { reason } => {
            OddsResponse::Snapshot(handle_suspend(state, reason, store, key).await)
        }
        OddsRequest::ResumeOdds { reason } => {
            OddsResponse::Snapshot(handle_resume(state, reason, store, key).await)
        }
        OddsRequest::LockOddsForBet { bet_id, selection_id } => {
            OddsResponse::Snapshot(handle_lock(state, bet_id, selection_id, store, key).await)
        }
        OddsRequest::UnlockOddsAsync { bet_id } => {
            OddsResponse::Snapshot(handle_unlock(state, bet_id, store, key).await)
        }
        OddsRequest::IsMarketSuspended => OddsResponse::Bool(state.suspended),
        OddsRequest::IsSelectionLocked { selection_id } => OddsResponse::Bool(
            state.locks.get(&selection_id).map(|s| !s.is_empty()).unwrap_or(false),
        ),
        OddsRequest::GetLockedSelections => {
            OddsResponse::Selections(state.locks.iter().filter(|(_, s)| !s.is_empty()).map(|(k, _)| k.clone()).collect())
        }
        OddsRequest::GetCurrentOdds => OddsResponse::Odds(
            state.histories.iter().map(|(k, h)| (k.clone(), h.current_odds())).collect(),
        ),
        OddsRequest::GetCurrentVolatility => OddsResponse::Volatility(state.volatility),
        OddsRequest::GetVolatilityScore { window_minutes } => {
            let now = chrono::Utc::now();
            let max_score = state
                .histories
                .values()
                .map(|h| volatility::score(&h.updates, now, window_minutes))
                .fold(0.0_f64, f64::max);
            OddsResponse::Score(max_score)
        }
        OddsRequest::GetOddsHistory { selection_id } => {
            OddsResponse::History(state.histories.get(&selection_id).cloned())
        }
        OddsRequest::GetAllOddsHistory => OddsResponse::AllHistory(state.histories.clone()),
        OddsRequest::GetLockedOddsForBet { bet_id } => {
            OddsResponse::LockedOdds(state.bet_locks.get(&bet_id).map(|(_, v)| v.clone()))
        }
    }
}

fn validate_odds(decimal: Decimal) -> DomainResult<()> {
    if decimal < Decimal::new(101, 2) {
        return Err(DomainError::InvalidOdds);
    }
    Ok(())
}

async fn handle_initialize(
    state: &mut OddsState,
    selection_odds: HashMap<String, Decimal>,
    source: Source,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> DomainResult<OddsSnapshot> {
    if state.initialized {
        return Err(DomainError::AlreadyInitialized);
    }
    for &decimal in selection_odds.values() {
        validate_odds(decimal)?;
    }

    for (selection_id, decimal) in &selection_odds {
        state.histories.insert(selection_id.clone(), OddsHistory::new(selection_id.clone(), *decimal));
        state.locks.insert(selection_id.clone(), HashSet::new());
    }
    state.initialized = true;
    let _ = source;

    if let Err(e) = persist(state, store, key).await {
        state.initialized = false;
        state.histories.clear();
        state.locks.clear();
        return Err(e);
    }
    Ok(state.snapshot())
}

async fn handle_update(
    state: &mut OddsState,
    updates: HashMap<String, (Decimal, Option<String>)>,
    source: Source,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> DomainResult<OddsSnapshot> {
    if state.suspended {
        return Err(DomainError::MarketSuspended);
    }
    for selection_id in updates.keys() {
        if !state.histories.contains_key(selection_id) {
            return Err(DomainError::UnknownSelection(selection_id.clone()));
        }
    }
    for &(decimal, _) in updates.values() {
        validate_odds(decimal)?;
    }

    let previous = state.clone();
    let now = chrono::Utc::now();
    for (selection_id, (new_odds, reason)) in updates {
        let history = state.histories.get_mut(&selection_id).expect("checked above");
        let previous_odds = history.current_odds();
        history.updates.push(OddsUpdate {
            previous_odds,
            new_odds,
            source,
            reason,
            updated_at: now,
        });
    }
    state.recompute_volatility(now);

    if let Err(e) = persist(state, store, key).await {
        warn!(market_id = %state.market_id, "persistence failed on odds update, rolling back");
        *state = previous;
        return Err(e);
    }
    debug!(market_id = %state.market_id, volatility = ?state.volatility, "odds updated");
    Ok(state.snapshot())
}

async fn handle_suspend(
    state: &mut OddsState,
    reason: String,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> DomainResult<OddsSnapshot> {
    if state.suspended {
        return Ok(state.snapshot());
    }
    let previous = (state.suspended, state.suspension_reason.clone());
    state.suspended = true;
    state.suspension_reason = Some(reason);

    if let Err(e) = persist(state, store, key).await {
        (state.suspended, state.suspension_reason) = previous;
        return Err(e);
    }
    Ok(state.snapshot())
}

async fn handle_resume(
    state: &mut OddsState,
    _reason: String,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> DomainResult<OddsSnapshot> {
    if !state.suspended {
        return Ok(state.snapshot());
    }
    let previous = (state.suspended, state.suspension_reason.clone());
    state.suspended = false;
    state.suspension_reason = None;

    if let Err(e) = persist(state, store, key).await {
        (state.suspended, state.suspension_reason) = previous;
        return Err(e);
    }
    Ok(state.snapshot())
}

async fn handle_lock(
    state: &mut OddsState,
    bet_id: String,
    selection_id: String,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> DomainResult<OddsSnapshot> {
    if state.suspended {
        return Err(DomainError::MarketSuspended);
    }
    let Some(history) = state.histories.get(&selection_id) else {
        return Err(DomainError::UnknownSelection(selection_id));
    };

    let odds_value = OddsValue {
        decimal: history.current_odds(),
        market_id: state.market_id.clone(),
        selection_id: selection_id.clone(),
        source: Source::Manual,
        timestamp: chrono::Utc::now(),
    };

    state.locks.entry(selection_id.clone()).or_default().insert(bet_id.clone());
    state.bet_locks.insert(bet_id.clone(), (selection_id.clone(), odds_value));

    if let Err(e) = persist(state, store, key).await {
        state.locks.get_mut(&selection_id).map(|s| s.remove(&bet_id));
        state.bet_locks.remove(&bet_id);
        return Err(e);
    }
    Ok(state.snapshot())
}

async fn handle_unlock(
    state: &mut OddsState,
    bet_id: String,
    store: Arc<dyn StateStore<OddsState>>,
    key: String,
) -> DomainResult<OddsSnapshot> {
    let Some((selection_id, _)) = state.bet_locks.remove(&bet_id) else {
        return Ok(state.snapshot());
    };
    if let Some(set) = state.locks.get_mut(&selection_id) {
        set.remove(&bet_id);
    }

    if let Err(e) = persist(state, store, key).await {
        warn!(market_id = %state.market_id, "persistence failed on unlock, odds actor state may diverge from store");
        return Err(e);
    }
    Ok(state.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;

    fn odds(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn client() -> OddsClient {
        let store = InMemoryStateStore::new();
        let mailbox = spawn_odds_actor("m1".into(), VolatilityConfig::default(), store);
        OddsClient::new(mailbox)
    }

    #[tokio::test]
    async fn initialize_then_double_initialize_fails() {
        let c = client();
        let mut selections = HashMap::new();
        selections.insert("home".to_string(), odds(210));
        c.initialize_market(selections.clone(), Source::Manual).await.unwrap();
        let err = c.initialize_market(selections, Source::Manual).await.unwrap_err();
        assert_eq!(err, DomainError::AlreadyInitialized);
    }

    #[tokio::test]
    async fn update_unknown_selection_rejected() {
        let c = client();
        let mut selections = HashMap::new();
        selections.insert("home".to_string(), odds(210));
        c.initialize_market(selections, Source::Manual).await.unwrap();

        let mut updates = HashMap::new();
        updates.insert("away".to_string(), (odds(150), None));
        let err = c.update_odds(updates, Source::Manual).await.unwrap_err();
        assert_eq!(err, DomainError::UnknownSelection("away".to_string()));
    }

    #[tokio::test]
    async fn lock_then_unlock_restores_selection_lock_state_o2() {
        let c = client();
        let mut selections = HashMap::new();
        selections.insert("home".to_string(), odds(210));
        c.initialize_market(selections, Source::Manual).await.unwrap();

        let before = c.is_selection_locked("home".to_string()).await.unwrap();
        c.lock_for_bet("bet1".into(), "home".into()).await.unwrap();
        assert!(c.is_selection_locked("home".to_string()).await.unwrap());
        c.unlock("bet1".into()).await.unwrap();
        let after = c.is_selection_locked("home".to_string()).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn six_volatile_updates_auto_suspend_o1() {
        let c = client();
        let mut selections = HashMap::new();
        selections.insert("home".to_string(), odds(200));
        c.initialize_market(selections, Source::Manual).await.unwrap();

        let swings = [280i64, 196, 274, 192, 269, 188];
        for new_odds in swings {
            let mut updates = HashMap::new();
            updates.insert("home".to_string(), (odds(new_odds), None));
            let _ = c.update_odds(updates, Source::Manual).await;
        }

        assert!(c.is_suspended().await.unwrap());
        let mut more_updates = HashMap::new();
        more_updates.insert("home".to_string(), (odds(210), None));
        let err = c.update_odds(more_updates, Source::Manual).await.unwrap_err();
        assert_eq!(err, DomainError::MarketSuspended);
    }

    #[tokio::test]
    async fn suspend_is_idempotent() {
        let c = client();
        let mut selections = HashMap::new();
        selections.insert("home".to_string(), odds(210));
        c.initialize_market(selections, Source::Manual).await.unwrap();

        c.suspend("manual hold".into()).await.unwrap();
        let snap = c.suspend("different reason".into()).await.unwrap();
        assert_eq!(snap.suspension_reason.unwrap(), "manual hold");
    }
}
