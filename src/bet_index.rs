//! Bet index actor (spec §4.5): thin per-user registry of bet ids. Does not
//! hold bet details itself - it asks the owning bet actor on each query and
//! filters out bets that no longer resolve.

use crate::actor::Mailbox;
use crate::bet::BetLookup;
use crate::error::DomainResult;
use crate::store::StateStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BetIndexState {
    user_id: String,
    /// Insertion order preserved for GetUserBets; HashSet only guards AddBet
    /// idempotency.
    bet_ids: Vec<String>,
    seen: HashSet<String>,
}

impl BetIndexState {
    fn new(user_id: String) -> Self {
        BetIndexState { user_id, bet_ids: Vec::new(), seen: HashSet::new() }
    }
}

#[derive(Debug, Clone)]
pub enum BetIndexRequest {
    AddBet { bet_id: String },
    HasBet { bet_id: String },
    GetUserBets { limit: usize },
    GetActiveBets { limit: usize },
    GetBetHistory { limit: usize },
}

#[derive(Debug, Clone)]
pub enum BetIndexResponse {
    Added,
    Has(bool),
    Ids(Vec<String>),
}

pub type BetIndexMailbox = Mailbox<BetIndexRequest, BetIndexResponse>;

#[derive(Clone)]
pub struct BetIndexClient {
    mailbox: BetIndexMailbox,
}

impl BetIndexClient {
    pub fn new(mailbox: BetIndexMailbox) -> Self {
        BetIndexClient { mailbox }
    }

    async fn call(&self, request: BetIndexRequest) -> DomainResult<BetIndexResponse> {
        self.mailbox.call(request).await
    }

    pub async fn add_bet(&self, bet_id: String) -> DomainResult<()> {
        self.call(BetIndexRequest::AddBet { bet_id }).await.map(|_| ())
    }

    pub async fn has_bet(&self, bet_id: String) -> DomainResult<bool> {
        match self.call(BetIndexRequest::HasBet { bet_id }).await? {
            BetIndexResponse::Has(b) => Ok(b),
            _ => unreachable!(),
        }
    }

    pub async fn user_bets(&self, limit: usize) -> DomainResult<Vec<String>> {
        match self.call(BetIndexRequest::GetUserBets { limit }).await? {
            BetIndexResponse::Ids(ids) => Ok(ids),
            _ => unreachable!(),
        }
    }

    /// Resolves each id through `bets` and keeps only {Pending, Accepted}.
    pub async fn active_bets(&self, limit: usize, bets: &dyn BetLookup) -> DomainResult<Vec<crate::bet::Bet>> {
        let ids = match self.call(BetIndexRequest::GetActiveBets { limit }).await? {
            BetIndexResponse::Ids(ids) => ids,
            _ => unreachable!(),
        };
        let mut resolved = resolve_and_filter(ids, bets, |b| {
            matches!(b.status, crate::bet::BetStatus::Pending | crate::bet::BetStatus::Accepted)
        })
        .await?;
        resolved.truncate(limit);
        Ok(resolved)
    }

    /// Resolves each id through `bets`, descending by `placedAt`.
    pub async fn bet_history(&self, limit: usize, bets: &dyn BetLookup) -> DomainResult<Vec<crate::bet::Bet>> {
        let ids = match self.call(BetIndexRequest::GetBetHistory { limit }).await? {
            BetIndexResponse::Ids(ids) => ids,
            _ => unreachable!(),
        };
        let mut resolved = resolve_and_filter(ids, bets, |_| true).await?;
        resolved.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        resolved.truncate(limit);
        Ok(resolved)
    }
}

async fn resolve_and_filter(
    ids: Vec<String>,
    bets: &dyn BetLookup,
    keep: impl Fn(&crate::bet::Bet) -> bool,
) -> DomainResult<Vec<crate::bet::Bet>> {
    let mut out = Vec::new();
    for id in ids {
        let client = bets.client_for(&id).await;
        if let Ok(Some(bet)) = client.get_bet_details().await {
            if keep(&bet) {
                out.push(bet);
            }
        }
    }
    Ok(out)
}

pub fn spawn_bet_index_actor(user_id: String, store: Arc<dyn StateStore<BetIndexState>>) -> BetIndexMailbox {
    let snapshot_key = format!("bet_index:{user_id}");
    Mailbox::spawn(
        (BetIndexState::new(user_id), store, snapshot_key),
        move |(state, store, key): &mut (BetIndexState, Arc<dyn StateStore<BetIndexState>>, String), request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

pub async fn spawn_bet_index_actor_restoring(
    user_id: String,
    store: Arc<dyn StateStore<BetIndexState>>,
) -> BetIndexMailbox {
    let snapshot_key = format!("bet_index:{user_id}");
    let initial = match store.get(&snapshot_key).await {
        Ok(Some(state)) => state,
        _ => BetIndexState::new(user_id),
    };
    Mailbox::spawn(
        (initial, store, snapshot_key),
        move |(state, store, key): &mut (BetIndexState, Arc<dyn StateStore<BetIndexState>>, String), request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

async fn handle_request(
    state: &mut BetIndexState,
    request: BetIndexRequest,
    store: Arc<dyn StateStore<BetIndexState>>,
    key: String,
) -> BetIndexResponse {
    match request {
        BetIndexRequest::AddBet { bet_id } => {
            if state.seen.insert(bet_id.clone()) {
                state.bet_ids.push(bet_id);
                if let Err(e) = store.put(&key, state).await {
                    debug!(user_id = %state.user_id, error = %e, "bet index persistence failed");
                }
            }
            BetIndexResponse::Added
        }
        BetIndexRequest::HasBet { bet_id } => BetIndexResponse::Has(state.seen.contains(&bet_id)),
        BetIndexRequest::GetUserBets { limit } => {
            BetIndexResponse::Ids(state.bet_ids.iter().rev().take(limit).cloned().collect())
        }
        // Active/history filtering needs bet details the index doesn't hold;
        // return every known id (status-blind) and let the client resolve,
        // filter, and apply `limit` after it knows each bet's current status.
        BetIndexRequest::GetActiveBets { limit: _ } | BetIndexRequest::GetBetHistory { limit: _ } => {
            BetIndexResponse::Ids(state.bet_ids.iter().rev().cloned().collect())
        }
    }
}
