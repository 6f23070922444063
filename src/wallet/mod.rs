//! Wallet actor (spec §4.2): balance, reservations, idempotent transactions,
//! double-entry ledger. One actor per userId.

pub mod types;

use crate::actor::Mailbox;
use crate::error::{DomainError, DomainResult};
use crate::ledger::{paired_entries, EntryKind, Ledger, LedgerEntry};
use crate::money::Money;
use crate::store::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub use types::{TransactionResult, TransactionStatus, TransactionType, WalletTransaction};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WalletState {
    pub user_id: String,
    pub total: Money,
    pub reserved: Money,
    /// (userId, referenceId) idempotency index -> completed transaction id.
    /// Scoped per-actor so the key is just referenceId.
    idempotency_index: HashMap<String, Uuid>,
    /// Active reservations: betId -> reserved amount.
    reservations: HashMap<String, Money>,
    transactions: Vec<WalletTransaction>,
    ledger: Ledger,
}

impl WalletState {
    pub fn new(user_id: impl Into<String>, currency: crate::money::Currency) -> Self {
        WalletState {
            user_id: user_id.into(),
            total: Money::zero(currency),
            reserved: Money::zero(currency),
            idempotency_index: HashMap::new(),
            reservations: HashMap::new(),
            transactions: Vec::new(),
            ledger: Ledger::new(),
        }
    }

    pub fn available_balance(&self) -> Money {
        // W2: availableBalance = total - reserved. Never negative by W1.
        self.total
            .subtract(&self.reserved)
            .unwrap_or_else(|_| Money::zero(self.total.currency()))
    }

    fn record(
        &mut self,
        transaction_type: TransactionType,
        amount: Money,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> WalletTransaction {
        let txn = WalletTransaction {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            transaction_type,
            amount,
            status: TransactionStatus::Completed,
            description: description.into(),
            timestamp: chrono::Utc::now(),
            reference_id,
            error_message: None,
        };
        self.transactions.push(txn.clone());
        txn
    }

    fn append_ledger_pair(
        &mut self,
        transaction_id: Uuid,
        amount: Money,
        wallet_kind: EntryKind,
        wallet_description: impl Into<String>,
        counterparty_description: impl Into<String>,
    ) {
        let (wallet_entry, counterparty_entry) = paired_entries(
            transaction_id,
            amount,
            wallet_kind,
            wallet_description,
            counterparty_description,
        );
        self.ledger.append(wallet_entry);
        self.ledger.append(counterparty_entry);
    }
}

#[derive(Debug, Clone)]
pub enum WalletRequest {
    Deposit { amount: Money, reference_id: String },
    Withdraw { amount: Money, reference_id: String },
    /// Internal credit used by the bet actor to move settlement/cashout/void
    /// payouts, tagged with the transaction type the data model calls for
    /// (BetWin/BetRefund) rather than the generic Deposit a caller sees at
    /// the HTTP boundary. Same idempotency and ledger-pairing behavior.
    CreditForBet { amount: Money, reference_id: String, transaction_type: TransactionType },
    Reserve { amount: Money, bet_id: String },
    CommitReservation { bet_id: String },
    ReleaseReservation { bet_id: String },
    GetBalance,
    GetAvailableBalance,
    GetTransactionHistory { limit: usize },
    GetLedgerEntries { limit: usize },
}

#[derive(Debug, Clone)]
pub enum WalletResponse {
    Transaction(TransactionResult),
    Balance(Money),
    History(Vec<WalletTransaction>),
    Ledger(Vec<LedgerEntry>),
}

pub type WalletMailbox = Mailbox<WalletRequest, WalletResponse>;

/// Callers' cheap handle to one wallet actor.
#[derive(Clone)]
pub struct WalletClient {
    mailbox: WalletMailbox,
}

impl WalletClient {
    pub fn new(mailbox: WalletMailbox) -> Self {
        WalletClient { mailbox }
    }

    async fn call(&self, request: WalletRequest) -> DomainResult<WalletResponse> {
        self.mailbox.call(request).await
    }

    pub async fn deposit(&self, amount: Money, reference_id: String) -> DomainResult<TransactionResult> {
        match self.call(WalletRequest::Deposit { amount, reference_id }).await? {
            WalletResponse::Transaction(r) => Ok(r),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn credit_for_bet(
        &self,
        amount: Money,
        reference_id: String,
        transaction_type: TransactionType,
    ) -> DomainResult<TransactionResult> {
        match self
            .call(WalletRequest::CreditForBet { amount, reference_id, transaction_type })
            .await?
        {
            WalletResponse::Transaction(r) => Ok(r),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn withdraw(&self, amount: Money, reference_id: String) -> DomainResult<TransactionResult> {
        match self.call(WalletRequest::Withdraw { amount, reference_id }).await? {
            WalletResponse::Transaction(r) => Ok(r),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn reserve(&self, amount: Money, bet_id: String) -> DomainResult<TransactionResult> {
        match self.call(WalletRequest::Reserve { amount, bet_id }).await? {
            WalletResponse::Transaction(r) => Ok(r),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn commit_reservation(&self, bet_id: String) -> DomainResult<TransactionResult> {
        match self.call(WalletRequest::CommitReservation { bet_id }).await? {
            WalletResponse::Transaction(r) => Ok(r),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn release_reservation(&self, bet_id: String) -> DomainResult<TransactionResult> {
        match self.call(WalletRequest::ReleaseReservation { bet_id }).await? {
            WalletResponse::Transaction(r) => Ok(r),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn balance(&self) -> DomainResult<Money> {
        match self.call(WalletRequest::GetBalance).await? {
            WalletResponse::Balance(m) => Ok(m),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn available_balance(&self) -> DomainResult<Money> {
        match self.call(WalletRequest::GetAvailableBalance).await? {
            WalletResponse::Balance(m) => Ok(m),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn transaction_history(&self, limit: usize) -> DomainResult<Vec<WalletTransaction>> {
        match self.call(WalletRequest::GetTransactionHistory { limit }).await? {
            WalletResponse::History(h) => Ok(h),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }

    pub async fn ledger_entries(&self, limit: usize) -> DomainResult<Vec<LedgerEntry>> {
        match self.call(WalletRequest::GetLedgerEntries { limit }).await? {
            WalletResponse::Ledger(l) => Ok(l),
            _ => unreachable!("wallet actor returned wrong response kind"),
        }
    }
}

/// Spawns a wallet actor for `user_id`, restoring from `store` if a snapshot
/// exists, and persisting a fresh snapshot after every mutation.
pub fn spawn_wallet_actor(
    user_id: String,
    currency: crate::money::Currency,
    store: Arc<dyn StateStore<WalletState>>,
) -> WalletMailbox {
    let snapshot_key = format!("wallet:{user_id}");
    Mailbox::spawn(
        (WalletState::new(user_id, currency), store, snapshot_key),
        move |(state, store, key): &mut (WalletState, Arc<dyn StateStore<WalletState>>, String), request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

/// Restores wallet actor state from a prior snapshot before spawning, used
/// by the registry on cold start / actor re-activation.
pub async fn spawn_wallet_actor_restoring(
    user_id: String,
    currency: crate::money::Currency,
    store: Arc<dyn StateStore<WalletState>>,
) -> WalletMailbox {
    let snapshot_key = format!("wallet:{user_id}");
    let initial = match store.get(&snapshot_key).await {
        Ok(Some(state)) => state,
        _ => WalletState::new(user_id, currency),
    };
    Mailbox::spawn(
        (initial, store, snapshot_key),
        move |(state, store, key): &mut (WalletState, Arc<dyn StateStore<WalletState>>, String), request| {
            let store = store.clone();
            let key = key.clone();
            Box::pin(handle_request(state, request, store, key))
        },
    )
}

async fn persist(
    state: &WalletState,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> DomainResult<()> {
    store.put(&key, state).await
}

async fn handle_request(
    state: &mut WalletState,
    request: WalletRequest,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> WalletResponse {
    match request {
        WalletRequest::Deposit { amount, reference_id } => {
            WalletResponse::Transaction(handle_deposit(state, amount, reference_id, store, key).await)
        }
        WalletRequest::Withdraw { amount, reference_id } => {
            WalletResponse::Transaction(handle_withdraw(state, amount, reference_id, store, key).await)
        }
        WalletRequest::CreditForBet { amount, reference_id, transaction_type } => {
            WalletResponse::Transaction(
                handle_credit_for_bet(state, amount, reference_id, transaction_type, store, key).await,
            )
        }
        WalletRequest::Reserve { amount, bet_id } => {
            WalletResponse::Transaction(handle_reserve(state, amount, bet_id, store, key).await)
        }
        WalletRequest::CommitReservation { bet_id } => {
            WalletResponse::Transaction(handle_commit(state, bet_id, store, key).await)
        }
        WalletRequest::ReleaseReservation { bet_id } => {
            WalletResponse::Transaction(handle_release(state, bet_id, store, key).await)
        }
        WalletRequest::GetBalance => WalletResponse::Balance(state.total),
        WalletRequest::GetAvailableBalance => WalletResponse::Balance(state.available_balance()),
        WalletRequest::GetTransactionHistory { limit } => {
            let mut history = state.transactions.clone();
            history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            history.truncate(limit);
            WalletResponse::History(history)
        }
        WalletRequest::GetLedgerEntries { limit } => {
            WalletResponse::Ledger(state.ledger.recent(limit))
        }
    }
}

async fn handle_deposit(
    state: &mut WalletState,
    amount: Money,
    reference_id: String,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> TransactionResult {
    if let Some(existing) = state.idempotency_index.get(&reference_id) {
        debug!(user_id = %state.user_id, reference_id, "deposit replay, returning prior result");
        if let Some(txn) = state.transactions.iter().find(|t| t.id == *existing) {
            return TransactionResult::ok(txn.clone());
        }
    }
    if !amount.is_positive() {
        return TransactionResult::err(DomainError::NonPositiveAmount);
    }

    let new_total = match state.total.add(&amount) {
        Ok(t) => t,
        Err(e) => return TransactionResult::err(e),
    };
    let previous_total = state.total;
    state.total = new_total;

    let txn = state.record(TransactionType::Deposit, amount, "deposit", Some(reference_id.clone()));
    state.idempotency_index.insert(reference_id, txn.id);
    state.append_ledger_pair(
        txn.id,
        amount,
        EntryKind::Credit,
        "deposit credit",
        "house float debit",
    );

    if let Err(e) = persist(state, store, key).await {
        warn!(user_id = %state.user_id, "persistence failed on deposit, rolling back");
        state.total = previous_total;
        state.transactions.pop();
        state.idempotency_index.remove(&txn.reference_id.clone().unwrap());
        return TransactionResult::err(e);
    }

    TransactionResult::ok(txn)
}

async fn handle_credit_for_bet(
    state: &mut WalletState,
    amount: Money,
    reference_id: String,
    transaction_type: TransactionType,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> TransactionResult {
    if let Some(existing) = state.idempotency_index.get(&reference_id) {
        if let Some(txn) = state.transactions.iter().find(|t| t.id == *existing) {
            return TransactionResult::ok(txn.clone());
        }
    }
    if !amount.is_positive() {
        return TransactionResult::err(DomainError::NonPositiveAmount);
    }

    let new_total = match state.total.add(&amount) {
        Ok(t) => t,
        Err(e) => return TransactionResult::err(e),
    };
    let previous_total = state.total;
    state.total = new_total;

    let description = match transaction_type {
        TransactionType::BetWin => "bet settlement payout",
        TransactionType::BetRefund => "bet void refund",
        _ => "bet credit",
    };
    let txn = state.record(transaction_type, amount, description, Some(reference_id.clone()));
    state.idempotency_index.insert(reference_id, txn.id);
    state.append_ledger_pair(txn.id, amount, EntryKind::Credit, description, "house float debit");

    if let Err(e) = persist(state, store, key).await {
        warn!(user_id = %state.user_id, "persistence failed on bet credit, rolling back");
        state.total = previous_total;
        state.transactions.pop();
        state.idempotency_index.remove(&txn.reference_id.clone().unwrap());
        return TransactionResult::err(e);
    }

    TransactionResult::ok(txn)
}

async fn handle_withdraw(
    state: &mut WalletState,
    amount: Money,
    reference_id: String,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> TransactionResult {
    if let Some(existing) = state.idempotency_index.get(&reference_id) {
        if let Some(txn) = state.transactions.iter().find(|t| t.id == *existing) {
            return TransactionResult::ok(txn.clone());
        }
    }
    if !amount.is_positive() {
        return TransactionResult::err(DomainError::NonPositiveAmount);
    }
    let available = state.available_balance();
    if amount.compare(&available).map(|o| o.is_gt()).unwrap_or(true) {
        return TransactionResult::err(DomainError::InsufficientAvailableBalance);
    }

    let txn_id = Uuid::new_v4();
    let new_total = match state.total.subtract(&amount) {
        Ok(t) => t,
        Err(e) => return TransactionResult::err(e),
    };
    let previous_total = state.total;
    state.total = new_total;

    let txn = WalletTransaction {
        id: txn_id,
        user_id: state.user_id.clone(),
        transaction_type: TransactionType::Withdrawal,
        amount,
        status: TransactionStatus::Completed,
        description: "withdrawal".into(),
        timestamp: chrono::Utc::now(),
        reference_id: Some(reference_id.clone()),
        error_message: None,
    };
    state.transactions.push(txn.clone());
    state.idempotency_index.insert(reference_id, txn_id);
    state.append_ledger_pair(
        txn_id,
        amount,
        EntryKind::Debit,
        "withdrawal debit",
        "house float credit",
    );

    if let Err(e) = persist(state, store, key).await {
        state.total = previous_total;
        state.transactions.pop();
        return TransactionResult::err(e);
    }

    TransactionResult::ok(txn)
}

async fn handle_reserve(
    state: &mut WalletState,
    amount: Money,
    bet_id: String,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> TransactionResult {
    if state.reservations.contains_key(&bet_id) {
        return TransactionResult::err(DomainError::DuplicateReservation(bet_id));
    }
    let available = state.available_balance();
    if amount.compare(&available).map(|o| o.is_gt()).unwrap_or(true) {
        return TransactionResult::err(DomainError::InsufficientAvailableBalance);
    }

    let new_reserved = match state.reserved.add(&amount) {
        Ok(r) => r,
        Err(e) => return TransactionResult::err(e),
    };
    let previous_reserved = state.reserved;
    state.reserved = new_reserved;
    state.reservations.insert(bet_id.clone(), amount);

    let txn = WalletTransaction {
        id: Uuid::new_v4(),
        user_id: state.user_id.clone(),
        transaction_type: TransactionType::Reservation,
        amount,
        status: TransactionStatus::Completed,
        description: format!("reserve for bet {bet_id}"),
        timestamp: chrono::Utc::now(),
        reference_id: Some(bet_id.clone()),
        error_message: None,
    };
    state.transactions.push(txn.clone());

    if let Err(e) = persist(state, store, key).await {
        state.reserved = previous_reserved;
        state.reservations.remove(&bet_id);
        state.transactions.pop();
        return TransactionResult::err(e);
    }

    TransactionResult::ok(txn)
}

async fn handle_commit(
    state: &mut WalletState,
    bet_id: String,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> TransactionResult {
    let Some(amount) = state.reservations.get(&bet_id).copied() else {
        return TransactionResult::err(DomainError::ReservationNotFound(bet_id));
    };

    let previous_total = state.total;
    let previous_reserved = state.reserved;

    let new_total = match state.total.subtract(&amount) {
        Ok(t) => t,
        Err(e) => return TransactionResult::err(e),
    };
    let new_reserved = match state.reserved.subtract(&amount) {
        Ok(r) => r,
        Err(e) => return TransactionResult::err(e),
    };
    state.total = new_total;
    state.reserved = new_reserved;
    state.reservations.remove(&bet_id);

    let txn = WalletTransaction {
        id: Uuid::new_v4(),
        user_id: state.user_id.clone(),
        transaction_type: TransactionType::ReservationCommit,
        amount,
        status: TransactionStatus::Completed,
        description: format!("commit reservation for bet {bet_id}"),
        timestamp: chrono::Utc::now(),
        reference_id: Some(bet_id.clone()),
        error_message: None,
    };
    state.transactions.push(txn.clone());
    state.append_ledger_pair(
        txn.id,
        amount,
        EntryKind::Debit,
        "reservation committed (stake leaves wallet)",
        "house float credit",
    );

    if let Err(e) = persist(state, store, key).await {
        state.total = previous_total;
        state.reserved = previous_reserved;
        state.reservations.insert(bet_id, amount);
        state.transactions.pop();
        return TransactionResult::err(e);
    }

    TransactionResult::ok(txn)
}

async fn handle_release(
    state: &mut WalletState,
    bet_id: String,
    store: Arc<dyn StateStore<WalletState>>,
    key: String,
) -> TransactionResult {
    let Some(amount) = state.reservations.get(&bet_id).copied() else {
        return TransactionResult::err(DomainError::ReservationNotFound(bet_id));
    };

    let previous_reserved = state.reserved;
    let new_reserved = match state.reserved.subtract(&amount) {
        Ok(r) => r,
        Err(e) => return TransactionResult::err(e),
    };
    state.reserved = new_reserved;
    state.reservations.remove(&bet_id);

    let txn = WalletTransaction {
        id: Uuid::new_v4(),
        user_id: state.user_id.clone(),
        transaction_type: TransactionType::ReservationRelease,
        amount,
        status: TransactionStatus::Completed,
        description: format!("release reservation for bet {bet_id}"),
        timestamp: chrono::Utc::now(),
        reference_id: Some(bet_id.clone()),
        error_message: None,
    };
    state.transactions.push(txn.clone());

    if let Err(e) = persist(state, store, key).await {
        state.reserved = previous_reserved;
        state.reservations.insert(bet_id, amount);
        state.transactions.pop();
        return TransactionResult::err(e);
    }

    TransactionResult::ok(txn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::store::InMemoryStateStore;
    use rust_decimal::Decimal;

    fn usd(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), Currency::USD).unwrap()
    }

    fn client() -> WalletClient {
        let store = InMemoryStateStore::new();
        let mailbox = spawn_wallet_actor("u1".into(), Currency::USD, store);
        WalletClient::new(mailbox)
    }

    #[tokio::test]
    async fn deposit_then_withdraw_w1_w2() {
        let c = client();
        c.deposit(usd(100000), "d1".into()).await.unwrap();
        let balance = c.balance().await.unwrap();
        assert_eq!(balance, usd(100000));

        c.reserve(usd(10000), "bet1".into()).await.unwrap();
        let available = c.available_balance().await.unwrap();
        assert_eq!(available, usd(90000));
    }

    #[tokio::test]
    async fn deposit_idempotent_w5() {
        let c = client();
        let r1 = c.deposit(usd(5000), "ref-1".into()).await.unwrap();
        let r2 = c.deposit(usd(5000), "ref-1".into()).await.unwrap();
        assert_eq!(r1.transaction.as_ref().unwrap().id, r2.transaction.as_ref().unwrap().id);
        let balance = c.balance().await.unwrap();
        assert_eq!(balance, usd(5000));
        let ledger = c.ledger_entries(100).await.unwrap();
        assert_eq!(ledger.len(), 2); // one credit + one debit, not four
    }

    #[tokio::test]
    async fn reserve_duplicate_rejected() {
        let c = client();
        c.deposit(usd(10000), "d".into()).await.unwrap();
        c.reserve(usd(1000), "bet1".into()).await.unwrap();
        let result = c.reserve(usd(1000), "bet1".into()).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error_message.unwrap(),
            DomainError::DuplicateReservation("bet1".into()).to_string()
        );
    }

    #[tokio::test]
    async fn commit_reservation_reduces_total_and_reserved() {
        let c = client();
        c.deposit(usd(10000), "d".into()).await.unwrap();
        c.reserve(usd(4000), "bet1".into()).await.unwrap();
        c.commit_reservation("bet1".into()).await.unwrap();
        assert_eq!(c.balance().await.unwrap(), usd(6000));
        assert_eq!(c.available_balance().await.unwrap(), usd(6000));
    }

    #[tokio::test]
    async fn release_reservation_restores_available_only() {
        let c = client();
        c.deposit(usd(10000), "d".into()).await.unwrap();
        c.reserve(usd(4000), "bet1".into()).await.unwrap();
        c.release_reservation("bet1".into()).await.unwrap();
        assert_eq!(c.balance().await.unwrap(), usd(10000));
        assert_eq!(c.available_balance().await.unwrap(), usd(10000));
    }

    #[tokio::test]
    async fn reservation_not_found_on_double_release() {
        let c = client();
        c.deposit(usd(10000), "d".into()).await.unwrap();
        c.reserve(usd(4000), "bet1".into()).await.unwrap();
        c.release_reservation("bet1".into()).await.unwrap();
        let result = c.release_reservation("bet1".into()).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn insufficient_available_balance_rejected() {
        let c = client();
        c.deposit(usd(5000), "d".into()).await.unwrap();
        let result = c.reserve(usd(10000), "bet1".into()).await.unwrap();
        assert!(!result.success);
    }
}
