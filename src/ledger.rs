//! Double-entry ledger primitives (spec §3, §4.1). Every wallet transaction
//! creates exactly one Credit + one Debit sharing a transaction id; W4
//! (spec §8) requires these to balance per transaction id across the
//! append-only log.

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Money,
    pub kind: EntryKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        transaction_id: Uuid,
        amount: Money,
        kind: EntryKind,
        description: impl Into<String>,
    ) -> Self {
        LedgerEntry {
            id: Uuid::new_v4(),
            transaction_id,
            amount,
            kind,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Appends a matched Credit/Debit pair for one transaction. The wallet's own
/// entry always records the wallet's side of the movement; the counterparty
/// entry records the opposite leg against an external account tag (e.g. the
/// house float for deposits/withdrawals, or the bet itself for reservations).
pub fn paired_entries(
    transaction_id: Uuid,
    amount: Money,
    wallet_kind: EntryKind,
    wallet_description: impl Into<String>,
    counterparty_description: impl Into<String>,
) -> (LedgerEntry, LedgerEntry) {
    let counterparty_kind = match wallet_kind {
        EntryKind::Credit => EntryKind::Debit,
        EntryKind::Debit => EntryKind::Credit,
    };
    (
        LedgerEntry::new(transaction_id, amount, wallet_kind, wallet_description),
        LedgerEntry::new(
            transaction_id,
            amount,
            counterparty_kind,
            counterparty_description,
        ),
    )
}

/// An append-only ledger. Owned exclusively by the wallet actor that wrote it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn recent(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Verifies W4: for every transaction id present, credit total == debit total.
    /// Used by tests; a ledger built only through `paired_entries` can never
    /// violate this, but the check documents the invariant directly.
    pub fn balances_by_transaction(&self) -> HashMap<Uuid, bool> {
        let mut credits: HashMap<Uuid, Money> = HashMap::new();
        let mut debits: HashMap<Uuid, Money> = HashMap::new();
        for entry in &self.entries {
            let bucket = match entry.kind {
                EntryKind::Credit => &mut credits,
                EntryKind::Debit => &mut debits,
            };
            let running = bucket
                .entry(entry.transaction_id)
                .or_insert_with(|| Money::zero(entry.amount.currency()));
            *running = running.add(&entry.amount).expect("same currency per wallet");
        }
        let mut result = HashMap::new();
        let all_ids: std::collections::HashSet<_> =
            credits.keys().chain(debits.keys()).copied().collect();
        for id in all_ids {
            let zero_credit = credits.get(&id).cloned();
            let zero_debit = debits.get(&id).cloned();
            let balanced = match (zero_credit, zero_debit) {
                (Some(c), Some(d)) => c == d,
                _ => false,
            };
            result.insert(id, balanced);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use rust_decimal::Decimal;

    #[test]
    fn paired_entries_balance_w4() {
        let mut ledger = Ledger::new();
        let txn = Uuid::new_v4();
        let amount = Money::new(Decimal::new(10000, 2), Currency::USD).unwrap();
        let (wallet_entry, counterparty_entry) =
            paired_entries(txn, amount, EntryKind::Credit, "deposit", "house float debit");
        ledger.append(wallet_entry);
        ledger.append(counterparty_entry);

        let balances = ledger.balances_by_transaction();
        assert_eq!(balances.get(&txn), Some(&true));
    }

    #[test]
    fn unmatched_entry_is_unbalanced() {
        let mut ledger = Ledger::new();
        let txn = Uuid::new_v4();
        let amount = Money::new(Decimal::new(500, 2), Currency::USD).unwrap();
        ledger.append(LedgerEntry::new(txn, amount, EntryKind::Credit, "lonely credit"));

        let balances = ledger.balances_by_transaction();
        assert_eq!(balances.get(&txn), Some(&false));
    }
}
