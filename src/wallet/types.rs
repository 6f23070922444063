use crate::error::DomainError;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Reservation,
    ReservationCommit,
    ReservationRelease,
    BetWin,
    BetLoss,
    BetRefund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub status: TransactionStatus,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub reference_id: Option<String>,
    pub error_message: Option<String>,
}

/// Outcome of a wallet operation. Failures are data (spec §4.2: "all failures
/// are returned as `{ success:false, errorMessage }`, not raised").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub success: bool,
    pub transaction: Option<WalletTransaction>,
    pub error_message: Option<String>,
}

impl TransactionResult {
    pub fn ok(transaction: WalletTransaction) -> Self {
        TransactionResult {
            success: true,
            transaction: Some(transaction),
            error_message: None,
        }
    }

    pub fn err(error: DomainError) -> Self {
        TransactionResult {
            success: false,
            transaction: None,
            error_message: Some(error.to_string()),
        }
    }
}
