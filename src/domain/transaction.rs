use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

/// A single posting against one account. Transactions are immutable once
/// recorded; the ledger is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// Store-wide ordering; breaks ties between equal timestamps
    pub sequence: i64,
    /// Signed amount: positive for deposits, negative for withdrawals
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
    /// Running balance of the account right after this transaction
    pub balance_after: Cents,
    pub description: Option<String>,
}

impl Transaction {
    /// Create a new transaction. Sequence number must be assigned by the store.
    pub fn new(
        account_id: AccountId,
        amount: Cents,
        balance_after: Cents,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            sequence: 0,
            amount,
            timestamp,
            balance_after,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_deposit(&self) -> bool {
        self.amount > 0
    }
}
