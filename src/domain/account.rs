use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// A bank account. The balance only changes through recorded transactions,
/// and closed accounts keep their full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub title: String,
    /// Name of the account holder
    pub owner: String,
    pub currency: String,
    /// Balance after the latest recorded transaction
    pub current_balance: Cents,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(title: impl Into<String>, owner: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            owner: owner.into(),
            currency: currency.into(),
            current_balance: 0,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = id;
        self
    }

    /// Set the balance the account is opened with (before any transaction).
    pub fn with_opening_balance(mut self, balance: Cents) -> Self {
        self.current_balance = balance;
        self
    }

    pub fn with_opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = opened_at;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_open_and_empty() {
        let account = Account::new("Checking", "Jane Doe", "USD");
        assert_eq!(account.current_balance, 0);
        assert!(!account.is_closed());
    }

    #[test]
    fn test_builders() {
        let id = Uuid::new_v4();
        let account = Account::new("Savings", "Jane Doe", "EUR")
            .with_id(id)
            .with_opening_balance(25_000);

        assert_eq!(account.id, id);
        assert_eq!(account.current_balance, 25_000);
        assert_eq!(account.currency, "EUR");
    }
}
