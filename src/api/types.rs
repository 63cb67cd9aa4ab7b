//! JSON shapes exchanged between the HTTP API and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::BalanceSeries;
use crate::domain::{Account, AccountId, Cents, Transaction, TransactionId};

/// One chart point: period label and the balance (in cents) at its end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePointResponse {
    pub label: String,
    pub balance: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSeriesResponse {
    pub account_id: AccountId,
    pub currency: String,
    pub total_balance: Cents,
    /// Oldest first
    pub points: Vec<BalancePointResponse>,
}

impl From<BalanceSeries> for BalanceSeriesResponse {
    fn from(series: BalanceSeries) -> Self {
        Self {
            account_id: series.account_id,
            currency: series.currency,
            total_balance: series.total_balance,
            points: series
                .points
                .into_iter()
                .map(|p| BalancePointResponse {
                    label: p.label,
                    balance: p.balance,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: AccountId,
    pub title: String,
    pub owner: String,
    pub currency: String,
    pub current_balance: Cents,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            title: account.title,
            owner: account.owner,
            currency: account.currency,
            current_balance: account.current_balance,
            opened_at: account.opened_at,
            closed_at: account.closed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
    pub balance_after: Cents,
    pub description: Option<String>,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            amount: transaction.amount,
            timestamp: transaction.timestamp,
            balance_after: transaction.balance_after,
            description: transaction.description,
        }
    }
}
