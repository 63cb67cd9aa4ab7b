mod memory;
mod repository;

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::{Account, AccountId, Cents, Transaction};

pub use memory::MemoryStore;
pub use repository::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Persistence boundary for accounts and their ledgers.
///
/// Every query returns fully materialized data. Transactions are always
/// returned in ledger order: by timestamp, then by sequence.
pub trait LedgerStore: Send + Sync + 'static {
    /// Get an account by ID.
    fn get_account(&self, id: AccountId) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// List all accounts, including closed ones, ordered by opening date.
    fn list_accounts(&self) -> impl Future<Output = Result<Vec<Account>>> + Send;

    /// Insert a new account.
    fn save_account(&self, account: &Account) -> impl Future<Output = Result<()>> + Send;

    /// Mark an account as closed. History is retained.
    fn close_account(
        &self,
        id: AccountId,
        closed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All transactions of an account in ledger order.
    fn list_transactions(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<Transaction>>> + Send;

    /// The latest transaction of an account in ledger order.
    fn last_transaction(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Option<Transaction>>> + Send;

    /// Append a transaction and move the account's current balance from
    /// `expected_balance` to `transaction.balance_after` in one atomic step.
    /// Assigns the sequence number. Fails if the balance is no longer
    /// `expected_balance`.
    fn append_transaction(
        &self,
        transaction: &mut Transaction,
        expected_balance: Cents,
    ) -> impl Future<Output = Result<()>> + Send;
}
