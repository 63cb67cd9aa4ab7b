use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use crate::domain::{sort_ledger, Account, AccountId, Cents, Transaction};

use super::LedgerStore;

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    transactions: Vec<Transaction>,
    last_sequence: i64,
}

/// In-memory ledger store for tests and demos. Can be switched into an
/// "unavailable" mode where every call fails, to exercise store outages.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory store is unavailable");
        }
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl LedgerStore for MemoryStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.state()?.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let mut state = self.state()?;
        if state.accounts.contains_key(&account.id) {
            bail!("account {} already stored", account.id);
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn close_account(&self, id: AccountId, closed_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state()?;
        if let Some(account) = state.accounts.get_mut(&id) {
            account.closed_at.get_or_insert(closed_at);
        }
        Ok(())
    }

    async fn list_transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .state()?
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        sort_ledger(&mut transactions);
        Ok(transactions)
    }

    async fn last_transaction(&self, account_id: AccountId) -> Result<Option<Transaction>> {
        let transactions = self.list_transactions(account_id).await?;
        Ok(transactions.into_iter().last())
    }

    async fn append_transaction(
        &self,
        transaction: &mut Transaction,
        expected_balance: Cents,
    ) -> Result<()> {
        let mut state = self.state()?;
        let account = state
            .accounts
            .get_mut(&transaction.account_id)
            .ok_or_else(|| anyhow!("account {} not stored", transaction.account_id))?;

        if account.current_balance != expected_balance {
            bail!(
                "Balance of account {} changed while recording a transaction",
                transaction.account_id
            );
        }
        account.current_balance = transaction.balance_after;

        state.last_sequence += 1;
        transaction.sequence = state.last_sequence;
        state.transactions.push(transaction.clone());
        Ok(())
    }
}
