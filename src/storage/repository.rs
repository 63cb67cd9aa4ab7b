use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{Account, AccountId, Cents, Transaction};

use super::{LedgerStore, MIGRATION_001_INITIAL};

const ACCOUNT_COLUMNS: &str = "id, title, owner, currency, current_balance, opened_at, closed_at";

/// How long a connection waits for another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const TRANSACTION_COLUMNS: &str =
    "id, sequence, account_id, amount, timestamp, balance_after, description";

/// Encode a timestamp as fixed-width RFC 3339 so that text order is chronological.
pub fn encode_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

/// SQLite-backed ledger store.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL {}", database_url))?
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database {}", database_url))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Check that the database answers queries.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let opened_at_str: String = row.get("opened_at");
        let closed_at_str: Option<String> = row.get("closed_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            title: row.get("title"),
            owner: row.get("owner"),
            currency: row.get("currency"),
            current_balance: row.get("current_balance"),
            opened_at: decode_timestamp(&opened_at_str)?,
            closed_at: closed_at_str.as_deref().map(decode_timestamp).transpose()?,
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let account_str: String = row.get("account_id");
        let timestamp_str: String = row.get("timestamp");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            account_id: Uuid::parse_str(&account_str).context("Invalid account ID")?,
            sequence: row.get("sequence"),
            amount: row.get("amount"),
            timestamp: decode_timestamp(&timestamp_str)?,
            balance_after: row.get("balance_after"),
            description: row.get("description"),
        })
    }
}

impl LedgerStore for Repository {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY opened_at, id",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, title, owner, currency, current_balance, opened_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.title)
        .bind(&account.owner)
        .bind(&account.currency)
        .bind(account.current_balance)
        .bind(encode_timestamp(account.opened_at))
        .bind(account.closed_at.map(encode_timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;

        debug!("account saved");
        Ok(())
    }

    async fn close_account(&self, id: AccountId, closed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE accounts SET closed_at = ? WHERE id = ? AND closed_at IS NULL")
            .bind(encode_timestamp(closed_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to close account")?;
        Ok(())
    }

    async fn list_transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE account_id = ? ORDER BY timestamp, sequence",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn last_transaction(&self, account_id: AccountId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE account_id = ? ORDER BY timestamp DESC, sequence DESC LIMIT 1",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch last transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    #[instrument(skip(self, transaction), fields(account_id = %transaction.account_id, amount = transaction.amount))]
    async fn append_transaction(
        &self,
        transaction: &mut Transaction,
        expected_balance: Cents,
    ) -> Result<()> {
        // Write lock up front: a deferred transaction cannot wait out a lock upgrade.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("Failed to begin database transaction")?;

        let sequence: i64 =
            sqlx::query("SELECT COALESCE(MAX(sequence), 0) + 1 AS next FROM transactions")
                .fetch_one(&mut *tx)
                .await
                .context("Failed to get next sequence number")?
                .get("next");

        // Guard against a concurrent writer having moved the balance since it was read.
        let updated = sqlx::query(
            "UPDATE accounts SET current_balance = ? WHERE id = ? AND current_balance = ?",
        )
        .bind(transaction.balance_after)
        .bind(transaction.account_id.to_string())
        .bind(expected_balance)
        .execute(&mut *tx)
        .await
        .context("Failed to update account balance")?;

        if updated.rows_affected() != 1 {
            bail!(
                "Balance of account {} changed while recording a transaction",
                transaction.account_id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, account_id, amount, timestamp, balance_after, description)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(sequence)
        .bind(transaction.account_id.to_string())
        .bind(transaction.amount)
        .bind(encode_timestamp(transaction.timestamp))
        .bind(transaction.balance_after)
        .bind(&transaction.description)
        .execute(&mut *tx)
        .await
        .context("Failed to save transaction")?;

        tx.commit()
            .await
            .context("Failed to commit transaction")?;

        transaction.sequence = sequence;
        debug!(sequence, "transaction appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    async fn test_repo() -> Result<(Repository, TempDir)> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("ledger.db");
        let repo = Repository::init(&format!("sqlite:{}?mode=rwc", path.display())).await?;
        Ok((repo, temp_dir))
    }

    #[test]
    fn test_encoded_timestamps_sort_chronologically() {
        let early = DateTime::parse_from_rfc3339("2024-01-01T09:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = early + Duration::milliseconds(600);

        assert!(encode_timestamp(early) < encode_timestamp(late));
        assert_eq!(encode_timestamp(early), "2024-01-01T09:00:00.500000Z");
    }

    #[tokio::test]
    async fn test_account_roundtrip() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let account = Account::new("Checking", "Jane Doe", "USD").with_opening_balance(500);

        repo.save_account(&account).await?;
        let loaded = repo.get_account(account.id).await?.unwrap();

        assert_eq!(loaded.title, "Checking");
        assert_eq!(loaded.current_balance, 500);
        assert!(repo.get_account(Uuid::new_v4()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_migrate_is_repeatable() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        repo.migrate().await?;
        repo.ping().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_append_assigns_sequence_and_updates_balance() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let account = Account::new("Checking", "Jane Doe", "USD");
        repo.save_account(&account).await?;

        let mut first = Transaction::new(account.id, 1000, 1000, Utc::now());
        repo.append_transaction(&mut first, 0).await?;
        let mut second = Transaction::new(account.id, -300, 700, Utc::now());
        repo.append_transaction(&mut second, 1000).await?;

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(repo.get_account(account.id).await?.unwrap().current_balance, 700);

        let last = repo.last_transaction(account.id).await?.unwrap();
        assert_eq!(last.id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_rejects_stale_balance() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let account = Account::new("Checking", "Jane Doe", "USD");
        repo.save_account(&account).await?;

        let mut tx = Transaction::new(account.id, 1000, 1000, Utc::now());
        assert!(repo.append_transaction(&mut tx, 42).await.is_err());
        assert!(repo.list_transactions(account.id).await?.is_empty());
        assert_eq!(repo.get_account(account.id).await?.unwrap().current_balance, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transactions_are_immutable() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let account = Account::new("Checking", "Jane Doe", "USD");
        repo.save_account(&account).await?;
        let mut tx = Transaction::new(account.id, 1000, 1000, Utc::now());
        repo.append_transaction(&mut tx, 0).await?;

        let update = sqlx::query("UPDATE transactions SET amount = 1")
            .execute(&repo.pool)
            .await;
        let delete = sqlx::query("DELETE FROM accounts").execute(&repo.pool).await;

        assert!(update.is_err());
        assert!(delete.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_transactions_in_ledger_order() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let account = Account::new("Checking", "Jane Doe", "USD");
        repo.save_account(&account).await?;

        let base = Utc::now() - Duration::days(10);
        let mut balance = 0;
        for (offset, amount) in [(0, 100), (3, 200), (3, -50)] {
            let mut tx = Transaction::new(
                account.id,
                amount,
                balance + amount,
                base + Duration::days(offset),
            );
            repo.append_transaction(&mut tx, balance).await?;
            balance += amount;
        }

        let txs = repo.list_transactions(account.id).await?;
        let amounts: Vec<Cents> = txs.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![100, 200, -50]);
        assert_eq!(txs[2].balance_after, 250);
        Ok(())
    }

    #[tokio::test]
    async fn test_close_account_keeps_history() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let account = Account::new("Checking", "Jane Doe", "USD");
        repo.save_account(&account).await?;
        let mut tx = Transaction::new(account.id, 1000, 1000, Utc::now());
        repo.append_transaction(&mut tx, 0).await?;

        repo.close_account(account.id, Utc::now()).await?;

        let closed = repo.get_account(account.id).await?.unwrap();
        assert!(closed.is_closed());
        assert_eq!(repo.list_transactions(account.id).await?.len(), 1);
        assert_eq!(repo.list_accounts().await?.len(), 1);
        Ok(())
    }
}
