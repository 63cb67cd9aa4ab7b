use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::{
    balance_series, verify_ledger, Account, AccountId, BalancePoint, Cents, LedgerReport,
    PeriodType, Transaction,
};
use crate::storage::{LedgerStore, Repository};

use super::AppError;

/// Application service providing the banking use cases.
/// This is the primary interface for any client (HTTP API, CLI, tests).
pub struct BankService<S> {
    store: S,
}

/// Parameters for opening an account
#[derive(Debug, Clone, Default)]
pub struct OpenAccount {
    /// Use a fixed ID instead of generating one
    pub id: Option<AccountId>,
    pub title: String,
    pub owner: String,
    pub currency: String,
    pub opening_balance: Cents,
    pub opened_at: Option<DateTime<Utc>>,
}

/// A trailing balance history of one account, oldest point first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSeries {
    pub account_id: AccountId,
    pub currency: String,
    pub period_type: PeriodType,
    /// Current balance of the account
    pub total_balance: Cents,
    pub points: Vec<BalancePoint>,
}

/// Parse an account identifier supplied by a caller.
pub fn parse_account_id(input: &str) -> Result<AccountId, AppError> {
    AccountId::parse_str(input.trim())
        .map_err(|_| AppError::InvalidArgument(format!("malformed account id '{}'", input)))
}

impl BankService<Repository> {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }
}

impl<S: LedgerStore> BankService<S> {
    /// Create a new service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn open_account(&self, request: OpenAccount) -> Result<Account, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "account title must not be empty".to_string(),
            ));
        }
        if let Some(id) = request.id {
            if self.store.get_account(id).await?.is_some() {
                return Err(AppError::AccountAlreadyExists(id.to_string()));
            }
        }

        let mut account = Account::new(request.title, request.owner, request.currency)
            .with_opening_balance(request.opening_balance);
        if let Some(id) = request.id {
            account = account.with_id(id);
        }
        if let Some(opened_at) = request.opened_at {
            account = account.with_opened_at(opened_at);
        }
        account.opened_at = account.opened_at.trunc_subsecs(6);

        self.store.save_account(&account).await?;
        info!(account_id = %account.id, balance = account.current_balance, "account opened");
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// List all accounts, including closed ones.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.store.list_accounts().await?)
    }

    /// Close an account. Its history stays readable.
    pub async fn close_account(&self, id: AccountId) -> Result<Account, AppError> {
        let account = self.get_account(id).await?;
        if account.is_closed() {
            return Err(AppError::AccountClosed(id.to_string()));
        }

        self.store.close_account(id, Utc::now()).await?;
        info!(account_id = %id, "account closed");
        self.get_account(id).await
    }

    // ========================
    // Ledger operations
    // ========================

    /// Record a deposit (positive amount) or withdrawal (negative amount).
    ///
    /// Transactions must be recorded in time order: a timestamp earlier than
    /// the account's latest transaction, or its opening date, is rejected.
    #[instrument(skip(self, description))]
    pub async fn record_transaction(
        &self,
        account_id: AccountId,
        amount: Cents,
        timestamp: DateTime<Utc>,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        if amount == 0 {
            return Err(AppError::InvalidArgument(
                "transaction amount must not be zero".to_string(),
            ));
        }
        let timestamp = timestamp.trunc_subsecs(6);

        let account = self.get_account(account_id).await?;
        if account.is_closed() {
            return Err(AppError::AccountClosed(account_id.to_string()));
        }
        if timestamp < account.opened_at {
            return Err(AppError::InvalidArgument(format!(
                "transaction at {} precedes account opening at {}",
                timestamp, account.opened_at
            )));
        }
        if let Some(last) = self.store.last_transaction(account_id).await? {
            if timestamp < last.timestamp {
                return Err(AppError::InvalidArgument(format!(
                    "transaction at {} precedes the latest transaction at {}",
                    timestamp, last.timestamp
                )));
            }
        }

        let balance_after = account
            .current_balance
            .checked_add(amount)
            .ok_or_else(|| AppError::InvalidArgument("balance out of range".to_string()))?;

        let mut transaction = Transaction::new(account_id, amount, balance_after, timestamp);
        if let Some(desc) = description {
            transaction = transaction.with_description(desc);
        }

        self.store
            .append_transaction(&mut transaction, account.current_balance)
            .await?;

        info!(
            transaction_id = %transaction.id,
            balance_after,
            "transaction recorded"
        );
        Ok(transaction)
    }

    /// List an account's transactions in ledger order.
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.get_account(account_id).await?;
        Ok(self.store.list_transactions(account_id).await?)
    }

    // ========================
    // Balance history
    // ========================

    /// Balances at the end of each of the last `period_count` calendar months,
    /// ending at the current instant. Oldest first.
    pub async fn get_balance_series(
        &self,
        account_id: AccountId,
        period_count: i64,
    ) -> Result<BalanceSeries, AppError> {
        self.get_balance_series_at(account_id, PeriodType::Monthly, period_count, Utc::now())
            .await
    }

    /// Balance history sampled over `period_count` trailing periods ending at `now`.
    #[instrument(skip(self))]
    pub async fn get_balance_series_at(
        &self,
        account_id: AccountId,
        period_type: PeriodType,
        period_count: i64,
        now: DateTime<Utc>,
    ) -> Result<BalanceSeries, AppError> {
        if period_count <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "period count must be positive, got {}",
                period_count
            )));
        }

        let account = self.get_account(account_id).await?;
        let transactions = self.store.list_transactions(account_id).await?;
        let points = balance_series(&account, &transactions, period_type, period_count, now)?;

        debug!(
            points = points.len(),
            transactions = transactions.len(),
            "balance series computed"
        );

        Ok(BalanceSeries {
            account_id,
            currency: account.currency,
            period_type,
            total_balance: account.current_balance,
            points,
        })
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check one account's ledger against its running-balance snapshots.
    pub async fn verify_account(&self, account_id: AccountId) -> Result<LedgerReport, AppError> {
        let account = self.get_account(account_id).await?;
        let transactions = self.store.list_transactions(account_id).await?;
        Ok(verify_ledger(&account, &transactions))
    }

    /// Check every account's ledger.
    pub async fn verify_all(&self) -> Result<Vec<LedgerReport>, AppError> {
        let mut reports = Vec::new();
        for account in self.store.list_accounts().await? {
            let transactions = self.store.list_transactions(account.id).await?;
            reports.push(verify_ledger(&account, &transactions));
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::storage::MemoryStore;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn service_with_account(opening_balance: Cents) -> (BankService<MemoryStore>, Account) {
        let service = BankService::new(MemoryStore::new());
        let account = service
            .open_account(OpenAccount {
                title: "Checking".into(),
                owner: "Jane Doe".into(),
                currency: "USD".into(),
                opening_balance,
                opened_at: Some(at("2023-01-01T00:00:00Z")),
                ..Default::default()
            })
            .await
            .unwrap();
        (service, account)
    }

    #[test]
    fn test_parse_account_id() {
        assert!(parse_account_id("37846734-172e-4149-8cec-6f43d1eb3f60").is_ok());
        assert!(matches!(
            parse_account_id("not-a-uuid"),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_series_for_unknown_account_is_not_found() {
        let (service, _) = service_with_account(0).await;
        let result = service.get_balance_series(AccountId::new_v4(), 3).await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_series_rejects_zero_and_negative_counts() {
        let (service, account) = service_with_account(0).await;

        for count in [0, -1] {
            let result = service.get_balance_series(account.id, count).await;
            assert!(matches!(result, Err(AppError::InvalidArgument(_))));
        }
    }

    #[tokio::test]
    async fn test_series_reports_current_balance() {
        let (service, account) = service_with_account(1_000).await;
        service
            .record_transaction(account.id, 500, at("2024-03-10T00:00:00Z"), None)
            .await
            .unwrap();

        let series = service
            .get_balance_series_at(account.id, PeriodType::Monthly, 3, at("2024-04-15T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(series.total_balance, 1_500);
        assert_eq!(series.currency, "USD");
        let balances: Vec<Cents> = series.points.iter().map(|p| p.balance).collect();
        assert_eq!(balances, vec![1_000, 1_500, 1_500]);
    }

    #[tokio::test]
    async fn test_record_rejects_zero_amount() {
        let (service, account) = service_with_account(0).await;
        let result = service
            .record_transaction(account.id, 0, Utc::now(), None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_record_rejects_back_dated_transaction() {
        let (service, account) = service_with_account(0).await;
        let now = Utc::now();
        service
            .record_transaction(account.id, 100, now, None)
            .await
            .unwrap();

        let result = service
            .record_transaction(account.id, 100, now - Duration::hours(1), None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));

        let result = service
            .record_transaction(account.id, 100, at("2022-06-01T00:00:00Z"), None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_closed_account_refuses_writes_but_serves_history() {
        let (service, account) = service_with_account(700).await;
        service.close_account(account.id).await.unwrap();

        let write = service
            .record_transaction(account.id, 100, Utc::now(), None)
            .await;
        assert!(matches!(write, Err(AppError::AccountClosed(_))));
        assert!(matches!(
            service.close_account(account.id).await,
            Err(AppError::AccountClosed(_))
        ));

        let series = service.get_balance_series(account.id, 2).await.unwrap();
        assert!(series.points.iter().all(|p| p.balance == 700));
    }

    #[tokio::test]
    async fn test_open_account_with_duplicate_id() {
        let (service, account) = service_with_account(0).await;
        let result = service
            .open_account(OpenAccount {
                id: Some(account.id),
                title: "Other".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::AccountAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_store_error() {
        let (service, account) = service_with_account(0).await;
        service.store().set_unavailable(true);

        let result = service.get_balance_series(account.id, 3).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_verify_after_recording() {
        let (service, account) = service_with_account(250).await;
        for amount in [1_000, -300, 45] {
            service
                .record_transaction(account.id, amount, Utc::now(), None)
                .await
                .unwrap();
        }

        let report = service.verify_account(account.id).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.opening_balance, 250);
        assert_eq!(report.current_balance, 995);
        assert_eq!(service.verify_all().await.unwrap().len(), 1);
    }
}
