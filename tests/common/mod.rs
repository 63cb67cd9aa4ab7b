// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use bbbank::application::{BankService, OpenAccount};
use bbbank::config::DEFAULT_CHART_ACCOUNT;
use bbbank::domain::{Account, AccountId, Cents};
use bbbank::storage::Repository;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService<Repository>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BankService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn demo_account_id() -> AccountId {
    AccountId::parse_str(DEFAULT_CHART_ACCOUNT).unwrap()
}

/// Open an account with the given balance, opened at `opened_at`.
pub async fn open_account<S: bbbank::storage::LedgerStore>(
    service: &BankService<S>,
    id: Option<AccountId>,
    opening_balance: Cents,
    opened_at: DateTime<Utc>,
) -> Result<Account> {
    Ok(service
        .open_account(OpenAccount {
            id,
            title: "Checking".into(),
            owner: "Jane Doe".into(),
            currency: "USD".into(),
            opening_balance,
            opened_at: Some(opened_at),
        })
        .await?)
}

/// Open the demo account two years ago with no transactions.
pub async fn open_demo_account<S: bbbank::storage::LedgerStore>(
    service: &BankService<S>,
    balance: Cents,
) -> Result<Account> {
    open_account(
        service,
        Some(demo_account_id()),
        balance,
        Utc::now() - Duration::days(730),
    )
    .await
}
