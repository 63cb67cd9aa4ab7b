use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{BalanceSeries, BankService};
use crate::domain::{format_cents, Account, AccountId, Transaction};
use crate::storage::LedgerStore;

/// Full dump of the ledger for backups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to CSV or JSON.
pub struct Exporter<'a, S> {
    service: &'a BankService<S>,
}

impl<'a, S: LedgerStore> Exporter<'a, S> {
    pub fn new(service: &'a BankService<S>) -> Self {
        Self { service }
    }

    /// Export an account's monthly balance series to CSV.
    pub async fn export_series_csv<W: Write>(
        &self,
        account_id: AccountId,
        months: i64,
        writer: W,
    ) -> Result<usize> {
        let series = self.service.get_balance_series(account_id, months).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["label", "period_start", "as_of", "balance_cents", "balance"])?;

        for point in &series.points {
            csv_writer.write_record([
                point.label.clone(),
                point.period_start.to_rfc3339(),
                point.as_of.to_rfc3339(),
                point.balance.to_string(),
                format_cents(point.balance),
            ])?;
        }

        csv_writer.flush()?;
        Ok(series.points.len())
    }

    /// Export an account's monthly balance series as JSON.
    pub async fn export_series_json<W: Write>(
        &self,
        account_id: AccountId,
        months: i64,
        mut writer: W,
    ) -> Result<BalanceSeries> {
        let series = self.service.get_balance_series(account_id, months).await?;
        serde_json::to_writer_pretty(&mut writer, &series)?;
        writer.flush()?;
        Ok(series)
    }

    /// Export an account's transactions to CSV, in ledger order.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        account_id: AccountId,
        writer: W,
    ) -> Result<usize> {
        let transactions = self.service.list_transactions(account_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "sequence",
            "timestamp",
            "amount_cents",
            "balance_after_cents",
            "description",
        ])?;

        for transaction in &transactions {
            csv_writer.write_record([
                transaction.id.to_string(),
                transaction.sequence.to_string(),
                transaction.timestamp.to_rfc3339(),
                transaction.amount.to_string(),
                transaction.balance_after.to_string(),
                transaction.description.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export every account and transaction as a JSON snapshot.
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let accounts = self.service.list_accounts().await?;
        let mut transactions = Vec::new();
        for account in &accounts {
            transactions.extend(self.service.list_transactions(account.id).await?);
        }

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            transactions,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(snapshot)
    }
}
