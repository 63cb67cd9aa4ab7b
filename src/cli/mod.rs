use std::fs::File;
use std::io::{self, Write};
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::api;
use crate::application::{parse_account_id, AppError, BankService, OpenAccount};
use crate::client::{ApiClient, BalanceChart, ChartState};
use crate::config::{
    ClientConfig, ServerConfig, DEFAULT_ALLOWED_ORIGIN, DEFAULT_CHART_ACCOUNT,
    DEFAULT_CHART_MONTHS,
};
use crate::domain::{format_cents, parse_cents, PeriodType};
use crate::io::Exporter;
use crate::logging::{self, LogFormat};
use crate::storage::Repository;

/// BBBank - minimal banking ledger with a balance history API
#[derive(Parser)]
#[command(name = "bbbank")]
#[command(about = "A minimal banking ledger serving monthly balance histories")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "BBBANK_DATABASE", default_value = "bbbank.db")]
    pub database: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format: pretty, compact
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "BBBANK_BIND", default_value = "127.0.0.1:5070")]
        bind: SocketAddr,

        /// Origins allowed to call the API from a browser (comma separated)
        #[arg(
            long = "allow-origin",
            env = "BBBANK_ALLOWED_ORIGINS",
            value_delimiter = ',',
            default_value = DEFAULT_ALLOWED_ORIGIN
        )]
        allowed_origins: Vec<String>,
    },

    /// Create the demo account used by the balance chart
    Seed {
        /// Also record a year of monthly salary and rent transactions
        #[arg(long)]
        history: bool,
    },

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Record a deposit (positive) or withdrawal (negative amount)
    Record {
        /// Account ID
        account: String,

        /// Amount (e.g., "50.00" or "-12.5")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Description of the transaction
        #[arg(short, long)]
        description: Option<String>,

        /// Date of the transaction (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List an account's transactions
    Transactions {
        /// Account ID
        account: String,
    },

    /// Show the trailing balance history of an account
    Balances {
        /// Account ID
        account: String,

        /// Number of periods
        #[arg(short = 'n', long, default_value_t = 12)]
        periods: i64,

        /// Period: weekly, monthly, yearly
        #[arg(long, default_value = "monthly")]
        period: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Verify ledger integrity
    Check {
        /// Only check this account
        #[arg(long)]
        account: Option<String>,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: series, transactions, snapshot
        export_type: String,

        /// Account ID (required for series and transactions)
        #[arg(long)]
        account: Option<String>,

        /// Number of months for series
        #[arg(long, default_value_t = 12)]
        months: i64,

        /// Format: csv, json (defaults to csv, json for snapshot)
        #[arg(short, long)]
        format: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Load the balance chart from a running API and print its dataset
    Chart {
        /// Base URL of the API
        #[arg(long, env = "BBBANK_API_URL", default_value = "http://127.0.0.1:5070/api/")]
        api_url: String,

        /// Account ID
        #[arg(long, default_value = DEFAULT_CHART_ACCOUNT)]
        account: String,

        /// Number of months
        #[arg(long, default_value_t = DEFAULT_CHART_MONTHS)]
        months: u32,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account title
        title: String,

        /// Account holder
        #[arg(long)]
        owner: String,

        /// Currency code (e.g., USD, EUR)
        #[arg(short, long, default_value = "USD")]
        currency: String,

        /// Opening balance (e.g., "100.00")
        #[arg(long, allow_hyphen_values = true)]
        balance: Option<String>,

        /// Use this ID instead of generating one
        #[arg(long)]
        id: Option<String>,
    },

    /// List all accounts
    List,

    /// Show account details
    Show {
        /// Account ID
        id: String,
    },

    /// Close an account (history is kept)
    Close {
        /// Account ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let log_format = LogFormat::from_str(&self.log_format)
            .with_context(|| format!("Unknown log format '{}'", self.log_format))?;
        logging::init(self.verbose, log_format)?;

        match self.command {
            Commands::Init => {
                BankService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Serve {
                bind,
                allowed_origins,
            } => {
                let service = BankService::init(&self.database).await?;
                service.store().ping().await?;
                let config = ServerConfig {
                    bind,
                    allowed_origins,
                };
                api::serve(service, &config).await?;
            }

            Commands::Seed { history } => {
                let service = BankService::init(&self.database).await?;
                run_seed_command(&service, history).await?;
            }

            Commands::Account(account_cmd) => {
                let service = BankService::connect(&self.database).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Record {
                account,
                amount,
                description,
                date,
            } => {
                let service = BankService::connect(&self.database).await?;
                let account_id = parse_account_id(&account)?;
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '-50'")?;
                let timestamp = match date {
                    Some(date_str) => parse_date(&date_str)?,
                    None => Utc::now(),
                };

                let transaction = service
                    .record_transaction(account_id, amount, timestamp, description)
                    .await?;
                println!(
                    "Recorded {} on {} (balance {}, {})",
                    format_cents(transaction.amount),
                    transaction.timestamp.format("%Y-%m-%d"),
                    format_cents(transaction.balance_after),
                    transaction.id
                );
            }

            Commands::Transactions { account } => {
                let service = BankService::connect(&self.database).await?;
                run_transactions_command(&service, &account).await?;
            }

            Commands::Balances {
                account,
                periods,
                period,
                format,
            } => {
                let service = BankService::connect(&self.database).await?;
                run_balances_command(&service, &account, periods, &period, &format).await?;
            }

            Commands::Check { account } => {
                let service = BankService::connect(&self.database).await?;
                run_check_command(&service, account.as_deref()).await?;
            }

            Commands::Export {
                export_type,
                account,
                months,
                format,
                output,
            } => {
                let service = BankService::connect(&self.database).await?;
                run_export_command(
                    &service,
                    &export_type,
                    account.as_deref(),
                    months,
                    format.as_deref(),
                    output.as_deref(),
                )
                .await?;
            }

            Commands::Chart {
                api_url,
                account,
                months,
            } => {
                let config = ClientConfig::new(api_url)
                    .with_account(parse_account_id(&account)?)
                    .with_months(months);
                run_chart_command(&config).await?;
            }
        }

        Ok(())
    }
}

/// Open the demo account, optionally with a year of history.
pub async fn run_seed_command(service: &BankService<Repository>, history: bool) -> Result<()> {
    let account_id = parse_account_id(DEFAULT_CHART_ACCOUNT)?;
    let now = Utc::now();
    let opening_balance = if history { 0 } else { 350_000 };

    let result = service
        .open_account(OpenAccount {
            id: Some(account_id),
            title: "Demo Checking".into(),
            owner: "Demo Customer".into(),
            currency: "USD".into(),
            opening_balance,
            opened_at: Some(now - Duration::days(400)),
        })
        .await;

    match result {
        Ok(account) => println!("Opened demo account {}", account.id),
        Err(AppError::AccountAlreadyExists(_)) => {
            println!("Demo account {} already exists", account_id);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    if history {
        let mut period = PeriodType::Monthly
            .period_containing(now)
            .context("Current date is out of range")?;
        let mut month_starts = vec![period.start];
        for _ in 1..12 {
            period = period.previous().context("Date out of range")?;
            month_starts.push(period.start);
        }
        month_starts.reverse();

        let mut count = 0;
        for start in month_starts {
            for (day, amount, description) in [
                (0, 420_000, "Salary"),
                (2, -150_000, "Rent"),
                (14, -85_000, "Card payments"),
            ] {
                let timestamp = start + Duration::days(day) + Duration::hours(9);
                if timestamp > now {
                    continue;
                }
                service
                    .record_transaction(account_id, amount, timestamp, Some(description.into()))
                    .await?;
                count += 1;
            }
        }
        println!("Recorded {} transactions", count);
    }

    Ok(())
}

async fn run_account_command(service: &BankService<Repository>, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            title,
            owner,
            currency,
            balance,
            id,
        } => {
            let opening_balance = balance
                .map(|b| parse_cents(&b))
                .transpose()
                .context("Invalid opening balance")?
                .unwrap_or(0);
            let id = id.map(|s| parse_account_id(&s)).transpose()?;

            let account = service
                .open_account(OpenAccount {
                    id,
                    title,
                    owner,
                    currency,
                    opening_balance,
                    opened_at: None,
                })
                .await?;
            println!(
                "Opened account: {} ({}, {} {})",
                account.title,
                account.id,
                format_cents(account.current_balance),
                account.currency
            );
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<38} {:<20} {:>14} {:<8} STATUS",
                    "ID", "TITLE", "BALANCE", "CURRENCY"
                );
                println!("{}", "-".repeat(90));
                for account in accounts {
                    println!(
                        "{:<38} {:<20} {:>14} {:<8} {}",
                        account.id,
                        truncate(&account.title, 20),
                        format_cents(account.current_balance),
                        account.currency,
                        if account.is_closed() { "closed" } else { "open" }
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(parse_account_id(&id)?).await?;
            let transactions = service.list_transactions(account.id).await?;

            println!("Account:  {}", account.title);
            println!("ID:       {}", account.id);
            println!("Owner:    {}", account.owner);
            println!(
                "Balance:  {} {}",
                format_cents(account.current_balance),
                account.currency
            );
            println!("Opened:   {}", account.opened_at.format("%Y-%m-%d"));
            if let Some(closed_at) = account.closed_at {
                println!("Closed:   {}", closed_at.format("%Y-%m-%d"));
            }
            println!("Transactions: {}", transactions.len());
            if let Some(last) = transactions.last() {
                println!("Last activity: {}", last.timestamp.format("%Y-%m-%d %H:%M"));
            }
        }

        AccountCommands::Close { id } => {
            let account = service.close_account(parse_account_id(&id)?).await?;
            println!(
                "Closed account: {} (final balance {})",
                account.title,
                format_cents(account.current_balance)
            );
        }
    }
    Ok(())
}

async fn run_transactions_command(service: &BankService<Repository>, account: &str) -> Result<()> {
    let transactions = service.list_transactions(parse_account_id(account)?).await?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<12} {:<10} {:>12} {:>14} DESCRIPTION",
        "DATE", "TYPE", "AMOUNT", "BALANCE"
    );
    println!("{}", "-".repeat(72));
    for transaction in &transactions {
        println!(
            "{:<12} {:<10} {:>12} {:>14} {}",
            transaction.timestamp.format("%Y-%m-%d"),
            if transaction.is_deposit() { "deposit" } else { "withdrawal" },
            format_cents(transaction.amount),
            format_cents(transaction.balance_after),
            truncate(transaction.description.as_deref().unwrap_or(""), 30)
        );
    }
    Ok(())
}

async fn run_balances_command(
    service: &BankService<Repository>,
    account: &str,
    periods: i64,
    period: &str,
    format: &str,
) -> Result<()> {
    let period_type = PeriodType::from_str(period)
        .with_context(|| format!("Unknown period '{}'. Use weekly, monthly or yearly", period))?;
    let series = service
        .get_balance_series_at(parse_account_id(account)?, period_type, periods, Utc::now())
        .await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&series)?),
        "table" => {
            println!("{:<12} {:>14}", "PERIOD", "BALANCE");
            println!("{}", "-".repeat(27));
            for point in &series.points {
                println!("{:<12} {:>14}", point.label, format_cents(point.balance));
            }
            println!("{}", "-".repeat(27));
            println!(
                "{:<12} {:>14} {}",
                "Current",
                format_cents(series.total_balance),
                series.currency
            );
        }
        other => bail!("Unknown format '{}'. Use table or json", other),
    }
    Ok(())
}

async fn run_check_command(service: &BankService<Repository>, account: Option<&str>) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let reports = match account {
        Some(id) => vec![service.verify_account(parse_account_id(id)?).await?],
        None => service.verify_all().await?,
    };
    let mut issues = 0;

    for report in &reports {
        if report.is_consistent() {
            println!(
                "✓ {} ({} transactions, balance {})",
                report.account_id,
                report.transaction_count,
                format_cents(report.current_balance)
            );
        } else {
            println!("✗ {}", report.account_id);
            for mismatch in &report.mismatches {
                println!(
                    "    transaction {}: expected {}, recorded {}",
                    mismatch.transaction_id,
                    format_cents(mismatch.expected),
                    format_cents(mismatch.recorded)
                );
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("Accounts checked: {}. No issues found.", reports.len());
        Ok(())
    } else {
        bail!("Found {} ledger inconsistencies", issues)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportKind {
    SeriesCsv,
    SeriesJson,
    TransactionsCsv,
    SnapshotJson,
}

impl ExportKind {
    fn parse(export_type: &str, format: Option<&str>) -> Result<Self> {
        let default_format = if export_type == "snapshot" { "json" } else { "csv" };
        match (export_type, format.unwrap_or(default_format)) {
            ("series", "csv") => Ok(Self::SeriesCsv),
            ("series", "json") => Ok(Self::SeriesJson),
            ("transactions", "csv") => Ok(Self::TransactionsCsv),
            ("snapshot", "json") => Ok(Self::SnapshotJson),
            (kind, fmt) => bail!("Unsupported export: {} as {}", kind, fmt),
        }
    }

    fn needs_account(self) -> bool {
        !matches!(self, Self::SnapshotJson)
    }
}

async fn run_export_command(
    service: &BankService<Repository>,
    export_type: &str,
    account: Option<&str>,
    months: i64,
    format: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    // Everything is validated before the output file is touched.
    let kind = ExportKind::parse(export_type, format)?;
    let account_id = if kind.needs_account() {
        let account = account.context("--account is required for this export")?;
        Some(service.get_account(parse_account_id(account)?).await?.id)
    } else {
        None
    };

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file: {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };
    let exporter = Exporter::new(service);

    match (kind, account_id) {
        (ExportKind::SeriesCsv, Some(account_id)) => {
            let count = exporter.export_series_csv(account_id, months, writer).await?;
            eprintln!("Exported {} balance points", count);
        }
        (ExportKind::SeriesJson, Some(account_id)) => {
            let series = exporter
                .export_series_json(account_id, months, writer)
                .await?;
            eprintln!("Exported {} balance points", series.points.len());
        }
        (ExportKind::TransactionsCsv, Some(account_id)) => {
            let count = exporter
                .export_transactions_csv(account_id, writer)
                .await?;
            eprintln!("Exported {} transactions", count);
        }
        (ExportKind::SnapshotJson, _) => {
            let snapshot = exporter.export_snapshot_json(writer).await?;
            eprintln!(
                "Exported {} accounts and {} transactions",
                snapshot.accounts.len(),
                snapshot.transactions.len()
            );
        }
        (_, None) => bail!("--account is required for this export"),
    }
    Ok(())
}

async fn run_chart_command(config: &ClientConfig) -> Result<()> {
    let client = ApiClient::new(&config.api_url)?;
    let mut chart = BalanceChart::new(config);
    chart.init(&client).await;

    if chart.state() != ChartState::Loaded {
        println!("No chart data.");
        return Ok(());
    }

    let data = chart.data();
    for (label, figure) in data.labels.iter().zip(&data.figures) {
        println!("{:<10} {:>14.2}", label, figure);
    }
    println!("{:<10} {:>14.2}", "Total", data.total_balance);
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("Invalid date '{}'", date_str))
}
