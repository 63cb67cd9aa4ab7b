//! Trailing balance history sampled over calendar periods.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{opening_balance, Account, Cents, PeriodType, Transaction};

/// Upper bound on the number of buckets a single series may request.
pub const MAX_PERIODS: i64 = 1200;

/// The balance of an account at the end of one period. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub label: String,
    pub period_start: DateTime<Utc>,
    /// Instant the balance was sampled at: the period end, or "now" for the
    /// current period
    pub as_of: DateTime<Utc>,
    pub balance: Cents,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("period count must be positive, got {0}")]
    NonPositivePeriodCount(i64),

    #[error("period count {0} exceeds the maximum of {max}", max = MAX_PERIODS)]
    TooManyPeriods(i64),

    #[error("period range is outside the supported calendar")]
    OutOfRange,
}

/// Compute `period_count` trailing balances for `account`, oldest first.
///
/// `transactions` must be the account's full ledger in ledger order (see
/// [`super::sort_ledger`]). The newest bucket is the period containing `now`
/// and is sampled at `now`; every earlier bucket is sampled at its end.
/// Transactions stamped after `now` are ignored, and a bucket without
/// activity repeats the balance of the bucket before it.
pub fn balance_series(
    account: &Account,
    transactions: &[Transaction],
    period_type: PeriodType,
    period_count: i64,
    now: DateTime<Utc>,
) -> Result<Vec<BalancePoint>, SeriesError> {
    if period_count <= 0 {
        return Err(SeriesError::NonPositivePeriodCount(period_count));
    }
    if period_count > MAX_PERIODS {
        return Err(SeriesError::TooManyPeriods(period_count));
    }

    let mut periods = Vec::with_capacity(period_count as usize);
    let mut period = period_type
        .period_containing(now)
        .ok_or(SeriesError::OutOfRange)?;
    periods.push(period);
    for _ in 1..period_count {
        period = period.previous().ok_or(SeriesError::OutOfRange)?;
        periods.push(period);
    }
    periods.reverse();

    let mut balance = opening_balance(account, transactions);
    let mut pending = transactions.iter().peekable();
    let mut points = Vec::with_capacity(periods.len());

    for period in periods {
        // Periods are half-open, so the last instant inside one is just before its end.
        let cutoff = (period.end - Duration::nanoseconds(1)).min(now);
        while let Some(transaction) = pending.next_if(|t| t.timestamp <= cutoff) {
            balance = transaction.balance_after;
        }

        points.push(BalancePoint {
            label: period.label(),
            period_start: period.start,
            as_of: period.end.min(now),
            balance,
        });
    }

    Ok(points)
}
