use serde::{Deserialize, Serialize};

use super::{Account, AccountId, Cents, Transaction, TransactionId};

/// Sort transactions into ledger order: by timestamp, then by sequence.
pub fn sort_ledger(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.sequence.cmp(&b.sequence))
    });
}

/// Balance of the account before its first recorded transaction.
/// Opening balance = current balance - sum of all posted amounts
pub fn opening_balance(account: &Account, transactions: &[Transaction]) -> Cents {
    let posted: Cents = transactions.iter().map(|t| t.amount).sum();
    account.current_balance - posted
}

/// Result of checking one account's ledger for consistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReport {
    pub account_id: AccountId,
    pub transaction_count: usize,
    pub opening_balance: Cents,
    pub current_balance: Cents,
    /// Transactions whose snapshot disagrees with the running sum
    pub mismatches: Vec<SnapshotMismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMismatch {
    pub transaction_id: TransactionId,
    pub expected: Cents,
    pub recorded: Cents,
}

impl LedgerReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Replay an account's ledger from its opening balance and compare each
/// running-balance snapshot with the running sum. The opening balance is
/// derived from the current balance, so a stale current balance flags every
/// snapshot.
pub fn verify_ledger(account: &Account, transactions: &[Transaction]) -> LedgerReport {
    let opening = opening_balance(account, transactions);

    let mut mismatches = Vec::new();
    let mut running = opening;
    for transaction in transactions {
        running += transaction.amount;
        if transaction.balance_after != running {
            mismatches.push(SnapshotMismatch {
                transaction_id: transaction.id,
                expected: running,
                recorded: transaction.balance_after,
            });
        }
    }

    LedgerReport {
        account_id: account.id,
        transaction_count: transactions.len(),
        opening_balance: opening,
        current_balance: account.current_balance,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn ledger(account: &mut Account, amounts: &[Cents]) -> Vec<Transaction> {
        let start = Utc::now() - Duration::days(amounts.len() as i64);
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                account.current_balance += amount;
                let mut tx = Transaction::new(
                    account.id,
                    *amount,
                    account.current_balance,
                    start + Duration::days(i as i64),
                );
                tx.sequence = i as i64 + 1;
                tx
            })
            .collect()
    }

    #[test]
    fn test_opening_balance_without_transactions() {
        let account = Account::new("Checking", "Jane", "USD").with_opening_balance(4200);
        assert_eq!(opening_balance(&account, &[]), 4200);
    }

    #[test]
    fn test_opening_balance_with_transactions() {
        let mut account = Account::new("Checking", "Jane", "USD").with_opening_balance(1000);
        let txs = ledger(&mut account, &[5000, -2000]);

        assert_eq!(account.current_balance, 4000);
        assert_eq!(opening_balance(&account, &txs), 1000);
    }

    #[test]
    fn test_sort_ledger_breaks_ties_by_sequence() {
        let account = Account::new("Checking", "Jane", "USD");
        let now = Utc::now();
        let mut second = Transaction::new(account.id, 10, 30, now);
        second.sequence = 2;
        let mut first = Transaction::new(account.id, 20, 20, now);
        first.sequence = 1;

        let mut txs = vec![second, first];
        sort_ledger(&mut txs);

        assert_eq!(txs[0].sequence, 1);
        assert_eq!(txs[1].sequence, 2);
    }

    #[test]
    fn test_verify_consistent_ledger() {
        let mut account = Account::new("Checking", "Jane", "USD").with_opening_balance(100);
        let txs = ledger(&mut account, &[5000, -2000, 300]);

        let report = verify_ledger(&account, &txs);
        assert!(report.is_consistent());
        assert_eq!(report.opening_balance, 100);
        assert_eq!(report.transaction_count, 3);
    }

    #[test]
    fn test_verify_detects_tampered_snapshot() {
        let mut account = Account::new("Checking", "Jane", "USD");
        let mut txs = ledger(&mut account, &[5000, -2000, 300]);
        txs[1].balance_after = 9999;

        let report = verify_ledger(&account, &txs);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(
            report.mismatches[0],
            SnapshotMismatch {
                transaction_id: txs[1].id,
                expected: 3000,
                recorded: 9999,
            }
        );
    }

    #[test]
    fn test_verify_flags_tampered_first_snapshot() {
        let mut account = Account::new("Checking", "Jane", "USD").with_opening_balance(100);
        let mut txs = ledger(&mut account, &[50, 20]);
        txs[0].balance_after = 999;

        let report = verify_ledger(&account, &txs);
        assert_eq!(report.opening_balance, 100);
        assert_eq!(
            report.mismatches,
            vec![SnapshotMismatch {
                transaction_id: txs[0].id,
                expected: 150,
                recorded: 999,
            }]
        );
    }

    #[test]
    fn test_verify_detects_stale_current_balance() {
        let mut account = Account::new("Checking", "Jane", "USD");
        let txs = ledger(&mut account, &[5000]);
        account.current_balance = 1;

        let report = verify_ledger(&account, &txs);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].expected, 1);
        assert_eq!(report.mismatches[0].recorded, 5000);
    }
}
