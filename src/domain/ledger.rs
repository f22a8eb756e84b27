use rust_decimal::Decimal;
use serde::Serialize;

use super::{Transaction, TransactionId, TransactionStatus, TransactionType};

/// Apply one transaction's signed effect to a balance.
/// Returns `None` when the result does not fit in a `Decimal`.
pub fn apply_effect(
    balance: Decimal,
    transaction_type: TransactionType,
    amount: Decimal,
) -> Option<Decimal> {
    balance.checked_add(transaction_type.signed(amount))
}

/// Fold the signed effects of all completed transactions, starting from zero.
/// `transactions` must be in ledger order (oldest first).
pub fn replay_balance(transactions: &[Transaction]) -> Decimal {
    transactions
        .iter()
        .filter(|t| t.is_completed())
        .fold(Decimal::ZERO, |balance, t| balance.saturating_add(t.signed_amount()))
}

/// A break in an account's balance chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerIssue {
    /// A completed row whose balance does not follow from the previous one
    BalanceMismatch {
        transaction_id: TransactionId,
        expected: Decimal,
        recorded: Decimal,
    },
    /// A completed row without a balance
    MissingBalance {
        transaction_id: TransactionId,
        transaction_type: TransactionType,
    },
    /// A row that did not complete but carries a balance
    UnexpectedBalance {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
}

impl std::fmt::Display for LedgerIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerIssue::BalanceMismatch {
                transaction_id,
                expected,
                recorded,
            } => write!(
                f,
                "transaction {}: balance_after {} but chain gives {}",
                transaction_id, recorded, expected
            ),
            LedgerIssue::MissingBalance {
                transaction_id,
                transaction_type,
            } => write!(
                f,
                "transaction {}: completed {} has no balance_after",
                transaction_id, transaction_type
            ),
            LedgerIssue::UnexpectedBalance {
                transaction_id,
                status,
            } => write!(
                f,
                "transaction {}: {} row carries a balance_after",
                transaction_id, status
            ),
        }
    }
}

/// Result of replaying an account's ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub account_number: String,
    pub transaction_count: usize,
    pub completed_count: usize,
    /// Pure fold of every completed effect from zero
    pub replayed_balance: Decimal,
    /// What the balance resolver currently reports
    pub recorded_balance: Option<Decimal>,
    pub issues: Vec<LedgerIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        let balances_agree = match self.recorded_balance {
            Some(recorded) => recorded == self.replayed_balance,
            None => self.completed_count == 0,
        };
        self.issues.is_empty() && balances_agree
    }
}

/// Walk the ledger oldest first and check every row against the chain rule:
/// a completed row's balance equals the previous recorded balance plus its effect.
pub fn verify_chain(
    account_number: &str,
    transactions: &[Transaction],
    recorded_balance: Option<Decimal>,
) -> IntegrityReport {
    let mut issues = Vec::new();
    let mut previous = Decimal::ZERO;
    let mut completed_count = 0;

    for t in transactions {
        if !t.is_completed() {
            if t.balance_after.is_some() {
                issues.push(LedgerIssue::UnexpectedBalance {
                    transaction_id: t.transaction_id,
                    status: t.status,
                });
            }
            continue;
        }

        completed_count += 1;
        // Saturates so a corrupt row shows up as a mismatch
        let expected = previous.saturating_add(t.signed_amount());
        match t.balance_after {
            Some(recorded) => {
                if recorded != expected {
                    issues.push(LedgerIssue::BalanceMismatch {
                        transaction_id: t.transaction_id,
                        expected,
                        recorded,
                    });
                }
                // Resync so one bad row is reported once, not for every row after it
                previous = recorded;
            }
            None => issues.push(LedgerIssue::MissingBalance {
                transaction_id: t.transaction_id,
                transaction_type: t.transaction_type,
            }),
        }
    }

    IntegrityReport {
        account_number: account_number.to_string(),
        transaction_count: transactions.len(),
        completed_count,
        replayed_balance: replay_balance(transactions),
        recorded_balance,
        issues,
    }
}
