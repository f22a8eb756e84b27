use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::{Effect, Transaction, TransactionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCount {
    pub reason: String,
    pub count: usize,
}

/// Per-account activity overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub account_number: String,
    pub total_transactions: usize,
    pub completed_transactions: usize,
    pub failed_transactions: usize,
    pub pending_transactions: usize,
    pub cancelled_transactions: usize,
    /// Sum of completed credits
    pub total_credits: Decimal,
    /// Sum of completed debits, as a positive magnitude
    pub total_debits: Decimal,
    pub current_balance: Option<Decimal>,
    /// Failed transactions grouped by reason, most frequent first
    pub failure_reasons: Vec<FailureCount>,
}

pub fn summarize(
    account_number: &str,
    transactions: &[Transaction],
    current_balance: Option<Decimal>,
) -> AccountSummary {
    let count = |status: TransactionStatus| transactions.iter().filter(|t| t.status == status).count();

    let (total_credits, total_debits) = transactions
        .iter()
        .filter(|t| t.is_completed())
        .fold((Decimal::ZERO, Decimal::ZERO), |(credits, debits), t| {
            match t.transaction_type.effect() {
                Effect::Credit => (credits.saturating_add(t.amount), debits),
                Effect::Debit => (credits, debits.saturating_add(t.amount)),
            }
        });

    let mut reasons: BTreeMap<&str, usize> = BTreeMap::new();
    for t in transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Failed)
    {
        let reason = t.failure_reason.as_deref().unwrap_or("UNKNOWN");
        *reasons.entry(reason).or_insert(0) += 1;
    }
    let mut failure_reasons: Vec<FailureCount> = reasons
        .into_iter()
        .map(|(reason, count)| FailureCount {
            reason: reason.to_string(),
            count,
        })
        .collect();
    // BTreeMap already sorted by reason; a stable sort keeps that for equal counts
    failure_reasons.sort_by(|a, b| b.count.cmp(&a.count));

    AccountSummary {
        account_number: account_number.to_string(),
        total_transactions: transactions.len(),
        completed_transactions: count(TransactionStatus::Completed),
        failed_transactions: count(TransactionStatus::Failed),
        pending_transactions: count(TransactionStatus::Pending),
        cancelled_transactions: count(TransactionStatus::Cancelled),
        total_credits,
        total_debits,
        current_balance,
        failure_reasons,
    }
}
