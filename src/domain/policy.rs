use serde::{Deserialize, Serialize};

use super::{Effect, TransactionType};

/// Switches for the ledger rules whose intent is unclear.
///
/// Every flag defaults to `false`, which reproduces the sandbox behaviour:
/// card debits skip the funds check, retries never re-check funds, and only
/// balance-affecting types get a fresh `balance_after` on retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// Check CARD debits against the balance like any other debit.
    pub card_funds_check: bool,
    /// Refuse a retried debit that would drive the balance negative.
    pub retry_funds_check: bool,
    /// Recompute `balance_after` on retry for FEE, INTEREST and CARD too.
    pub retry_rebalances_all_types: bool,
}

impl LedgerPolicy {
    /// Whether creating a transaction of this type must leave a non-negative balance.
    pub fn requires_funds(&self, transaction_type: TransactionType) -> bool {
        match transaction_type {
            TransactionType::Withdrawal | TransactionType::TransferOut | TransactionType::Fee => {
                true
            }
            TransactionType::Card => self.card_funds_check,
            TransactionType::Deposit | TransactionType::TransferIn | TransactionType::Interest => {
                false
            }
        }
    }

    /// Whether a retry of this type fills in a new `balance_after`.
    pub fn rebalances_on_retry(&self, transaction_type: TransactionType) -> bool {
        self.retry_rebalances_all_types || transaction_type.is_balance_affecting()
    }

    /// Whether a retry of this type must leave a non-negative balance.
    /// Only a retry that writes a new `balance_after` can be refused.
    pub fn retry_requires_funds(&self, transaction_type: TransactionType) -> bool {
        self.retry_funds_check
            && self.rebalances_on_retry(transaction_type)
            && transaction_type.effect() == Effect::Debit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_skips_card_check() {
        let policy = LedgerPolicy::default();
        assert!(policy.requires_funds(TransactionType::Withdrawal));
        assert!(policy.requires_funds(TransactionType::TransferOut));
        assert!(policy.requires_funds(TransactionType::Fee));
        assert!(!policy.requires_funds(TransactionType::Card));
        assert!(!policy.requires_funds(TransactionType::Deposit));
    }

    #[test]
    fn test_card_check_flag() {
        let policy = LedgerPolicy {
            card_funds_check: true,
            ..Default::default()
        };
        assert!(policy.requires_funds(TransactionType::Card));
    }

    #[test]
    fn test_default_retry_rebalances_only_affecting_types() {
        let policy = LedgerPolicy::default();
        assert!(policy.rebalances_on_retry(TransactionType::TransferOut));
        assert!(!policy.rebalances_on_retry(TransactionType::Fee));
        assert!(!policy.rebalances_on_retry(TransactionType::Interest));
        assert!(!policy.rebalances_on_retry(TransactionType::Card));
        assert!(!policy.retry_requires_funds(TransactionType::Withdrawal));
    }

    #[test]
    fn test_retry_flags() {
        let policy = LedgerPolicy {
            retry_funds_check: true,
            retry_rebalances_all_types: true,
            ..Default::default()
        };
        assert!(policy.rebalances_on_retry(TransactionType::Card));
        assert!(policy.retry_requires_funds(TransactionType::Card));
        assert!(!policy.retry_requires_funds(TransactionType::Deposit));
    }

    #[test]
    fn test_retry_funds_check_skips_unbalanced_types() {
        let policy = LedgerPolicy {
            retry_funds_check: true,
            ..Default::default()
        };
        assert!(policy.retry_requires_funds(TransactionType::Withdrawal));
        assert!(policy.retry_requires_funds(TransactionType::TransferOut));
        assert!(!policy.retry_requires_funds(TransactionType::Fee));
        assert!(!policy.retry_requires_funds(TransactionType::Card));
    }
}
