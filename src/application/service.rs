use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    apply_effect, has_money_scale, summarize, verify_chain, AccountSummary, Channel,
    IntegrityReport, LedgerPolicy, NewTransaction, Transaction, TransactionId, TransactionStatus,
    TransactionType,
};
use crate::storage::{self, Repository};

use super::AppError;

/// Confirmation returned by every successful retry.
pub const RETRY_MESSAGE: &str = "Transaction retried successfully";

/// Application service providing the ledger use cases.
/// This is the primary interface for any client (CLI, HTTP API, tests).
pub struct LedgerService {
    repo: Repository,
    policy: LedgerPolicy,
    /// Serializes every read-modify-write so two writers never derive from the same balance
    write_gate: Mutex<()>,
}

/// Current balance of an account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceInfo {
    pub account_number: String,
    pub current_balance: Decimal,
    /// Equal to the current balance; holds are not modeled
    pub available_balance: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Request to record a new completed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub account_number: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub channel: Channel,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub counterparty_account: Option<String>,
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl CreateTransaction {
    pub fn new(
        account_number: impl Into<String>,
        transaction_type: TransactionType,
        amount: Decimal,
        channel: Channel,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            transaction_type,
            amount,
            channel,
            description: None,
            counterparty_account: None,
            counterparty_name: None,
            location: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_counterparty(mut self, account: impl Into<String>, name: impl Into<String>) -> Self {
        self.counterparty_account = Some(account.into());
        self.counterparty_name = Some(name.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Result of retrying a failed transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryOutcome {
    pub transaction_id: TransactionId,
    pub old_status: TransactionStatus,
    pub new_status: TransactionStatus,
    pub message: String,
    /// Balance stored on the row after the retry (unchanged when the type is not rebalanced)
    pub balance_after: Option<Decimal>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository, policy: LedgerPolicy) -> Self {
        Self {
            repo,
            policy,
            write_gate: Mutex::new(()),
        }
    }

    /// Initialize a database at the given path, creating it when missing.
    pub async fn init(database_path: &Path, policy: LedgerPolicy) -> Result<Self, AppError> {
        let repo = Repository::init(database_path).await?;
        Ok(Self::new(repo, policy))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &Path, policy: LedgerPolicy) -> Result<Self, AppError> {
        let repo = Repository::connect(database_path, false).await?;
        Ok(Self::new(repo, policy))
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Balance
    // ========================

    /// Balance of the newest completed transaction of the account.
    pub async fn current_balance(&self, account_number: &str) -> Result<Decimal, AppError> {
        Ok(self.get_balance(account_number).await?.current_balance)
    }

    /// Current and available balance, with the time of the resolving transaction.
    pub async fn get_balance(&self, account_number: &str) -> Result<BalanceInfo, AppError> {
        let snapshot = self
            .repo
            .current_balance(account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))?;

        Ok(BalanceInfo {
            account_number: account_number.to_string(),
            current_balance: snapshot.balance,
            available_balance: snapshot.balance,
            last_updated: snapshot.as_of,
        })
    }

    // ========================
    // History
    // ========================

    /// Transactions of an account, newest first, capped at `limit`.
    /// The caller bounds `limit`; an account with no rows yields an empty list.
    pub async fn list_transactions(
        &self,
        account_number: &str,
        status_filter: Option<TransactionStatus>,
        limit: u32,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .repo
            .list_transactions(account_number, status_filter, limit)
            .await?)
    }

    /// All failed transactions (retry candidates), newest first.
    pub async fn list_failed_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_failed().await?)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))
    }

    // ========================
    // Writes
    // ========================

    /// Record a completed transaction, deriving its balance from the current one.
    pub async fn create_transaction(
        &self,
        request: CreateTransaction,
    ) -> Result<Transaction, AppError> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        if !has_money_scale(request.amount) {
            return Err(AppError::InvalidAmount(
                "Amount must have at most two decimal places".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        let mut tx = self.repo.begin().await?;

        let latest = storage::latest_balance(&mut *tx, &request.account_number).await?;
        let current = latest.as_ref().map_or(Decimal::ZERO, |s| s.balance);
        let new_balance = apply_effect(current, request.transaction_type, request.amount)
            .ok_or_else(|| out_of_range(&request.account_number, current, request.amount))?;

        if self.policy.requires_funds(request.transaction_type) && new_balance < Decimal::ZERO {
            warn!(
                account_number = %request.account_number,
                transaction_type = %request.transaction_type,
                balance = %current,
                amount = %request.amount,
                "rejected debit: insufficient funds"
            );
            return Err(AppError::InsufficientFunds {
                account_number: request.account_number,
                balance: current,
                required: request.amount,
            });
        }

        let occurred_at = next_ledger_instant(latest.map(|s| s.as_of));
        let mut record = NewTransaction::completed(
            request.account_number,
            request.transaction_type,
            request.amount,
            request.channel,
            occurred_at,
            new_balance,
        )
        .with_counterparty(request.counterparty_account, request.counterparty_name);
        if let Some(description) = request.description {
            record = record.with_description(description);
        }
        if let Some(location) = request.location {
            record = record.with_location(location);
        }

        let id = storage::insert_transaction(&mut *tx, &record).await?;
        let created = storage::fetch_transaction(&mut *tx, id)
            .await?
            .with_context(|| format!("Transaction {} vanished after insert", id))?;
        tx.commit().await.context("Failed to commit transaction")?;

        info!(
            transaction_id = created.transaction_id,
            account_number = %created.account_number,
            transaction_type = %created.transaction_type,
            amount = %created.amount,
            balance_after = ?created.balance_after,
            "transaction recorded"
        );
        Ok(created)
    }

    /// Resurrect a FAILED transaction as COMPLETED.
    ///
    /// Balance-affecting types get a fresh `balance_after` derived from the current balance;
    /// the policy decides whether FEE, INTEREST and CARD do too, and whether funds are checked.
    /// A rebalanced row is re-stamped to the retry time so it becomes the newest entry of the
    /// ledger. Any other row keeps its `created_at`.
    pub async fn retry_transaction(&self, id: TransactionId) -> Result<RetryOutcome, AppError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.repo.begin().await?;

        let original = storage::fetch_transaction(&mut *tx, id)
            .await?
            .filter(|t| t.status == TransactionStatus::Failed)
            .ok_or(AppError::NotFoundOrNotFailed(id))?;
        let new_status = original.status.retry()?;

        let mut balance_after = None;
        let mut completed_at = None;
        if self.policy.rebalances_on_retry(original.transaction_type) {
            let latest = storage::latest_balance(&mut *tx, &original.account_number).await?;
            let current = latest.as_ref().map_or(Decimal::ZERO, |s| s.balance);
            let prospective = apply_effect(current, original.transaction_type, original.amount)
                .ok_or_else(|| out_of_range(&original.account_number, current, original.amount))?;

            if self.policy.retry_requires_funds(original.transaction_type)
                && prospective < Decimal::ZERO
            {
                warn!(
                    transaction_id = id,
                    account_number = %original.account_number,
                    balance = %current,
                    amount = %original.amount,
                    "rejected retry: insufficient funds"
                );
                return Err(AppError::InsufficientFunds {
                    account_number: original.account_number,
                    balance: current,
                    required: original.amount,
                });
            }

            balance_after = Some(prospective);
            completed_at = Some(next_ledger_instant(latest.map(|s| s.as_of)));
        }

        if !storage::complete_failed(&mut *tx, id, balance_after, completed_at).await? {
            return Err(AppError::NotFoundOrNotFailed(id));
        }
        tx.commit().await.context("Failed to commit retry")?;

        info!(
            transaction_id = id,
            account_number = %original.account_number,
            transaction_type = %original.transaction_type,
            balance_after = ?balance_after,
            "failed transaction retried"
        );
        Ok(RetryOutcome {
            transaction_id: id,
            old_status: original.status,
            new_status,
            message: RETRY_MESSAGE.to_string(),
            balance_after: balance_after.or(original.balance_after),
        })
    }

    /// Insert the sample ledger. Rows whose reference already exists are skipped,
    /// so seeding twice is harmless. Returns the number of rows written.
    pub async fn seed_sample_data(&self) -> Result<usize, AppError> {
        let records = storage::sample_transactions()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.repo.begin().await?;
        let mut inserted = 0;
        for record in &records {
            if storage::insert_transaction_if_new(&mut *tx, record).await? {
                inserted += 1;
            }
        }
        tx.commit().await.context("Failed to commit sample data")?;

        info!(inserted, skipped = records.len() - inserted, "sample data seeded");
        Ok(inserted)
    }

    // ========================
    // Reports
    // ========================

    /// Replay the account's ledger and report every break in its balance chain.
    pub async fn verify_account(&self, account_number: &str) -> Result<IntegrityReport, AppError> {
        let ledger = self.repo.ledger(account_number).await?;
        let recorded = self
            .repo
            .current_balance(account_number)
            .await?
            .map(|s| s.balance);

        let report = verify_chain(account_number, &ledger, recorded);
        debug!(
            account_number,
            issues = report.issues.len(),
            healthy = report.is_healthy(),
            "ledger verified"
        );
        Ok(report)
    }

    pub async fn account_summary(&self, account_number: &str) -> Result<AccountSummary, AppError> {
        let ledger = self.repo.ledger(account_number).await?;
        let recorded = self
            .repo
            .current_balance(account_number)
            .await?
            .map(|s| s.balance);
        Ok(summarize(account_number, &ledger, recorded))
    }
}

fn out_of_range(account_number: &str, balance: Decimal, amount: Decimal) -> AppError {
    warn!(
        account_number,
        balance = %balance,
        amount = %amount,
        "rejected write: balance out of range"
    );
    AppError::InvalidAmount("Amount out of range".to_string())
}

/// Timestamp for a new ledger entry: now at storage precision, unless the clock reads
/// at or before the newest entry, in which case one microsecond after it.
fn next_ledger_instant(newest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match newest {
        Some(newest) if newest >= now => newest + Duration::microseconds(1),
        _ => now,
    }
}
