// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::{Context, Result};
use chrono::Utc;
use mockbank::application::{CreateTransaction, LedgerService};
use mockbank::domain::{
    Channel, LedgerPolicy, NewTransaction, Transaction, TransactionId, TransactionStatus,
    TransactionType,
};
use mockbank::storage::{insert_transaction, Repository, SAMPLE_ACCOUNT};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with_policy(LedgerPolicy::default()).await
}

pub async fn test_service_with_policy(policy: LedgerPolicy) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(&db_path, policy).await?;
    Ok((service, temp_dir))
}

/// Service over a database holding the sample ledger (balance 1722.35)
pub async fn seeded_service(policy: LedgerPolicy) -> Result<(LedgerService, TempDir)> {
    let (service, temp_dir) = test_service_with_policy(policy).await?;
    service.seed_sample_data().await?;
    Ok((service, temp_dir))
}

/// Look up a sample transaction by its reference number
pub async fn sample_transaction(service: &LedgerService, reference: &str) -> Result<Transaction> {
    service
        .list_transactions(SAMPLE_ACCOUNT, None, 500)
        .await?
        .into_iter()
        .find(|t| t.reference_number.as_deref() == Some(reference))
        .with_context(|| format!("no sample transaction {}", reference))
}

pub async fn sample_id(service: &LedgerService, reference: &str) -> Result<TransactionId> {
    Ok(sample_transaction(service, reference).await?.transaction_id)
}

/// Record a completed transaction with default channel and no extras
pub async fn record(
    service: &LedgerService,
    account: &str,
    transaction_type: TransactionType,
    amount: Decimal,
) -> Result<Transaction> {
    let channel = match transaction_type {
        TransactionType::Card => Channel::Card,
        TransactionType::Withdrawal => Channel::Atm,
        TransactionType::Fee | TransactionType::Interest => Channel::Auto,
        _ => Channel::Online,
    };
    let created = service
        .create_transaction(CreateTransaction::new(account, transaction_type, amount, channel))
        .await?;
    Ok(created)
}

/// Write a FAILED row straight to the store, the way an upstream rejection would leave it
pub async fn insert_failed(
    temp_dir: &TempDir,
    account: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    reason: &str,
) -> Result<TransactionId> {
    let repo = Repository::connect(&temp_dir.path().join("test.db"), false).await?;
    let record = NewTransaction::completed(
        account,
        transaction_type,
        amount,
        Channel::Online,
        Utc::now(),
        Decimal::ZERO,
    )
    .unsuccessful(TransactionStatus::Failed, reason);

    let mut tx = repo.begin().await?;
    let id = insert_transaction(&mut *tx, &record).await?;
    tx.commit().await?;
    repo.close().await;
    Ok(id)
}
