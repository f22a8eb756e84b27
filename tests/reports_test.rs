mod common;

use anyhow::Result;
use common::{record, seeded_service, test_service};
use mockbank::domain::{LedgerPolicy, TransactionStatus, TransactionType};
use mockbank::storage::SAMPLE_ACCOUNT;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_seed_is_idempotent() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_eq!(service.seed_sample_data().await?, 14);
    assert_eq!(service.seed_sample_data().await?, 0);

    let all = service.list_transactions(SAMPLE_ACCOUNT, None, 500).await?;
    assert_eq!(all.len(), 14);

    Ok(())
}

#[tokio::test]
async fn test_seeded_ledger_is_healthy() -> Result<()> {
    let (service, _temp) = seeded_service(LedgerPolicy::default()).await?;

    let report = service.verify_account(SAMPLE_ACCOUNT).await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.transaction_count, 14);
    assert_eq!(report.completed_count, 7);
    assert_eq!(report.replayed_balance, dec!(1722.35));
    assert_eq!(report.recorded_balance, Some(dec!(1722.35)));

    let info = service.get_balance(SAMPLE_ACCOUNT).await?;
    assert_eq!(info.current_balance, dec!(1722.35));
    assert_eq!(
        info.last_updated.format("%Y-%m-%d %H:%M:%S").to_string(),
        "2024-06-15 12:00:00"
    );

    Ok(())
}

#[tokio::test]
async fn test_seeded_history_filters_by_status() -> Result<()> {
    let (service, _temp) = seeded_service(LedgerPolicy::default()).await?;

    let cancelled = service
        .list_transactions(SAMPLE_ACCOUNT, Some(TransactionStatus::Cancelled), 50)
        .await?;
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].reference_number.as_deref(), Some("TRF-006"));
    assert_eq!(cancelled[0].failure_reason.as_deref(), Some("USER_CANCELLED"));

    let completed = service
        .list_transactions(SAMPLE_ACCOUNT, Some(TransactionStatus::Completed), 50)
        .await?;
    assert_eq!(completed.len(), 7);
    assert!(completed.iter().all(|t| t.balance_after.is_some()));
    assert_eq!(completed[0].reference_number.as_deref(), Some("INT-001"));

    Ok(())
}

#[tokio::test]
async fn test_seeded_summary() -> Result<()> {
    let (service, _temp) = seeded_service(LedgerPolicy::default()).await?;

    let summary = service.account_summary(SAMPLE_ACCOUNT).await?;
    assert_eq!(summary.total_transactions, 14);
    assert_eq!(summary.completed_transactions, 7);
    assert_eq!(summary.failed_transactions, 6);
    assert_eq!(summary.pending_transactions, 0);
    assert_eq!(summary.cancelled_transactions, 1);
    assert_eq!(summary.total_credits, dec!(2802.85));
    assert_eq!(summary.total_debits, dec!(1080.50));
    assert_eq!(summary.current_balance, Some(dec!(1722.35)));

    let reasons: Vec<_> = summary
        .failure_reasons
        .iter()
        .map(|f| (f.reason.as_str(), f.count))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("CARD_DECLINED_FRAUD_PROTECTION", 1),
            ("DAILY_LIMIT_EXCEEDED", 1),
            ("INSUFFICIENT_FUNDS", 1),
            ("INVALID_RECIPIENT_ACCOUNT", 1),
            ("NETWORK_TIMEOUT", 1),
            ("SYSTEM_MAINTENANCE", 1),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_summary_of_unknown_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let summary = service.account_summary("ACC-NONE").await?;
    assert_eq!(summary.total_transactions, 0);
    assert_eq!(summary.total_credits, Decimal::ZERO);
    assert_eq!(summary.current_balance, None);
    assert!(summary.failure_reasons.is_empty());

    let report = service.verify_account("ACC-NONE").await?;
    assert!(report.is_healthy());
    assert_eq!(report.recorded_balance, None);

    Ok(())
}

#[tokio::test]
async fn test_created_transactions_extend_seeded_chain() -> Result<()> {
    let (service, _temp) = seeded_service(LedgerPolicy::default()).await?;

    let created = record(&service, SAMPLE_ACCOUNT, TransactionType::Withdrawal, dec!(22.35)).await?;
    assert_eq!(created.balance_after, Some(dec!(1700)));

    let report = service.verify_account(SAMPLE_ACCOUNT).await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.replayed_balance, dec!(1700));

    Ok(())
}
