use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use crate::domain::{Channel, NewTransaction, TransactionStatus, TransactionType};

use Channel::{Atm, Auto, Branch, Mobile, Online};
use TransactionStatus::{Cancelled, Completed, Failed};
use TransactionType::{Deposit, Fee, Interest, TransferIn, TransferOut, Withdrawal};

/// Account the sample ledger is written to.
pub const SAMPLE_ACCOUNT: &str = "ACC-123456789";

struct Fixture {
    date: &'static str,
    time: &'static str,
    transaction_type: TransactionType,
    amount: &'static str,
    balance_after: Option<&'static str>,
    description: &'static str,
    reference: &'static str,
    counterparty: Option<(&'static str, &'static str)>,
    channel: Channel,
    location: Option<&'static str>,
    status: TransactionStatus,
    failure_reason: Option<&'static str>,
}

const FIXTURES: &[Fixture] = &[
    Fixture { date: "2024-06-01", time: "09:15:00", transaction_type: Deposit, amount: "2500.00", balance_after: Some("2500.00"), description: "Initial deposit", reference: "DEP-001", counterparty: None, channel: Branch, location: Some("Main Branch"), status: Completed, failure_reason: None },
    Fixture { date: "2024-06-02", time: "14:30:00", transaction_type: Withdrawal, amount: "50.00", balance_after: Some("2450.00"), description: "ATM withdrawal", reference: "WTH-001", counterparty: None, channel: Atm, location: Some("Downtown ATM"), status: Completed, failure_reason: None },
    Fixture { date: "2024-06-03", time: "11:45:00", transaction_type: TransferIn, amount: "300.00", balance_after: Some("2750.00"), description: "Transfer from savings", reference: "TRF-001", counterparty: Some(("SAV-123456789", "Own Account")), channel: Online, location: None, status: Completed, failure_reason: None },
    Fixture { date: "2024-06-04", time: "18:22:00", transaction_type: Withdrawal, amount: "3000.00", balance_after: None, description: "ATM withdrawal attempt", reference: "WTH-002", counterparty: None, channel: Atm, location: Some("Mall ATM"), status: Failed, failure_reason: Some("INSUFFICIENT_FUNDS") },
    Fixture { date: "2024-06-05", time: "16:20:00", transaction_type: TransactionType::Card, amount: "25.50", balance_after: Some("2724.50"), description: "Coffee shop purchase", reference: "CRD-001", counterparty: Some(("MERCH-789", "Starbucks #1234")), channel: Channel::Card, location: Some("New York, NY"), status: Completed, failure_reason: None },
    Fixture { date: "2024-06-06", time: "20:15:00", transaction_type: Withdrawal, amount: "500.00", balance_after: None, description: "ATM withdrawal attempt", reference: "WTH-003", counterparty: None, channel: Atm, location: Some("Airport ATM"), status: Failed, failure_reason: Some("DAILY_LIMIT_EXCEEDED") },
    Fixture { date: "2024-06-07", time: "10:00:00", transaction_type: TransferOut, amount: "1000.00", balance_after: Some("1724.50"), description: "Rent payment", reference: "TRF-002", counterparty: Some(("EXT-987654321", "ABC Property Management")), channel: Online, location: None, status: Completed, failure_reason: None },
    Fixture { date: "2024-06-08", time: "13:45:00", transaction_type: TransferOut, amount: "200.00", balance_after: None, description: "Utility bill payment", reference: "TRF-003", counterparty: Some(("EXT-456789123", "Electric Company")), channel: Mobile, location: None, status: Failed, failure_reason: Some("NETWORK_TIMEOUT") },
    Fixture { date: "2024-06-09", time: "11:30:00", transaction_type: TransferOut, amount: "150.00", balance_after: None, description: "Transfer to friend", reference: "TRF-004", counterparty: Some(("EXT-999999999", "John Smith")), channel: Online, location: None, status: Failed, failure_reason: Some("INVALID_RECIPIENT_ACCOUNT") },
    Fixture { date: "2024-06-10", time: "08:30:00", transaction_type: Fee, amount: "5.00", balance_after: Some("1719.50"), description: "Monthly maintenance fee", reference: "FEE-001", counterparty: None, channel: Auto, location: None, status: Completed, failure_reason: None },
    Fixture { date: "2024-06-12", time: "19:45:00", transaction_type: TransactionType::Card, amount: "89.99", balance_after: None, description: "Online purchase attempt", reference: "CRD-002", counterparty: Some(("MERCH-456", "Amazon.com")), channel: Channel::Card, location: Some("Online"), status: Failed, failure_reason: Some("CARD_DECLINED_FRAUD_PROTECTION") },
    Fixture { date: "2024-06-13", time: "02:15:00", transaction_type: TransferOut, amount: "75.00", balance_after: None, description: "Bill payment attempt", reference: "TRF-005", counterparty: Some(("EXT-111222333", "Phone Company")), channel: Auto, location: None, status: Failed, failure_reason: Some("SYSTEM_MAINTENANCE") },
    Fixture { date: "2024-06-15", time: "12:00:00", transaction_type: Interest, amount: "2.85", balance_after: Some("1722.35"), description: "Monthly interest credit", reference: "INT-001", counterparty: None, channel: Auto, location: None, status: Completed, failure_reason: None },
    Fixture { date: "2024-06-16", time: "14:20:00", transaction_type: TransferOut, amount: "300.00", balance_after: None, description: "Transfer cancelled by user", reference: "TRF-006", counterparty: Some(("EXT-555666777", "Investment Account")), channel: Online, location: None, status: Cancelled, failure_reason: Some("USER_CANCELLED") },
];

/// The sample ledger for [`SAMPLE_ACCOUNT`]: a consistent completed chain ending at 1722.35,
/// six failed attempts with distinct reasons and one cancelled transfer.
/// `created_at` is the occurrence time, so the rows replay in date order.
pub fn sample_transactions() -> Result<Vec<NewTransaction>> {
    FIXTURES.iter().map(fixture_to_record).collect()
}

fn fixture_to_record(f: &Fixture) -> Result<NewTransaction> {
    let date = NaiveDate::parse_from_str(f.date, "%Y-%m-%d")
        .with_context(|| format!("Invalid fixture date: {}", f.date))?;
    let time = NaiveTime::parse_from_str(f.time, "%H:%M:%S")
        .with_context(|| format!("Invalid fixture time: {}", f.time))?;
    let amount = Decimal::from_str(f.amount)
        .with_context(|| format!("Invalid fixture amount: {}", f.amount))?;
    let balance_after = f
        .balance_after
        .map(Decimal::from_str)
        .transpose()
        .with_context(|| format!("Invalid fixture balance for {}", f.reference))?;

    Ok(NewTransaction {
        account_number: SAMPLE_ACCOUNT.to_string(),
        transaction_date: date,
        transaction_time: time,
        transaction_type: f.transaction_type,
        amount,
        balance_after,
        description: Some(f.description.to_string()),
        reference_number: Some(f.reference.to_string()),
        counterparty_account: f.counterparty.map(|(account, _)| account.to_string()),
        counterparty_name: f.counterparty.map(|(_, name)| name.to_string()),
        channel: f.channel,
        location: f.location.map(String::from),
        status: f.status,
        failure_reason: f.failure_reason.map(String::from),
        created_at: date.and_time(time).and_utc(),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_fixtures_parse() {
        let records = sample_transactions().unwrap();
        assert_eq!(records.len(), 14);
        assert!(records.iter().all(|r| r.account_number == SAMPLE_ACCOUNT));
        assert!(records.iter().all(|r| r.amount > Decimal::ZERO));
    }

    #[test]
    fn test_fixtures_respect_balance_invariant() {
        for record in sample_transactions().unwrap() {
            assert_eq!(
                record.balance_after.is_some(),
                record.status == TransactionStatus::Completed,
                "{:?}",
                record.reference_number
            );
        }
    }

    #[test]
    fn test_fixture_chain_ends_at_expected_balance() {
        let records = sample_transactions().unwrap();
        let last = records
            .iter()
            .filter(|r| r.status == TransactionStatus::Completed)
            .last()
            .unwrap();
        assert_eq!(last.balance_after, Some(dec!(1722.35)));
    }

    #[test]
    fn test_fixtures_cover_failure_reasons() {
        let reasons: Vec<_> = sample_transactions()
            .unwrap()
            .into_iter()
            .filter_map(|r| r.failure_reason)
            .collect();
        for expected in [
            "INSUFFICIENT_FUNDS",
            "DAILY_LIMIT_EXCEEDED",
            "NETWORK_TIMEOUT",
            "INVALID_RECIPIENT_ACCOUNT",
            "CARD_DECLINED_FRAUD_PROTECTION",
            "SYSTEM_MAINTENANCE",
            "USER_CANCELLED",
        ] {
            assert!(reasons.iter().any(|r| r == expected), "missing {}", expected);
        }
    }
}
