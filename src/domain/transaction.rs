use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type TransactionId = i64;

/// Direction a transaction moves the balance in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    Fee,
    Interest,
    Card,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::TransferIn,
        TransactionType::TransferOut,
        TransactionType::Fee,
        TransactionType::Interest,
        TransactionType::Card,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::TransferOut => "TRANSFER_OUT",
            TransactionType::Fee => "FEE",
            TransactionType::Interest => "INTEREST",
            TransactionType::Card => "CARD",
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            TransactionType::Deposit | TransactionType::TransferIn | TransactionType::Interest => {
                Effect::Credit
            }
            TransactionType::Withdrawal
            | TransactionType::TransferOut
            | TransactionType::Fee
            | TransactionType::Card => Effect::Debit,
        }
    }

    /// Signed ledger effect of `amount` for this type.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self.effect() {
            Effect::Credit => amount,
            Effect::Debit => -amount,
        }
    }

    /// Types whose retry recomputes `balance_after`.
    pub fn is_balance_affecting(&self) -> bool {
        matches!(
            self,
            TransactionType::Deposit
                | TransactionType::Withdrawal
                | TransactionType::TransferIn
                | TransactionType::TransferOut
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("transaction type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Atm,
    Online,
    Mobile,
    Branch,
    Card,
    Auto,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Atm,
        Channel::Online,
        Channel::Mobile,
        Channel::Branch,
        Channel::Card,
        Channel::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Atm => "ATM",
            Channel::Online => "ONLINE",
            Channel::Mobile => "MOBILE",
            Channel::Branch => "BRANCH",
            Channel::Card => "CARD",
            Channel::Auto => "AUTO",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("channel", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Completed,
    Failed,
    Pending,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 4] = [
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Pending,
        TransactionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    /// The only legal edge of the lifecycle: FAILED -> COMPLETED.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Failed, TransactionStatus::Completed)
        )
    }

    /// Status a retry moves this transaction to.
    pub fn retry(self) -> Result<TransactionStatus, StatusTransitionError> {
        let next = TransactionStatus::Completed;
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError { from: self, to: next })
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransitionError {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

impl fmt::Display for StatusTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move a {} transaction to {}", self.from, self.to)
    }
}

impl std::error::Error for StatusTransitionError {}

/// A persisted ledger entry.
/// Immutable once written, except for the FAILED -> COMPLETED retry edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub account_number: String,
    pub transaction_date: NaiveDate,
    pub transaction_time: NaiveTime,
    pub transaction_type: TransactionType,
    /// Positive magnitude; the type decides the sign of the effect
    pub amount: Decimal,
    /// Post-transaction balance, null when the transaction did not complete
    pub balance_after: Option<Decimal>,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub counterparty_account: Option<String>,
    pub counterparty_name: Option<String>,
    pub channel: Channel,
    pub location: Option<String>,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    /// Write time; orders the ledger together with the id
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn signed_amount(&self) -> Decimal {
        self.transaction_type.signed(self.amount)
    }
}

/// A transaction that has not been written yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_number: String,
    pub transaction_date: NaiveDate,
    pub transaction_time: NaiveTime,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub balance_after: Option<Decimal>,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub counterparty_account: Option<String>,
    pub counterparty_name: Option<String>,
    pub channel: Channel,
    pub location: Option<String>,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Create a completed transaction occurring at `occurred_at`.
    /// Date and time are split from that same instant; seconds are kept, sub-seconds dropped.
    pub fn completed(
        account_number: impl Into<String>,
        transaction_type: TransactionType,
        amount: Decimal,
        channel: Channel,
        occurred_at: DateTime<Utc>,
        balance_after: Decimal,
    ) -> Self {
        let naive = occurred_at.naive_utc();
        Self {
            account_number: account_number.into(),
            transaction_date: naive.date(),
            transaction_time: naive.time().with_nanosecond(0).unwrap_or(naive.time()),
            transaction_type,
            amount,
            balance_after: Some(balance_after),
            description: None,
            reference_number: None,
            counterparty_account: None,
            counterparty_name: None,
            channel,
            location: None,
            status: TransactionStatus::Completed,
            failure_reason: None,
            created_at: occurred_at,
        }
    }

    /// Turn this into a non-completed record. The balance is dropped.
    pub fn unsuccessful(mut self, status: TransactionStatus, reason: impl Into<String>) -> Self {
        debug_assert!(status != TransactionStatus::Completed);
        self.status = status;
        self.balance_after = None;
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_counterparty(
        mut self,
        account: Option<String>,
        name: Option<String>,
    ) -> Self {
        self.counterparty_account = account;
        self.counterparty_name = name;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_type_roundtrip() {
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
        assert_eq!(
            "transfer_out".parse::<TransactionType>().unwrap(),
            TransactionType::TransferOut
        );
        assert!("REFUND".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_channel_and_status_parse() {
        assert_eq!("atm".parse::<Channel>().unwrap(), Channel::Atm);
        assert!("FAX".parse::<Channel>().is_err());
        assert_eq!(
            "Cancelled".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Cancelled
        );
    }

    #[test]
    fn test_signed_effect() {
        assert_eq!(TransactionType::Deposit.signed(dec!(10)), dec!(10));
        assert_eq!(TransactionType::TransferIn.signed(dec!(10)), dec!(10));
        assert_eq!(TransactionType::Interest.signed(dec!(2.85)), dec!(2.85));
        assert_eq!(TransactionType::Withdrawal.signed(dec!(10)), dec!(-10));
        assert_eq!(TransactionType::TransferOut.signed(dec!(10)), dec!(-10));
        assert_eq!(TransactionType::Fee.signed(dec!(5)), dec!(-5));
        assert_eq!(TransactionType::Card.signed(dec!(25.50)), dec!(-25.50));
    }

    #[test]
    fn test_balance_affecting_types() {
        let affecting: Vec<_> = TransactionType::ALL
            .into_iter()
            .filter(|t| t.is_balance_affecting())
            .collect();
        assert_eq!(
            affecting,
            vec![
                TransactionType::Deposit,
                TransactionType::Withdrawal,
                TransactionType::TransferIn,
                TransactionType::TransferOut,
            ]
        );
    }

    #[test]
    fn test_only_failed_can_be_retried() {
        assert_eq!(
            TransactionStatus::Failed.retry(),
            Ok(TransactionStatus::Completed)
        );
        for status in [
            TransactionStatus::Completed,
            TransactionStatus::Pending,
            TransactionStatus::Cancelled,
        ] {
            let err = status.retry().unwrap_err();
            assert_eq!(err.from, status);
            assert_eq!(err.to, TransactionStatus::Completed);
        }
        assert!(!TransactionStatus::Failed.can_transition_to(TransactionStatus::Cancelled));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&TransactionType::TransferOut).unwrap();
        assert_eq!(json, "\"TRANSFER_OUT\"");
        let channel: Channel = serde_json::from_str("\"ATM\"").unwrap();
        assert_eq!(channel, Channel::Atm);
    }

    #[test]
    fn test_new_completed_splits_instant() {
        let at = Utc.with_ymd_and_hms(2024, 6, 2, 14, 30, 0).unwrap();
        let record = NewTransaction::completed(
            "ACC-1",
            TransactionType::Withdrawal,
            dec!(50),
            Channel::Atm,
            at,
            dec!(2450),
        )
        .with_location("Downtown ATM");

        assert_eq!(record.transaction_date.to_string(), "2024-06-02");
        assert_eq!(record.transaction_time.to_string(), "14:30:00");
        assert_eq!(record.balance_after, Some(dec!(2450)));
        assert_eq!(record.status, TransactionStatus::Completed);
        assert_eq!(record.location.as_deref(), Some("Downtown ATM"));
    }

    #[test]
    fn test_unsuccessful_drops_balance() {
        let at = Utc.with_ymd_and_hms(2024, 6, 4, 18, 22, 0).unwrap();
        let record = NewTransaction::completed(
            "ACC-1",
            TransactionType::Withdrawal,
            dec!(3000),
            Channel::Atm,
            at,
            dec!(-250),
        )
        .unsuccessful(TransactionStatus::Failed, "INSUFFICIENT_FUNDS");

        assert_eq!(record.status, TransactionStatus::Failed);
        assert_eq!(record.balance_after, None);
        assert_eq!(record.failure_reason.as_deref(), Some("INSUFFICIENT_FUNDS"));
    }
}
