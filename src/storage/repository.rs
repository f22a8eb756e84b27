use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::domain::{
    format_amount, Channel, NewTransaction, Transaction, TransactionId, TransactionStatus,
    TransactionType,
};

use super::MIGRATION_001_INITIAL;

/// `created_at` layout. Fixed width, so text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const TRANSACTION_COLUMNS: &str = "transaction_id, account_number, transaction_date, transaction_time, transaction_type, amount, balance_after, description, reference_number, counterparty_account, counterparty_name, channel, location, status, failure_reason, created_at";

const INSERT_TRANSACTION: &str = r#"
    INSERT INTO transactions (
        account_number, transaction_date, transaction_time, transaction_type,
        amount, balance_after, description, reference_number,
        counterparty_account, counterparty_name, channel, location,
        status, failure_reason, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_TRANSACTION_SKIP_DUPLICATE: &str = r#"
    INSERT INTO transactions (
        account_number, transaction_date, transaction_time, transaction_type,
        amount, balance_after, description, reference_number,
        counterparty_account, counterparty_name, channel, location,
        status, failure_reason, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(reference_number) DO NOTHING
"#;

/// The row the balance resolver settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub transaction_id: TransactionId,
    pub balance: Decimal,
    pub as_of: DateTime<Utc>,
}

/// Repository for persisting and querying ledger transactions.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the SQLite database at `path`.
    /// With `create` set, a missing file is created instead of failing.
    pub async fn connect(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", path.display()))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect, creating the file if needed, then migrate).
    pub async fn init(path: &Path) -> Result<Self> {
        let repo = Self::connect(path, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a write transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to start database transaction")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn current_balance(&self, account_number: &str) -> Result<Option<BalanceSnapshot>> {
        latest_balance(&self.pool, account_number).await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        fetch_transaction(&self.pool, id).await
    }

    /// Transactions of an account, newest first.
    pub async fn list_transactions(
        &self,
        account_number: &str,
        status: Option<TransactionStatus>,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        debug!(account_number, ?status, limit, "listing transactions");

        let mut query = format!(
            "SELECT {} FROM transactions WHERE account_number = ?",
            TRANSACTION_COLUMNS
        );
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY created_at DESC, transaction_id DESC LIMIT ?");

        let mut sql_query = sqlx::query(&query).bind(account_number);
        if let Some(status) = status {
            sql_query = sql_query.bind(status.as_str());
        }

        let rows = sql_query
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Every FAILED transaction across all accounts, newest first.
    pub async fn list_failed(&self) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE status = 'FAILED' ORDER BY created_at DESC, transaction_id DESC",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list failed transactions")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// The full ledger of an account in replay order (oldest first).
    pub async fn ledger(&self, account_number: &str) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE account_number = ? ORDER BY created_at ASC, transaction_id ASC",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(account_number)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load account ledger")?;

        rows.iter().map(row_to_transaction).collect()
    }
}

/// Resolve the current balance: the newest completed row that carries a balance.
pub async fn latest_balance<'e, E>(
    executor: E,
    account_number: &str,
) -> Result<Option<BalanceSnapshot>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT transaction_id, balance_after, created_at
        FROM transactions
        WHERE account_number = ? AND status = 'COMPLETED' AND balance_after IS NOT NULL
        ORDER BY created_at DESC, transaction_id DESC
        LIMIT 1
        "#,
    )
    .bind(account_number)
    .fetch_optional(executor)
    .await
    .context("Failed to resolve current balance")?;

    match row {
        Some(row) => {
            let balance_str: String = row.get("balance_after");
            let created_at_str: String = row.get("created_at");
            Ok(Some(BalanceSnapshot {
                transaction_id: row.get("transaction_id"),
                balance: parse_decimal(&balance_str).context("Invalid balance_after")?,
                as_of: parse_timestamp(&created_at_str)?,
            }))
        }
        None => Ok(None),
    }
}

pub async fn fetch_transaction<'e, E>(executor: E, id: TransactionId) -> Result<Option<Transaction>>
where
    E: SqliteExecutor<'e>,
{
    let query = format!(
        "SELECT {} FROM transactions WHERE transaction_id = ?",
        TRANSACTION_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

/// Insert a transaction and return its assigned id.
pub async fn insert_transaction<'e, E>(executor: E, record: &NewTransaction) -> Result<TransactionId>
where
    E: SqliteExecutor<'e>,
{
    let result = bind_new_transaction(sqlx::query(INSERT_TRANSACTION), record)
        .execute(executor)
        .await
        .context("Failed to save transaction")?;
    Ok(result.last_insert_rowid())
}

/// Insert a transaction unless its reference number already exists.
/// Returns whether a row was written.
pub async fn insert_transaction_if_new<'e, E>(executor: E, record: &NewTransaction) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = bind_new_transaction(sqlx::query(INSERT_TRANSACTION_SKIP_DUPLICATE), record)
        .execute(executor)
        .await
        .context("Failed to save transaction")?;
    Ok(result.rows_affected() > 0)
}

/// Apply the FAILED -> COMPLETED edge. `None` leaves the stored balance or timestamp as is.
/// Returns false when the row was missing or no longer FAILED.
pub async fn complete_failed<'e, E>(
    executor: E,
    id: TransactionId,
    balance_after: Option<Decimal>,
    completed_at: Option<DateTime<Utc>>,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'COMPLETED',
            failure_reason = NULL,
            balance_after = COALESCE(?, balance_after),
            created_at = COALESCE(?, created_at)
        WHERE transaction_id = ? AND status = 'FAILED'
        "#,
    )
    .bind(balance_after.map(format_amount))
    .bind(completed_at.map(format_timestamp))
    .bind(id)
    .execute(executor)
    .await
    .context("Failed to complete transaction")?;

    Ok(result.rows_affected() == 1)
}

fn bind_new_transaction<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    record: &'q NewTransaction,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&record.account_number)
        .bind(record.transaction_date.format(DATE_FORMAT).to_string())
        .bind(record.transaction_time.format(TIME_FORMAT).to_string())
        .bind(record.transaction_type.as_str())
        .bind(format_amount(record.amount))
        .bind(record.balance_after.map(format_amount))
        .bind(&record.description)
        .bind(&record.reference_number)
        .bind(&record.counterparty_account)
        .bind(&record.counterparty_name)
        .bind(record.channel.as_str())
        .bind(&record.location)
        .bind(record.status.as_str())
        .bind(&record.failure_reason)
        .bind(format_timestamp(record.created_at))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("Invalid created_at timestamp: {}", s))?;
    Ok(naive.and_utc())
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("Invalid decimal: {}", s))
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let date_str: String = row.get("transaction_date");
    let time_str: String = row.get("transaction_time");
    let type_str: String = row.get("transaction_type");
    let amount_str: String = row.get("amount");
    let balance_str: Option<String> = row.get("balance_after");
    let channel_str: String = row.get("channel");
    let status_str: String = row.get("status");
    let created_at_str: String = row.get("created_at");

    Ok(Transaction {
        transaction_id: row.get("transaction_id"),
        account_number: row.get("account_number"),
        transaction_date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .context("Invalid transaction_date")?,
        transaction_time: NaiveTime::parse_from_str(&time_str, TIME_FORMAT)
            .context("Invalid transaction_time")?,
        transaction_type: TransactionType::from_str(&type_str)?,
        amount: parse_decimal(&amount_str).context("Invalid amount")?,
        balance_after: balance_str
            .as_deref()
            .map(parse_decimal)
            .transpose()
            .context("Invalid balance_after")?,
        description: row.get("description"),
        reference_number: row.get("reference_number"),
        counterparty_account: row.get("counterparty_account"),
        counterparty_name: row.get("counterparty_name"),
        channel: Channel::from_str(&channel_str)?,
        location: row.get("location"),
        status: TransactionStatus::from_str(&status_str)?,
        failure_reason: row.get("failure_reason"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}
