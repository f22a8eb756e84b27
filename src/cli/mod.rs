use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::{self, ApiState, DEFAULT_HISTORY_LIMIT};
use crate::application::{CreateTransaction, LedgerService};
use crate::config::{DEFAULT_API_TOKEN, DEFAULT_BIND, DEFAULT_DATABASE, LedgerConfig, ServerConfig};
use crate::domain::{
    format_amount, parse_amount, Channel, LedgerPolicy, Transaction, TransactionId,
    TransactionStatus, TransactionType,
};

/// Mockbank - Sandbox Bank Ledger
#[derive(Parser)]
#[command(name = "mockbank")]
#[command(about = "A sandbox bank ledger whose balance is derived from its transaction log")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "MOCKBANK_DATABASE", default_value = DEFAULT_DATABASE, global = true)]
    pub database: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Check CARD debits against the balance
    #[arg(long, env = "MOCKBANK_CARD_FUNDS_CHECK", global = true)]
    pub card_funds_check: bool,

    /// Refuse retried debits that would overdraw the account
    #[arg(long, env = "MOCKBANK_RETRY_FUNDS_CHECK", global = true)]
    pub retry_funds_check: bool,

    /// Recompute balance_after on retry for every transaction type
    #[arg(long, env = "MOCKBANK_RETRY_REBALANCES_ALL_TYPES", global = true)]
    pub retry_rebalances_all_types: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Load the sample ledger for ACC-123456789
    Seed,

    /// Serve the REST API
    Serve {
        /// Address to listen on
        #[arg(long, env = "MOCKBANK_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        /// Bearer token clients must present
        #[arg(long, env = "MOCKBANK_API_TOKEN", default_value = DEFAULT_API_TOKEN)]
        token: String,
    },

    /// Show the current balance of an account
    Balance {
        /// Account number
        account: String,
    },

    /// List recent transactions of an account
    History {
        /// Account number
        account: String,

        /// Only show transactions with this status
        #[arg(short, long)]
        status: Option<TransactionStatus>,

        /// Maximum number of transactions to show
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },

    /// List failed transactions that can be retried
    Failed,

    /// Show detailed transaction information
    Show {
        /// Transaction ID
        id: TransactionId,
    },

    /// Record a completed transaction
    Create {
        /// Account number
        account: String,

        /// Transaction type (DEPOSIT, WITHDRAWAL, TRANSFER_IN, TRANSFER_OUT, FEE, INTEREST, CARD)
        #[arg(short = 't', long = "type")]
        transaction_type: TransactionType,

        /// Amount (e.g., "50.00" or "50")
        #[arg(short, long, value_parser = parse_amount)]
        amount: Decimal,

        /// Channel (ATM, ONLINE, MOBILE, BRANCH, CARD, AUTO)
        #[arg(short, long)]
        channel: Channel,

        /// Description of the transaction
        #[arg(long)]
        description: Option<String>,

        /// Counterparty account number
        #[arg(long)]
        counterparty_account: Option<String>,

        /// Counterparty name
        #[arg(long)]
        counterparty_name: Option<String>,

        /// Where the transaction took place
        #[arg(long)]
        location: Option<String>,
    },

    /// Retry a failed transaction
    Retry {
        /// Transaction ID
        id: TransactionId,
    },

    /// Verify the balance chain of an account
    Check {
        /// Account number
        account: String,
    },

    /// Summarize an account's activity
    Summary {
        /// Account number
        account: String,
    },
}

impl Cli {
    fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig::new(&self.database).with_policy(LedgerPolicy {
            card_funds_check: self.card_funds_check,
            retry_funds_check: self.retry_funds_check,
            retry_rebalances_all_types: self.retry_rebalances_all_types,
        })
    }

    fn init_tracing(&self) {
        let default_level = match (&self.command, self.verbose) {
            (_, true) => "debug",
            (Commands::Serve { .. }, false) => "info",
            (_, false) => "warn",
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub async fn run(self) -> Result<()> {
        self.init_tracing();
        let config = self.ledger_config();

        match self.command {
            Commands::Init => {
                LedgerService::init(&config.database_path, config.policy).await?;
                println!("Database initialized: {}", config.database_path.display());
            }

            Commands::Seed => {
                let service = LedgerService::init(&config.database_path, config.policy).await?;
                let inserted = service.seed_sample_data().await?;
                if inserted == 0 {
                    println!("Sample data already present.");
                } else {
                    println!("Inserted {} sample transactions.", inserted);
                }
            }

            Commands::Serve { bind, token } => {
                let server = ServerConfig {
                    bind,
                    api_token: token,
                };
                run_serve_command(config, server).await?;
            }

            Commands::Balance { account } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                let info = service.get_balance(&account).await?;
                println!("{}: {}", info.account_number, format_amount(info.current_balance));
                println!(
                    "  Available:    {}",
                    format_amount(info.available_balance)
                );
                println!(
                    "  Last updated: {}",
                    info.last_updated.format("%Y-%m-%d %H:%M:%S")
                );
            }

            Commands::History {
                account,
                status,
                limit,
            } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                let transactions = service.list_transactions(&account, status, limit).await?;
                if transactions.is_empty() {
                    println!("No transactions found.");
                } else {
                    print_transaction_table(&transactions);
                }
            }

            Commands::Failed => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                let transactions = service.list_failed_transactions().await?;
                if transactions.is_empty() {
                    println!("No failed transactions.");
                } else {
                    print_failed_table(&transactions);
                }
            }

            Commands::Show { id } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                let transaction = service.get_transaction(id).await?;
                print_transaction_detail(&transaction);
            }

            Commands::Create {
                account,
                transaction_type,
                amount,
                channel,
                description,
                counterparty_account,
                counterparty_name,
                location,
            } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                let request = CreateTransaction {
                    account_number: account,
                    transaction_type,
                    amount,
                    channel,
                    description,
                    counterparty_account,
                    counterparty_name,
                    location,
                };
                let created = service.create_transaction(request).await?;
                println!(
                    "Recorded {} {} on {} (#{})",
                    created.transaction_type,
                    format_amount(created.amount),
                    created.account_number,
                    created.transaction_id
                );
                if let Some(balance) = created.balance_after {
                    println!("  Balance after: {}", format_amount(balance));
                }
            }

            Commands::Retry { id } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                let outcome = service.retry_transaction(id).await?;
                println!(
                    "{} (#{}: {} -> {})",
                    outcome.message, outcome.transaction_id, outcome.old_status, outcome.new_status
                );
                match outcome.balance_after {
                    Some(balance) => println!("  Balance after: {}", format_amount(balance)),
                    None => println!("  Balance after: (not recorded)"),
                }
            }

            Commands::Check { account } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                run_check_command(&service, &account).await?;
            }

            Commands::Summary { account } => {
                let service = LedgerService::connect(&config.database_path, config.policy).await?;
                run_summary_command(&service, &account).await?;
            }
        }

        Ok(())
    }
}

async fn run_serve_command(config: LedgerConfig, server: ServerConfig) -> Result<()> {
    let service = LedgerService::init(&config.database_path, config.policy).await?;
    let service = Arc::new(service);
    let app = api::router(ApiState::new(service.clone(), server.api_token));

    let listener = tokio::net::TcpListener::bind(server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", server.bind))?;
    info!(
        bind = %server.bind,
        database = %config.database_path.display(),
        policy = ?config.policy,
        "serving ledger API"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

fn print_transaction_table(transactions: &[Transaction]) {
    println!(
        "{:>6} {:<11} {:<8} {:<13} {:>10} {:>10} {:<10} DESCRIPTION",
        "ID", "DATE", "TIME", "TYPE", "AMOUNT", "BALANCE", "STATUS"
    );
    println!("{}", "-".repeat(90));
    for t in transactions {
        println!(
            "{:>6} {:<11} {:<8} {:<13} {:>10} {:>10} {:<10} {}",
            t.transaction_id,
            t.transaction_date.format("%Y-%m-%d"),
            t.transaction_time.format("%H:%M:%S"),
            t.transaction_type.as_str(),
            format_amount(t.amount),
            t.balance_after.map(format_amount).unwrap_or_else(|| "-".into()),
            t.status.as_str(),
            truncate(t.description.as_deref().unwrap_or(""), 30)
        );
    }
}

fn print_failed_table(transactions: &[Transaction]) {
    println!(
        "{:>6} {:<15} {:<11} {:<13} {:>10} REASON",
        "ID", "ACCOUNT", "DATE", "TYPE", "AMOUNT"
    );
    println!("{}", "-".repeat(80));
    for t in transactions {
        println!(
            "{:>6} {:<15} {:<11} {:<13} {:>10} {}",
            t.transaction_id,
            truncate(&t.account_number, 15),
            t.transaction_date.format("%Y-%m-%d"),
            t.transaction_type.as_str(),
            format_amount(t.amount),
            t.failure_reason.as_deref().unwrap_or("")
        );
    }
}

fn print_transaction_detail(t: &Transaction) {
    println!("Transaction: {}", t.transaction_id);
    println!("  Account:      {}", t.account_number);
    println!(
        "  Date:         {} {}",
        t.transaction_date.format("%Y-%m-%d"),
        t.transaction_time.format("%H:%M:%S")
    );
    println!("  Type:         {}", t.transaction_type);
    println!("  Amount:       {}", format_amount(t.amount));
    match t.balance_after {
        Some(balance) => println!("  Balance:      {}", format_amount(balance)),
        None => println!("  Balance:      -"),
    }
    println!("  Channel:      {}", t.channel);
    println!("  Status:       {}", t.status);
    if let Some(reason) = &t.failure_reason {
        println!("  Reason:       {}", reason);
    }
    if let Some(desc) = &t.description {
        println!("  Description:  {}", desc);
    }
    if let Some(reference) = &t.reference_number {
        println!("  Reference:    {}", reference);
    }
    match (&t.counterparty_name, &t.counterparty_account) {
        (Some(name), Some(account)) => println!("  Counterparty: {} ({})", name, account),
        (Some(name), None) => println!("  Counterparty: {}", name),
        (None, Some(account)) => println!("  Counterparty: {}", account),
        (None, None) => {}
    }
    if let Some(location) = &t.location {
        println!("  Location:     {}", location);
    }
    println!(
        "  Recorded:     {}",
        t.created_at.format("%Y-%m-%d %H:%M:%S%.6f")
    );
}

async fn run_check_command(service: &LedgerService, account: &str) -> Result<()> {
    println!("Checking ledger of {}...\n", account);

    let report = service.verify_account(account).await?;

    println!("Transactions: {}", report.transaction_count);
    println!("Completed:    {}", report.completed_count);
    println!("Replayed:     {}", format_amount(report.replayed_balance));
    println!(
        "Recorded:     {}",
        report
            .recorded_balance
            .map(format_amount)
            .unwrap_or_else(|| "-".into())
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        if report.recorded_balance != Some(report.replayed_balance) {
            println!("  - recorded balance does not match the replayed balance");
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_summary_command(service: &LedgerService, account: &str) -> Result<()> {
    let summary = service.account_summary(account).await?;

    println!("Account: {}", summary.account_number);
    println!(
        "  Balance:      {}",
        summary
            .current_balance
            .map(format_amount)
            .unwrap_or_else(|| "-".into())
    );
    println!("  Transactions: {}", summary.total_transactions);
    println!(
        "    completed {} / failed {} / pending {} / cancelled {}",
        summary.completed_transactions,
        summary.failed_transactions,
        summary.pending_transactions,
        summary.cancelled_transactions
    );
    println!("  Credits:      {}", format_amount(summary.total_credits));
    println!("  Debits:       {}", format_amount(summary.total_debits));

    if !summary.failure_reasons.is_empty() {
        println!();
        println!("{:<35} {:>5}", "REASON", "COUNT");
        println!("{}", "-".repeat(41));
        for entry in &summary.failure_reasons {
            println!("{:<35} {:>5}", truncate(&entry.reason, 35), entry.count);
        }
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_command() {
        let cli = Cli::try_parse_from([
            "mockbank",
            "--database",
            "test.db",
            "create",
            "ACC-1",
            "--type",
            "withdrawal",
            "--amount",
            "50.00",
            "--channel",
            "ATM",
        ])
        .unwrap();

        assert_eq!(cli.database, PathBuf::from("test.db"));
        match cli.command {
            Commands::Create {
                transaction_type,
                amount,
                channel,
                ..
            } => {
                assert_eq!(transaction_type, TransactionType::Withdrawal);
                assert_eq!(amount, Decimal::new(5000, 2));
                assert_eq!(channel, Channel::Atm);
            }
            _ => panic!("expected create command"),
        }
    }

    #[test]
    fn test_parse_rejects_over_precise_amount() {
        let result = Cli::try_parse_from([
            "mockbank", "create", "ACC-1", "--type", "DEPOSIT", "--amount", "1.005", "--channel",
            "BRANCH",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_policy_flags_build_config() {
        let cli = Cli::try_parse_from(["mockbank", "balance", "ACC-1", "--card-funds-check"]).unwrap();
        let config = cli.ledger_config();
        assert!(config.policy.card_funds_check);
        assert!(!config.policy.retry_funds_check);
        assert!(!config.policy.retry_rebalances_all_types);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long description", 10), "a rathe...");
    }
}
