use std::net::SocketAddr;
use std::path::PathBuf;

use crate::domain::LedgerPolicy;

pub const DEFAULT_DATABASE: &str = "bank_transactions.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_API_TOKEN: &str = "demo-token-123";

/// Where the ledger lives and which rules it enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    pub policy: LedgerPolicy,
}

impl LedgerConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            policy: LedgerPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub api_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            api_token: DEFAULT_API_TOKEN.to_string(),
        }
    }
}
