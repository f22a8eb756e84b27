// Application layer - use cases over the ledger.
// Every client (CLI, HTTP API, tests) goes through LedgerService.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
