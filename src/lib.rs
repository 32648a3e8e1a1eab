//! # DAO Dashboard Core
//!
//! Client core of a DAO management dashboard: wallet polling, DAO session
//! setup over an orchestration library, background app workers and the
//! transaction signing panel.

pub mod apps;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod shell;
pub mod signer;
pub mod transaction;
pub mod utils;
pub mod wallet;
pub mod watchers;
pub mod workers;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::NetworkConfig;
pub use error::{DaoError, DaoResult};
pub use services::{EthereumRpcClient, HttpContentFetcher};
pub use session::{connect_dao, DaoConnection, SessionEvent, SessionState};
pub use signer::{SignerPanel, SigningStatus};
pub use transaction::TransactionBag;
pub use watchers::{WalletMonitor, WalletState};
pub use workers::WorkerSubscriptionPool;
