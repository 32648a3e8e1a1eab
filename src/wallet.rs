//! # Wallet Provider Boundary
//!
//! The dashboard talks to the user's wallet only through [`WalletProvider`].
//! [`crate::services::EthereumRpcClient`] is the JSON-RPC implementation.

use crate::error::DaoResult;
use crate::transaction::Transaction;
use crate::utils::amount::format_wei;
use async_trait::async_trait;
use std::fmt;

/// An account balance in wei.
///
/// Values a provider returns that cannot be read as a non-negative integer
/// become [`Balance::Unknown`] instead of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Balance {
    Wei(u128),
    #[default]
    Unknown,
}

impl Balance {
    /// Normalize a raw provider value (decimal digits or `0x` hex quantity)
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Balance::Unknown;
        };

        let parsed = if let Some(hex_digits) = raw.strip_prefix("0x") {
            if hex_digits.is_empty() || !hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
                None
            } else {
                u128::from_str_radix(hex_digits, 16).ok()
            }
        } else if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            raw.parse::<u128>().ok()
        } else {
            None
        };

        parsed.map_or(Balance::Unknown, Balance::Wei)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Wei(wei) => write!(f, "{}", format_wei(*wei)),
            Balance::Unknown => write!(f, "—"),
        }
    }
}

/// Wallet/provider collaborator
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Main account exposed by the wallet, `None` when locked or not enabled
    async fn get_account(&self) -> DaoResult<Option<String>>;

    async fn get_balance(&self, account: &str) -> DaoResult<Balance>;

    /// Network type name (`main`, `rinkeby`, ...)
    async fn get_network_type(&self) -> DaoResult<String>;

    /// Send a transaction, returning its hash
    async fn send_transaction(&self, transaction: &Transaction) -> DaoResult<String>;

    /// Ask the wallet to expose its accounts
    async fn request_accounts(&self) -> DaoResult<Vec<String>> {
        Ok(self.get_account().await?.into_iter().collect())
    }

    /// Wallet kind used for provider-specific wording (`metamask`, `frame`)
    fn provider_id(&self) -> &str {
        "unknown"
    }

    /// Whether a provider is present at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Map an `net_version` id to the network type name wallets report
pub fn network_type_from_id(id: u64) -> &'static str {
    match id {
        1 => "main",
        3 => "ropsten",
        4 => "rinkeby",
        5 => "goerli",
        42 => "kovan",
        _ => "private",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_parsing() {
        assert_eq!(Balance::parse(Some("1000")), Balance::Wei(1000));
        assert_eq!(Balance::parse(Some("0x3e8")), Balance::Wei(1000));
        assert_eq!(Balance::parse(Some("0x0")), Balance::Wei(0));
        assert_eq!(Balance::parse(None), Balance::Unknown);
        assert_eq!(Balance::parse(Some("")), Balance::Unknown);
        assert_eq!(Balance::parse(Some("-5")), Balance::Unknown);
        assert_eq!(Balance::parse(Some("1e18")), Balance::Unknown);
        assert_eq!(Balance::parse(Some("0x")), Balance::Unknown);
        assert_eq!(
            Balance::parse(Some("999999999999999999999999999999999999999999")),
            Balance::Unknown
        );
    }

    #[test]
    fn test_balance_display() {
        assert_eq!(Balance::Wei(2_000_000_000_000_000_000).to_string(), "2.0000 ETH");
        assert_eq!(Balance::Unknown.to_string(), "—");
    }

    #[test]
    fn test_network_type_mapping() {
        assert_eq!(network_type_from_id(1), "main");
        assert_eq!(network_type_from_id(4), "rinkeby");
        assert_eq!(network_type_from_id(1337), "private");
    }
}
