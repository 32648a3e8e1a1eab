//! # Configuration
//!
//! Constants for the supported networks and the timing of watchers and the
//! signer panel, plus the [`NetworkConfig`] struct that is resolved once at
//! startup and shared by reference with every component that needs it.

use crate::error::{DaoError, DaoResult};
use serde::Serialize;
use std::env as std_env;

/// Network and RPC configuration
pub mod network {
    use std::time::Duration;

    /// Network selected when `DAO_NETWORK` is not set (Rinkeby)
    pub const DEFAULT_NETWORK_ID: &str = "4";

    /// Public IPFS gateway used by Aragon deployments
    pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.eth.aragon.network/ipfs";

    /// Local wallet endpoint when no injected provider URL is configured
    pub const DEFAULT_WALLET_RPC_URL: &str = "http://127.0.0.1:8545";

    /// Request timeout for network operations
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Mainnet
    pub mod main {
        pub const ID: u64 = 1;
        pub const TYPE: &str = "main";
        pub const RPC_URL: &str = "https://mainnet.infura.io/";
        pub const ENS_REGISTRY: &str = "0x314159265dd8dbb310642f98f50c066173c1259b";
        pub const DEFAULT_ETH_NODE: &str = "wss://mainnet.eth.aragon.network/ws";
    }

    /// Rinkeby testnet
    pub mod rinkeby {
        pub const ID: u64 = 4;
        pub const TYPE: &str = "rinkeby";
        pub const RPC_URL: &str = "https://rinkeby.infura.io/";
        pub const ENS_REGISTRY: &str = "0x98df287b6c145399aaa709692c8d308357bc085d";
        pub const DEFAULT_ETH_NODE: &str = "wss://rinkeby.eth.aragon.network/ws";
    }

    /// Kovan testnet. Aragon never deployed an ENS registry here.
    pub mod kovan {
        pub const ID: u64 = 42;
        pub const TYPE: &str = "kovan";
        pub const RPC_URL: &str = "https://kovan.infura.io/";
        pub const ENS_REGISTRY: &str = "";
        pub const DEFAULT_ETH_NODE: &str = "";
    }
}

/// Polling and timer constants
pub mod polling {
    use std::time::Duration;

    /// Delay between two main-account (and balance) requests
    pub const ACCOUNT_DELAY: Duration = Duration::from_millis(2000);

    /// Delay between two wallet network requests
    pub const NETWORK_DELAY: Duration = Duration::from_millis(2000);

    /// Delay between two connectivity probes
    pub const CONNECTIVITY_DELAY: Duration = Duration::from_millis(2000);

    /// Minimum spacing of permission snapshots handed to the UI
    pub const PERMISSIONS_THROTTLE: Duration = Duration::from_millis(100);

    /// The signer panel closes itself this long after a successful signature
    pub const SIGNER_AUTO_CLOSE: Duration = Duration::from_millis(3000);
}

/// Package registry constants
pub mod registry {
    use crate::utils::amount::gwei_to_wei;

    /// Apps published here get no registry tag
    pub const DEFAULT_APM_REGISTRY: &str = "aragonpm.eth";

    /// Gas price used on every network except mainnet (10 gwei)
    pub const FIXED_GAS_PRICE_WEI: u128 = gwei_to_wei(10);
}

/// Environment variable names
pub mod env {
    /// Network id selecting the network table (`1`, `4`, `42`)
    pub const NETWORK: &str = "DAO_NETWORK";

    /// Wallet provider JSON-RPC endpoint
    pub const WALLET_RPC_URL: &str = "WALLET_RPC_URL";

    /// Wallet kind (`metamask`, `frame`, ...)
    pub const WALLET_PROVIDER_ID: &str = "WALLET_PROVIDER_ID";

    /// Read-only node override
    pub const DEFAULT_ETH_NODE: &str = "DEFAULT_ETH_NODE";

    /// IPFS gateway override
    pub const IPFS_GATEWAY: &str = "IPFS_GATEWAY";

    /// DAO opened for the `main` route
    pub const DEFAULT_DAO_ADDRESS: &str = "DEFAULT_DAO_ADDRESS";
}

/// How transactions sent through the orchestration library get their gas price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GasPricePolicy {
    /// Leave the price to the wallet provider's estimation
    ProviderEstimate,
    /// Hardcoded price in wei
    Fixed(u128),
}

impl GasPricePolicy {
    /// Price to attach to an outgoing transaction, if any
    pub fn gas_price(&self) -> Option<u128> {
        match self {
            GasPricePolicy::ProviderEstimate => None,
            GasPricePolicy::Fixed(wei) => Some(*wei),
        }
    }
}

/// Everything that depends on the selected network.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkConfig {
    pub id: u64,
    /// Network type name as reported by wallets (`main`, `rinkeby`, ...)
    pub network_type: String,
    pub rpc_url: String,
    pub ens_registry: String,
    pub default_eth_node: String,
    pub ipfs_gateway: String,
    pub gas_price: GasPricePolicy,
    pub wallet_rpc_url: String,
    pub wallet_provider_id: String,
    pub default_dao_address: String,
}

impl NetworkConfig {
    /// Build the configuration for a network id with built-in defaults
    pub fn for_network(network_id: &str) -> DaoResult<Self> {
        let (id, network_type, rpc_url, ens_registry, default_eth_node) = match network_id.trim() {
            "1" => (
                network::main::ID,
                network::main::TYPE,
                network::main::RPC_URL,
                network::main::ENS_REGISTRY,
                network::main::DEFAULT_ETH_NODE,
            ),
            "4" => (
                network::rinkeby::ID,
                network::rinkeby::TYPE,
                network::rinkeby::RPC_URL,
                network::rinkeby::ENS_REGISTRY,
                network::rinkeby::DEFAULT_ETH_NODE,
            ),
            "42" => (
                network::kovan::ID,
                network::kovan::TYPE,
                network::kovan::RPC_URL,
                network::kovan::ENS_REGISTRY,
                network::kovan::DEFAULT_ETH_NODE,
            ),
            other => {
                return Err(DaoError::config(format!("Unsupported network id: {}", other)));
            }
        };

        // On mainnet rely on the provider's gas estimation
        let gas_price = if id == network::main::ID {
            GasPricePolicy::ProviderEstimate
        } else {
            GasPricePolicy::Fixed(registry::FIXED_GAS_PRICE_WEI)
        };

        Ok(NetworkConfig {
            id,
            network_type: network_type.to_string(),
            rpc_url: rpc_url.to_string(),
            ens_registry: ens_registry.to_string(),
            default_eth_node: default_eth_node.to_string(),
            ipfs_gateway: network::DEFAULT_IPFS_GATEWAY.to_string(),
            gas_price,
            wallet_rpc_url: network::DEFAULT_WALLET_RPC_URL.to_string(),
            wallet_provider_id: "unknown".to_string(),
            default_dao_address: String::new(),
        })
    }

    /// Build the configuration from the environment (and `.env`), falling back to defaults
    pub fn from_env() -> DaoResult<Self> {
        dotenv::dotenv().ok();

        let network_id = std_env::var(env::NETWORK)
            .unwrap_or_else(|_| network::DEFAULT_NETWORK_ID.to_string());
        let mut config = Self::for_network(&network_id)?;

        if let Ok(url) = std_env::var(env::WALLET_RPC_URL) {
            config.wallet_rpc_url = url;
        }
        if let Ok(id) = std_env::var(env::WALLET_PROVIDER_ID) {
            config.wallet_provider_id = id;
        }
        if let Ok(node) = std_env::var(env::DEFAULT_ETH_NODE) {
            config.default_eth_node = node;
        }
        if let Ok(gateway) = std_env::var(env::IPFS_GATEWAY) {
            config.ipfs_gateway = gateway.trim_end_matches('/').to_string();
        }
        if let Ok(dao) = std_env::var(env::DEFAULT_DAO_ADDRESS) {
            config.default_dao_address = dao;
        }

        Ok(config)
    }

    /// Whether names can be resolved on this network
    pub fn has_ens_registry(&self) -> bool {
        !self.ens_registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_uses_provider_gas_estimation() {
        let config = NetworkConfig::for_network("1").unwrap();
        assert_eq!(config.network_type, "main");
        assert_eq!(config.gas_price, GasPricePolicy::ProviderEstimate);
        assert_eq!(config.gas_price.gas_price(), None);
    }

    #[test]
    fn test_testnets_use_fixed_gas_price() {
        let rinkeby = NetworkConfig::for_network("4").unwrap();
        assert_eq!(rinkeby.network_type, "rinkeby");
        assert_eq!(rinkeby.gas_price.gas_price(), Some(10_000_000_000));
        assert!(rinkeby.has_ens_registry());

        let kovan = NetworkConfig::for_network("42").unwrap();
        assert!(!kovan.has_ens_registry());
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        let err = NetworkConfig::for_network("1337").unwrap_err();
        assert!(matches!(err, DaoError::Configuration { .. }));
    }
}
