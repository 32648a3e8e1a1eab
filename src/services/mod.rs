//! # Services Module
//!
//! Network clients behind the dashboard's collaborator traits.
//!
//! ## Components
//!
//! - **RPC Client**: Ethereum JSON-RPC wallet provider
//! - **Content Client**: HTTP fetcher for app scripts

pub mod content_client;
pub mod rpc_client;

pub use content_client::HttpContentFetcher;
pub use rpc_client::EthereumRpcClient;
