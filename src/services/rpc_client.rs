use crate::config::network::REQUEST_TIMEOUT;
use crate::config::NetworkConfig;
use crate::error::{DaoError, DaoResult, NetworkError, NetworkResult};
use crate::transaction::Transaction;
use crate::utils::address;
use crate::wallet::{network_type_from_id, Balance, WalletProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Decode a JSON-RPC response body into its result
fn decode_response<T: DeserializeOwned>(body: &str) -> NetworkResult<T> {
    let response: RpcResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        return Err(NetworkError::JsonRpc {
            code: error.code,
            message: error.message,
        });
    }
    let result = response.result.ok_or_else(|| NetworkError::InvalidResponse {
        message: "response has neither result nor error".to_string(),
    })?;
    Ok(serde_json::from_value(result)?)
}

fn quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// `eth_sendTransaction` parameter object
fn transaction_params(tx: &Transaction) -> Value {
    let mut params = json!({
        "from": tx.from,
        "to": tx.to,
        "data": tx.data,
    });
    if let Some(value) = &tx.value {
        params["value"] = json!(value);
    }
    if let Some(gas) = tx.gas {
        params["gas"] = json!(quantity(u128::from(gas)));
    }
    if let Some(gas_price) = &tx.gas_price {
        params["gasPrice"] = json!(gas_price);
    }
    params
}

fn parse_network_type(net_version: &str) -> NetworkResult<&'static str> {
    net_version
        .trim()
        .parse::<u64>()
        .map(network_type_from_id)
        .map_err(|_| NetworkError::InvalidResponse {
            message: format!("unexpected net_version: {}", net_version),
        })
}

/// Wallet provider reached over Ethereum JSON-RPC (a local node, Frame, ...)
#[derive(Debug)]
pub struct EthereumRpcClient {
    client: Client,
    url: String,
    provider_id: String,
    next_id: AtomicU64,
}

impl EthereumRpcClient {
    pub fn new(url: impl Into<String>, provider_id: impl Into<String>) -> DaoResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DaoError::operation("client_creation", e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            provider_id: provider_id.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// The user's wallet
    pub fn wallet(config: &NetworkConfig) -> DaoResult<Self> {
        Self::new(config.wallet_rpc_url.clone(), config.wallet_provider_id.clone())
    }

    /// The read-only node of the configured network
    pub fn node(config: &NetworkConfig) -> DaoResult<Self> {
        Self::new(config.rpc_url.clone(), "unknown")
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> DaoResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        log::trace!("JSON-RPC {} -> {}", method, self.url);

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        Ok(decode_response(&body)?)
    }

    pub async fn accounts(&self) -> DaoResult<Vec<String>> {
        self.call("eth_accounts", json!([])).await
    }
}

#[async_trait]
impl WalletProvider for EthereumRpcClient {
    async fn get_account(&self) -> DaoResult<Option<String>> {
        Ok(self.accounts().await?.into_iter().next())
    }

    async fn get_balance(&self, account: &str) -> DaoResult<Balance> {
        let account = address::validate(account)?;
        let raw: Option<String> = self.call("eth_getBalance", json!([account, "latest"])).await?;
        Ok(Balance::parse(raw.as_deref()))
    }

    async fn get_network_type(&self) -> DaoResult<String> {
        let version: String = self.call("net_version", json!([])).await?;
        Ok(parse_network_type(&version)?.to_string())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> DaoResult<String> {
        self.call("eth_sendTransaction", json!([transaction_params(transaction)]))
            .await
            .map_err(|e| match e {
                DaoError::Wallet { message } => DaoError::transaction(message),
                other => other,
            })
    }

    async fn request_accounts(&self) -> DaoResult<Vec<String>> {
        self.call("eth_requestAccounts", json!([])).await
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn is_available(&self) -> bool {
        !self.url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result() {
        let accounts: Vec<String> =
            decode_response(r#"{"jsonrpc":"2.0","id":1,"result":["0xabc"]}"#).unwrap();
        assert_eq!(accounts, vec!["0xabc".to_string()]);
    }

    #[test]
    fn test_decode_error_object() {
        let err = decode_response::<String>(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":4001,"message":"User denied transaction signature"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, NetworkError::JsonRpc { code: 4001, .. }));

        let converted: DaoError = err.into();
        assert!(matches!(converted, DaoError::Wallet { .. }));
    }

    #[test]
    fn test_decode_malformed_responses() {
        assert!(matches!(
            decode_response::<String>(r#"{"jsonrpc":"2.0","id":1}"#),
            Err(NetworkError::InvalidResponse { .. })
        ));
        assert!(matches!(
            decode_response::<String>("not json"),
            Err(NetworkError::JsonParsing { .. })
        ));
    }

    #[test]
    fn test_transaction_params() {
        let tx = Transaction {
            from: "0xme".to_string(),
            to: "0xfinance".to_string(),
            data: "0x1234".to_string(),
            gas: Some(21000),
            gas_price: Some("0x2540be400".to_string()),
            ..Default::default()
        };
        let params = transaction_params(&tx);
        assert_eq!(params["gas"], "0x5208");
        assert_eq!(params["gasPrice"], "0x2540be400");
        assert!(params.get("value").is_none());
    }

    #[test]
    fn test_network_type_from_net_version() {
        assert_eq!(parse_network_type("4").unwrap(), "rinkeby");
        assert_eq!(parse_network_type("1").unwrap(), "main");
        assert!(parse_network_type("rinkeby").is_err());
    }

    #[tokio::test]
    async fn test_balance_of_malformed_account_is_rejected_locally() {
        let client = EthereumRpcClient::new("http://127.0.0.1:9", "frame").unwrap();
        let err = client.get_balance("0xme").await.unwrap_err();
        assert!(matches!(err, DaoError::InvalidAddress { ref address } if address == "0xme"));
    }

    #[test]
    fn test_clients_from_config() {
        let config = NetworkConfig::for_network("4").unwrap();
        let wallet = EthereumRpcClient::wallet(&config).unwrap();
        assert_eq!(wallet.url(), config.wallet_rpc_url);
        assert!(wallet.is_available());
        let node = EthereumRpcClient::node(&config).unwrap();
        assert_eq!(node.provider_id(), "unknown");
    }
}
