//! # Error Types for the DAO Dashboard
//!
//! This module provides error handling for session setup, wallet access,
//! transaction signing and the network clients.

use thiserror::Error;

/// Main error type for all dashboard operations
#[derive(Debug, Error)]
pub enum DaoError {
    /// The address or domain does not resolve to an organization
    #[error("DAO not found: {dao}")]
    DaoNotFound { dao: String },

    /// The session cannot initialize without network connectivity
    #[error("No connection: {message}")]
    NoConnection { message: String },

    /// Unclassified failure reported by the orchestration library
    #[error("Orchestration failed: {source}")]
    Orchestrator {
        #[from]
        source: OrchestratorError,
    },

    /// Wallet provider failures (locked account, rejected request, ...)
    #[error("Wallet error: {message}")]
    Wallet { message: String },

    /// Errors while sending a transaction
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Background script could not be fetched or started
    #[error("Failed to load script {url}: {message}")]
    ScriptLoad { url: String, message: String },

    /// Configuration errors during startup
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Network request failures
    #[error("Network request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// File I/O operations
    #[error("File operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Address parsing and validation errors
    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    /// Generic operation failures with context
    #[error("Operation failed: {operation} - {message}")]
    OperationFailed { operation: String, message: String },
}

/// Result type alias for dashboard operations
pub type DaoResult<T> = Result<T, DaoError>;

impl DaoError {
    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a wallet error with a message
    pub fn wallet(message: impl Into<String>) -> Self {
        Self::Wallet {
            message: message.into(),
        }
    }

    /// Create a transaction error with a message
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create an operation failed error
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// One of the two failures the session initializer classifies
    pub fn is_session_failure(&self) -> bool {
        matches!(self, DaoError::DaoNotFound { .. } | DaoError::NoConnection { .. })
    }

    /// Check if this error is retryable (network/temporary issues)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DaoError::Network { .. }
                | DaoError::NoConnection { .. }
                | DaoError::Orchestrator {
                    source: OrchestratorError::ConnectionNotOpen
                }
        )
    }
}

/// Failures reported by the orchestration library.
///
/// The messages are the library's own, so they can be matched when the
/// failure crosses a boundary as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("ENS name not defined.")]
    NameNotDefined,

    #[error("Provided daoAddress is not a DAO")]
    NotADao,

    #[error("connection not open")]
    ConnectionNotOpen,

    #[error("{message}")]
    Other { message: String },
}

impl OrchestratorError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Classify a raw library message
    pub fn from_message(message: &str) -> Self {
        match message {
            "ENS name not defined." => Self::NameNotDefined,
            "Provided daoAddress is not a DAO" => Self::NotADao,
            "connection not open" => Self::ConnectionNotOpen,
            other => Self::other(other),
        }
    }
}

/// JSON-RPC client specific errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failures
    #[error("HTTP request failed: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Error object returned by the node
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    /// JSON parsing errors
    #[error("JSON parsing failed: {source}")]
    JsonParsing {
        #[from]
        source: serde_json::Error,
    },

    /// API response validation errors
    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },
}

/// Result type alias for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<NetworkError> for DaoError {
    fn from(err: NetworkError) -> Self {
        match err {
            // Wallets report user rejections and locked accounts as RPC errors
            NetworkError::JsonRpc { message, .. } => DaoError::wallet(message),
            other => DaoError::operation("network", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = DaoError::config("Unsupported network");
        assert!(matches!(config_err, DaoError::Configuration { .. }));

        let not_found = DaoError::DaoNotFound {
            dao: "mycompany.eth".to_string(),
        };
        assert!(not_found.is_session_failure());
        assert_eq!(not_found.to_string(), "DAO not found: mycompany.eth");
    }

    #[test]
    fn test_orchestrator_messages_round_trip() {
        for err in [
            OrchestratorError::NameNotDefined,
            OrchestratorError::NotADao,
            OrchestratorError::ConnectionNotOpen,
        ] {
            assert_eq!(OrchestratorError::from_message(&err.to_string()), err);
        }
        assert_eq!(
            OrchestratorError::from_message("boom"),
            OrchestratorError::other("boom")
        );
    }

    #[test]
    fn test_error_classification() {
        let unclassified: DaoError = OrchestratorError::other("kernel reverted").into();
        assert!(!unclassified.is_session_failure());
        assert!(!unclassified.is_retryable());

        let closed: DaoError = OrchestratorError::ConnectionNotOpen.into();
        assert!(closed.is_retryable());

        let rpc: DaoError = NetworkError::JsonRpc {
            code: 4001,
            message: "User denied transaction signature".to_string(),
        }
        .into();
        assert!(matches!(rpc, DaoError::Wallet { .. }));
    }
}
