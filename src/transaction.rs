//! # Transactions and Signing Requests
//!
//! A [`TransactionBag`] is one pending signing request emitted by the
//! orchestration library: the intended transaction, the forwarding path that
//! executes it, and a one-shot channel through which the dashboard accepts
//! (with the transaction hash) or rejects the request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

static NEXT_BAG_ID: AtomicU64 = AtomicU64::new(1);

/// A transaction as described by the orchestration library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub data: String,
    /// Value in wei, hex-encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    /// Radspec description of the call
    #[serde(default)]
    pub description: String,
    /// Name of the app receiving the call
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_description: Option<Vec<AnnotatedDescription>>,
    /// Setup transaction that must settle before this one (token approvals)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretransaction: Option<Box<Transaction>>,
}

/// One fragment of an annotated description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AnnotatedDescription {
    Address(String),
    App(AppReference),
    Role(RoleReference),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppReference {
    pub name: String,
    pub proxy_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleReference {
    pub name: String,
}

/// How a signing request was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BagOutcome {
    Accepted { hash: String },
    Rejected { error: String },
}

/// A pending signing request.
///
/// Clones share the same identity and resolution channel; the first
/// `accept`/`reject` wins and later calls are no-ops.
#[derive(Clone)]
pub struct TransactionBag {
    id: u64,
    pub transaction: Transaction,
    pub path: Vec<Transaction>,
    responder: Arc<Mutex<Option<oneshot::Sender<BagOutcome>>>>,
}

impl TransactionBag {
    /// Create a request and the receiver its resolution is delivered to
    pub fn new(transaction: Transaction, path: Vec<Transaction>) -> (Self, oneshot::Receiver<BagOutcome>) {
        let (tx, rx) = oneshot::channel();
        let bag = TransactionBag {
            id: NEXT_BAG_ID.fetch_add(1, Ordering::Relaxed),
            transaction,
            path,
            responder: Arc::new(Mutex::new(Some(tx))),
        };
        (bag, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identity comparison: clones of one request are the same request
    pub fn same_request(&self, other: &TransactionBag) -> bool {
        self.id == other.id
    }

    /// Resolve with the hash of the sent transaction
    pub fn accept(&self, hash: impl Into<String>) -> bool {
        self.resolve(BagOutcome::Accepted { hash: hash.into() })
    }

    /// Resolve with the error that prevented sending
    pub fn reject(&self, error: impl Into<String>) -> bool {
        self.resolve(BagOutcome::Rejected { error: error.into() })
    }

    pub fn is_resolved(&self) -> bool {
        self.responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn resolve(&self, outcome: BagOutcome) -> bool {
        let sender = self
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                // The requester may have stopped listening; the bag is resolved either way
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TransactionBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionBag")
            .field("id", &self.id)
            .field("transaction", &self.transaction)
            .field("path", &self.path)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
