//! # Orchestration Library Boundary
//!
//! The DAO orchestration library resolves organization names, opens sessions
//! against an organization and streams its installed apps, permissions,
//! forwarders and signing requests. The dashboard only sees it through
//! [`Orchestrator`] and [`DaoSession`].

use crate::apps::{Permissions, RawApp};
use crate::config::GasPricePolicy;
use crate::error::DaoResult;
use crate::transaction::TransactionBag;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Options used to open a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Read-only node the library queries
    pub provider_url: String,
    pub gas_price: GasPricePolicy,
    pub ens_registry: String,
    pub ipfs_gateway: String,
}

/// Options used to initialize an opened session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Accounts the library may act with
    pub provided_accounts: Vec<String>,
}

/// Bidirectional message channel between the library and an app context
/// (an embedded frame or a background worker).
#[derive(Debug)]
pub struct MessagePort {
    pub outbound: mpsc::UnboundedSender<Value>,
    pub inbound: mpsc::UnboundedReceiver<Value>,
}

impl MessagePort {
    /// Two connected ends of a channel
    pub fn pair() -> (MessagePort, MessagePort) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            MessagePort {
                outbound: a_tx,
                inbound: b_rx,
            },
            MessagePort {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }
}

/// A cancellable registration. `unsubscribe` is idempotent.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription that stops a spawned task
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    /// Subscription with nothing to tear down
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Name resolution and session factory
#[async_trait]
pub trait Orchestrator: Send + Sync {
    type Session: DaoSession;

    /// Resolve an ENS name. Fails with
    /// [`OrchestratorError::NameNotDefined`](crate::error::OrchestratorError::NameNotDefined)
    /// when the name has no record.
    async fn resolve_name(&self, name: &str, ens_registry: &str) -> DaoResult<Option<String>>;

    async fn open_session(&self, dao_address: &str, options: SessionOptions) -> DaoResult<Self::Session>;
}

/// A session against one organization
#[async_trait]
pub trait DaoSession: Send + Sync + 'static {
    async fn init(&self, options: InitOptions) -> DaoResult<()>;

    fn set_accounts(&self, accounts: Vec<String>);

    /// Each call returns an independent subscription to the stream
    fn apps(&self) -> BoxStream<'static, Vec<RawApp>>;

    fn permissions(&self) -> BoxStream<'static, Permissions>;

    fn forwarders(&self) -> BoxStream<'static, Vec<RawApp>>;

    fn transaction_requests(&self) -> BoxStream<'static, TransactionBag>;

    /// Connect an app context to the session; the returned subscription shuts it down
    fn run_app(&self, port: MessagePort, proxy_address: &str) -> DaoResult<Subscription>;
}
