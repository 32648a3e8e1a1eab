//! Scripted collaborators for unit tests.

use crate::apps::{Permissions, RawApp};
use crate::error::{DaoError, DaoResult, OrchestratorError};
use crate::orchestrator::{DaoSession, InitOptions, MessagePort, Orchestrator, SessionOptions, Subscription};
use crate::transaction::{Transaction, TransactionBag};
use crate::wallet::{Balance, WalletProvider};
use crate::workers::{ContentFetcher, ScriptRuntime, Worker};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Wallet whose answers are set by the test
pub struct MockWallet {
    account: Mutex<Option<String>>,
    balance: Mutex<Balance>,
    network: Mutex<Option<String>>,
    send_results: Mutex<VecDeque<DaoResult<String>>>,
    send_delay: Mutex<Option<Duration>>,
    sent: Mutex<Vec<Transaction>>,
    available: bool,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            account: Mutex::new(None),
            balance: Mutex::new(Balance::Unknown),
            network: Mutex::new(Some("rinkeby".to_string())),
            send_results: Mutex::new(VecDeque::new()),
            send_delay: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            available: true,
        }
    }

    pub fn with_account(self, account: &str) -> Self {
        self.set_account(Some(account));
        self
    }

    pub fn with_balance(self, balance: Balance) -> Self {
        self.set_balance(balance);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn set_account(&self, account: Option<&str>) {
        *self.account.lock().unwrap() = account.map(str::to_string);
    }

    pub fn set_balance(&self, balance: Balance) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_network(&self, network: &str) {
        *self.network.lock().unwrap() = Some(network.to_string());
    }

    pub fn fail_network(&self) {
        *self.network.lock().unwrap() = None;
    }

    /// Queue the outcome of the next `send_transaction`; unqueued sends succeed
    pub fn push_send_result(&self, result: DaoResult<String>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn get_account(&self) -> DaoResult<Option<String>> {
        Ok(self.account.lock().unwrap().clone())
    }

    async fn get_balance(&self, _account: &str) -> DaoResult<Balance> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_network_type(&self) -> DaoResult<String> {
        self.network
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DaoError::wallet("connection not open"))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> DaoResult<String> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(transaction.clone());
            sent.len()
        };
        let queued = self.send_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(format!("0xhash{}", count)))
    }

    fn provider_id(&self) -> &str {
        "metamask"
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

fn broadcast_stream<T: Clone + Send + 'static>(tx: &broadcast::Sender<T>) -> BoxStream<'static, T> {
    futures::stream::unfold(tx.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(value) => return Some((value, rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

struct MockSessionInner {
    apps: broadcast::Sender<Vec<RawApp>>,
    permissions: broadcast::Sender<Permissions>,
    forwarders: broadcast::Sender<Vec<RawApp>>,
    transactions: broadcast::Sender<TransactionBag>,
    init_error: Mutex<Option<OrchestratorError>>,
    init_calls: Mutex<Vec<InitOptions>>,
    account_updates: Mutex<Vec<Vec<String>>>,
    run_app_calls: Mutex<Vec<String>>,
    active_apps: Arc<AtomicUsize>,
}

/// Session whose streams are fed by the test
#[derive(Clone)]
pub struct MockSession {
    inner: Arc<MockSessionInner>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockSessionInner {
                apps: broadcast::channel(16).0,
                permissions: broadcast::channel(16).0,
                forwarders: broadcast::channel(16).0,
                transactions: broadcast::channel(16).0,
                init_error: Mutex::new(None),
                init_calls: Mutex::new(Vec::new()),
                account_updates: Mutex::new(Vec::new()),
                run_app_calls: Mutex::new(Vec::new()),
                active_apps: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    pub fn fail_init(&self, error: OrchestratorError) {
        *self.inner.init_error.lock().unwrap() = Some(error);
    }

    pub fn emit_apps(&self, apps: Vec<RawApp>) {
        let _ = self.inner.apps.send(apps);
    }

    pub fn emit_permissions(&self, permissions: Permissions) {
        let _ = self.inner.permissions.send(permissions);
    }

    pub fn emit_forwarders(&self, forwarders: Vec<RawApp>) {
        let _ = self.inner.forwarders.send(forwarders);
    }

    pub fn emit_transaction(&self, bag: TransactionBag) {
        let _ = self.inner.transactions.send(bag);
    }

    pub fn init_calls(&self) -> Vec<InitOptions> {
        self.inner.init_calls.lock().unwrap().clone()
    }

    pub fn account_updates(&self) -> Vec<Vec<String>> {
        self.inner.account_updates.lock().unwrap().clone()
    }

    pub fn run_app_calls(&self) -> Vec<String> {
        self.inner.run_app_calls.lock().unwrap().clone()
    }

    /// Apps connected through `run_app` and not shut down yet
    pub fn active_apps(&self) -> usize {
        self.inner.active_apps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DaoSession for MockSession {
    async fn init(&self, options: InitOptions) -> DaoResult<()> {
        self.inner.init_calls.lock().unwrap().push(options);
        match self.inner.init_error.lock().unwrap().clone() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn set_accounts(&self, accounts: Vec<String>) {
        self.inner.account_updates.lock().unwrap().push(accounts);
    }

    fn apps(&self) -> BoxStream<'static, Vec<RawApp>> {
        broadcast_stream(&self.inner.apps)
    }

    fn permissions(&self) -> BoxStream<'static, Permissions> {
        broadcast_stream(&self.inner.permissions)
    }

    fn forwarders(&self) -> BoxStream<'static, Vec<RawApp>> {
        broadcast_stream(&self.inner.forwarders)
    }

    fn transaction_requests(&self) -> BoxStream<'static, TransactionBag> {
        broadcast_stream(&self.inner.transactions)
    }

    fn run_app(&self, _port: MessagePort, proxy_address: &str) -> DaoResult<Subscription> {
        self.inner
            .run_app_calls
            .lock()
            .unwrap()
            .push(proxy_address.to_string());
        let active = self.inner.active_apps.clone();
        active.fetch_add(1, Ordering::SeqCst);
        Ok(Subscription::new(move || {
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

/// Orchestrator resolving names from a table and handing out one session
pub struct MockOrchestrator {
    names: HashMap<String, String>,
    resolve_error: Option<OrchestratorError>,
    session: MockSession,
    opened: Mutex<Vec<(String, SessionOptions)>>,
}

impl MockOrchestrator {
    pub fn new(session: MockSession) -> Self {
        Self {
            names: HashMap::new(),
            resolve_error: None,
            session,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: &str, address: &str) -> Self {
        self.names.insert(name.to_string(), address.to_string());
        self
    }

    pub fn with_resolve_error(mut self, error: OrchestratorError) -> Self {
        self.resolve_error = Some(error);
        self
    }

    pub fn opened(&self) -> Vec<(String, SessionOptions)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    type Session = MockSession;

    async fn resolve_name(&self, name: &str, _ens_registry: &str) -> DaoResult<Option<String>> {
        if let Some(error) = &self.resolve_error {
            return Err(error.clone().into());
        }
        match self.names.get(name) {
            Some(address) => Ok(Some(address.clone())),
            None => Err(OrchestratorError::NameNotDefined.into()),
        }
    }

    async fn open_session(&self, dao_address: &str, options: SessionOptions) -> DaoResult<MockSession> {
        self.opened
            .lock()
            .unwrap()
            .push((dao_address.to_string(), options));
        Ok(self.session.clone())
    }
}

/// Serves scripts from a table; unknown URLs fail like a 404
#[derive(Default)]
pub struct MockFetcher {
    scripts: HashMap<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, url: &str, source: &str) -> Self {
        self.scripts.insert(url.to_string(), source.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch_text(&self, url: &str) -> DaoResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.scripts
            .get(url)
            .cloned()
            .ok_or_else(|| DaoError::operation("fetch", format!("HTTP 404 Not Found: {}", url)))
    }
}

pub struct MockWorker {
    pub terminated: Arc<AtomicBool>,
}

impl Worker for MockWorker {
    fn terminate(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Records every worker it starts
#[derive(Default)]
pub struct MockRuntime {
    started: Mutex<Vec<(String, Arc<AtomicBool>)>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(proxy, _)| proxy.clone())
            .collect()
    }

    /// Workers started and not terminated
    pub fn running(&self) -> usize {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, terminated)| !terminated.load(Ordering::SeqCst))
            .count()
    }
}

impl ScriptRuntime for MockRuntime {
    fn spawn(&self, app: &RawApp, _source: &str) -> DaoResult<(Box<dyn Worker>, MessagePort)> {
        let terminated = Arc::new(AtomicBool::new(false));
        self.started
            .lock()
            .unwrap()
            .push((app.proxy_address.clone(), terminated.clone()));
        let (port, _worker_end) = MessagePort::pair();
        Ok((Box::new(MockWorker { terminated }), port))
    }
}
