//! # Polling Watchers
//!
//! Wallets expose no change notifications we can rely on, so account,
//! balance, network and connectivity are polled. Each watcher is one task:
//! it awaits its request, hands the result to its handler, sleeps, and
//! repeats. Requests of one watcher never overlap.
//!
//! Handlers built with [`ChangeFilter`] only see values that differ from the
//! previous one, so a consumer is notified once per run of equal results.

use crate::config::polling;
use crate::orchestrator::DaoSession;
use crate::wallet::{Balance, WalletProvider};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stops a running watcher. Dropping the handle stops it too.
#[derive(Debug)]
pub struct PollHandle {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop polling. A request already in flight will not reach the handler.
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Repeatedly await `request`, pass each result to `on_result`, then wait `delay`
pub fn poll_every<Req, Fut, T, H>(delay: Duration, mut request: Req, mut on_result: H) -> PollHandle
where
    Req: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    H: FnMut(T) + Send + 'static,
{
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = stopped.clone();

    let task = tokio::spawn(async move {
        loop {
            let result = request().await;
            if flag.load(Ordering::SeqCst) {
                break;
            }
            on_result(result);
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                break;
            }
        }
    });

    PollHandle { stopped, task }
}

/// Remembers the last observed value and reports whether a new one differs
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter<T> {
    last: Option<T>,
}

impl<T: PartialEq> ChangeFilter<T> {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Record `value`; true when it is the first value or differs from the last one
    pub fn update(&mut self, value: T) -> bool {
        if self.last.as_ref() == Some(&value) {
            false
        } else {
            self.last = Some(value);
            true
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }
}

/// Keep polling the wallet's main account and its balance
pub fn poll_main_account<A, B>(
    wallet: Arc<dyn WalletProvider>,
    mut on_account: A,
    mut on_balance: B,
) -> PollHandle
where
    A: FnMut(Option<String>) + Send + 'static,
    B: FnMut(Balance) + Send + 'static,
{
    let mut accounts = ChangeFilter::new();
    let mut balances = ChangeFilter::new();

    poll_every(
        polling::ACCOUNT_DELAY,
        move || {
            let wallet = wallet.clone();
            async move {
                let account = match wallet.get_account().await {
                    Ok(Some(account)) => account,
                    Ok(None) => return (None, Balance::Unknown),
                    Err(e) => {
                        log::debug!("Main account unavailable: {}", e);
                        return (None, Balance::Unknown);
                    }
                };
                let balance = wallet.get_balance(&account).await.unwrap_or_else(|e| {
                    log::debug!("Balance of {} unavailable: {}", account, e);
                    Balance::Unknown
                });
                (Some(account), balance)
            }
        },
        move |(account, balance): (Option<String>, Balance)| {
            if accounts.update(account.clone()) {
                log::debug!("Main account changed: {:?}", account);
                on_account(account);
            }
            if balances.update(balance) {
                on_balance(balance);
            }
        },
    )
}

/// Keep polling the network the wallet is connected to
pub fn poll_network<N>(wallet: Arc<dyn WalletProvider>, mut on_network: N) -> PollHandle
where
    N: FnMut(String) + Send + 'static,
{
    let mut networks = ChangeFilter::new();

    poll_every(
        polling::NETWORK_DELAY,
        move || {
            let wallet = wallet.clone();
            async move { wallet.get_network_type().await }
        },
        move |result| match result {
            Ok(network) => {
                if networks.update(network.clone()) {
                    log::debug!("Wallet network changed: {}", network);
                    on_network(network);
                }
            }
            Err(e) => log::debug!("Wallet network unavailable: {}", e),
        },
    )
}

/// Keep probing every provider; connected only while all of them answer
pub fn poll_connectivity<C>(providers: Vec<Arc<dyn WalletProvider>>, mut on_connectivity: C) -> PollHandle
where
    C: FnMut(bool) + Send + 'static,
{
    let mut states = ChangeFilter::new();

    poll_every(
        polling::CONNECTIVITY_DELAY,
        move || {
            let providers = providers.clone();
            async move {
                let probes = providers.iter().map(|p| p.get_network_type());
                join_all(probes).await.iter().all(Result::is_ok)
            }
        },
        move |connected| {
            if states.update(connected) {
                log::info!("Connectivity: {}", if connected { "online" } else { "offline" });
                on_connectivity(connected);
            }
        },
    )
}

/// Wallet-side state the dashboard renders and gates signing on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletState {
    pub account: Option<String>,
    pub balance: Balance,
    pub wallet_network: String,
    pub connected: bool,
}

/// Runs the account, network and connectivity watchers and publishes
/// their combined state.
pub struct WalletMonitor {
    state: watch::Receiver<WalletState>,
    watchers: Vec<PollHandle>,
    account_sync: Option<JoinHandle<()>>,
}

impl WalletMonitor {
    /// Start watching `wallet`; connectivity also probes the read-only `node`
    pub fn start(wallet: Arc<dyn WalletProvider>, node: Arc<dyn WalletProvider>) -> Self {
        let (tx, rx) = watch::channel(WalletState::default());
        let tx = Arc::new(tx);

        let (account_tx, balance_tx, network_tx, connectivity_tx) =
            (tx.clone(), tx.clone(), tx.clone(), tx);

        let watchers = vec![
            poll_main_account(
                wallet.clone(),
                move |account| account_tx.send_modify(|state| state.account = account),
                move |balance| balance_tx.send_modify(|state| state.balance = balance),
            ),
            poll_network(wallet.clone(), move |network| {
                network_tx.send_modify(|state| state.wallet_network = network)
            }),
            poll_connectivity(vec![wallet, node], move |connected| {
                connectivity_tx.send_modify(|state| state.connected = connected)
            }),
        ];

        Self {
            state: rx,
            watchers,
            account_sync: None,
        }
    }

    pub fn state(&self) -> WalletState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.clone()
    }

    /// Keep `session`'s acting account in sync with the wallet's main account.
    ///
    /// The account is pushed as soon as it is known for this session, and
    /// again whenever it changes. Attaching a new session replaces the old one.
    pub fn attach_session<S: DaoSession>(&mut self, session: Arc<S>) {
        if let Some(previous) = self.account_sync.take() {
            previous.abort();
        }

        let mut rx = self.state.clone();
        self.account_sync = Some(tokio::spawn(async move {
            let mut last_account: Option<String> = None;
            loop {
                let account = rx.borrow_and_update().account.clone();
                if let Some(current) = &account {
                    if last_account.as_ref() != Some(current) {
                        session.set_accounts(vec![current.clone()]);
                    }
                }
                last_account = account;

                if rx.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        for watcher in &self.watchers {
            watcher.cancel();
        }
        if let Some(sync) = self.account_sync.take() {
            sync.abort();
        }
    }
}

impl Drop for WalletMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
