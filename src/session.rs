//! # DAO Session
//!
//! Resolves an address or ENS domain into an organization, opens and
//! initializes an orchestration session for it, and wires the session's
//! streams into [`SessionEvent`]s:
//!
//! 1. installed apps (prepared for the frontend)
//! 2. permissions (throttled)
//! 3. forwarders
//! 4. pending transaction requests
//! 5. background scripts, started through the [`WorkerSubscriptionPool`]
//!
//! The returned [`DaoConnection`] owns every subscription and tears them all
//! down on [`DaoConnection::cancel`] or drop.

use crate::apps::{prepare_apps_for_frontend, FrontendApp, Permissions, RawApp};
use crate::config::{polling, NetworkConfig};
use crate::error::{DaoError, DaoResult, OrchestratorError};
use crate::orchestrator::{DaoSession, InitOptions, MessagePort, Orchestrator, SessionOptions, Subscription};
use crate::transaction::TransactionBag;
use crate::utils::address::is_valid_ens_name;
use crate::wallet::WalletProvider;
use crate::workers::{ContentFetcher, ScriptRuntime, WorkerLauncher, WorkerSubscriptionPool};
use futures::stream::{BoxStream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const NO_CONNECTION_MESSAGE: &str = "The wrapper can not be initialized without a connection";

/// The organization a session is connected to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaoIdentity {
    pub address: String,
    /// ENS domain the user typed, or the address itself
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Loading,
    Ready,
    Error,
}

/// Everything a connected session reports to the view layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Emitted as soon as the address is known, before the session is ready
    DaoResolved(DaoIdentity),
    Apps(Vec<FrontendApp>),
    Permissions(Permissions),
    Forwarders(Vec<RawApp>),
    TransactionBag(TransactionBag),
    Failed(String),
}

/// Collaborators a session needs besides the orchestrator
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<NetworkConfig>,
    pub wallet: Arc<dyn WalletProvider>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub runtime: Arc<dyn ScriptRuntime>,
}

/// Resolve an address or ENS domain.
///
/// Domains with no record resolve to nothing and fail with
/// [`DaoError::DaoNotFound`]; other resolution failures propagate.
pub async fn resolve_dao<O: Orchestrator>(
    orchestrator: &O,
    input: &str,
    config: &NetworkConfig,
) -> DaoResult<DaoIdentity> {
    let input = input.trim();

    let address = if is_valid_ens_name(input) {
        match orchestrator
            .resolve_name(input, &config.ens_registry)
            .await
            .map_err(normalize_orchestrator_error)
        {
            Ok(address) => address,
            Err(DaoError::Orchestrator {
                source: OrchestratorError::NameNotDefined,
            }) => None,
            Err(e) => return Err(e),
        }
    } else {
        Some(input.to_string())
    };

    match address.filter(|a| !a.is_empty()) {
        Some(address) => Ok(DaoIdentity {
            address,
            domain: input.to_string(),
        }),
        None => Err(DaoError::DaoNotFound {
            dao: input.to_string(),
        }),
    }
}

/// Library failures may arrive as plain text; map known messages to their kind
fn normalize_orchestrator_error(error: DaoError) -> DaoError {
    match error {
        DaoError::Orchestrator {
            source: OrchestratorError::Other { message },
        } => DaoError::Orchestrator {
            source: OrchestratorError::from_message(&message),
        },
        other => other,
    }
}

fn classify_init_error(error: DaoError, dao: &str) -> DaoError {
    let source = match normalize_orchestrator_error(error) {
        DaoError::Orchestrator { source } => source,
        other => return other,
    };

    match source {
        OrchestratorError::NotADao => DaoError::DaoNotFound { dao: dao.to_string() },
        OrchestratorError::ConnectionNotOpen => DaoError::NoConnection {
            message: NO_CONNECTION_MESSAGE.to_string(),
        },
        other => DaoError::Orchestrator { source: other },
    }
}

/// Connect to the organization named by `input` and start its subscriptions.
///
/// Failures are reported both as the returned error and as a
/// [`SessionEvent::Failed`].
pub async fn connect_dao<O: Orchestrator>(
    orchestrator: &O,
    input: &str,
    ctx: &SessionContext,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> DaoResult<DaoConnection<O::Session>> {
    let result = open_dao(orchestrator, input, ctx, &events).await;
    if let Err(e) = &result {
        log::error!("Could not connect to {}: {}", input, e);
        let _ = events.send(SessionEvent::Failed(e.to_string()));
    }
    result
}

async fn open_dao<O: Orchestrator>(
    orchestrator: &O,
    input: &str,
    ctx: &SessionContext,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> DaoResult<DaoConnection<O::Session>> {
    let config = &ctx.config;
    let dao = resolve_dao(orchestrator, input, config).await?;
    log::info!("Resolved {} to {}", dao.domain, dao.address);
    let _ = events.send(SessionEvent::DaoResolved(dao.clone()));

    let provider_url = if config.default_eth_node.is_empty() {
        config.rpc_url.clone()
    } else {
        config.default_eth_node.clone()
    };
    let options = SessionOptions {
        provider_url,
        gas_price: config.gas_price,
        ens_registry: config.ens_registry.clone(),
        ipfs_gateway: config.ipfs_gateway.clone(),
    };
    let session = orchestrator.open_session(&dao.address, options).await?;

    let account = match ctx.wallet.get_account().await {
        Ok(account) => account,
        Err(e) => {
            log::debug!("No account to initialize the session with: {}", e);
            None
        }
    };
    session
        .init(InitOptions {
            provided_accounts: account.into_iter().collect(),
        })
        .await
        .map_err(|e| classify_init_error(e, &dao.domain))?;

    log::info!("Session ready for {}", dao.address);
    let session = Arc::new(session);
    let workers = WorkerSubscriptionPool::new();
    let subscriptions = subscribe_session(&session, ctx, &workers, events);

    Ok(DaoConnection {
        session,
        dao,
        subscriptions: Mutex::new(subscriptions),
        frame: Mutex::new(None),
        workers,
    })
}

fn forward<T, F>(stream: BoxStream<'static, T>, events: &mpsc::UnboundedSender<SessionEvent>, wrap: F) -> Subscription
where
    T: Send + 'static,
    F: Fn(T) -> SessionEvent + Send + 'static,
{
    let events = events.clone();
    let mut stream = stream;
    Subscription::from_task(tokio::spawn(async move {
        while let Some(value) = stream.next().await {
            if events.send(wrap(value)).is_err() {
                break;
            }
        }
    }))
}

fn subscribe_session<S: DaoSession>(
    session: &Arc<S>,
    ctx: &SessionContext,
    workers: &WorkerSubscriptionPool,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Vec<Subscription> {
    let gateway = ctx.config.ipfs_gateway.clone();

    let apps = forward(session.apps(), events, move |apps| {
        log::info!("Received {} apps", apps.len());
        SessionEvent::Apps(prepare_apps_for_frontend(&apps, &gateway))
    });

    let permissions = {
        let stream = session.permissions();
        let events = events.clone();
        Subscription::from_task(tokio::spawn(throttle(stream, polling::PERMISSIONS_THROTTLE, move |permissions| {
            let _ = events.send(SessionEvent::Permissions(permissions));
        })))
    };

    let forwarders = forward(session.forwarders(), events, SessionEvent::Forwarders);
    let transactions = forward(session.transaction_requests(), events, |bag| {
        log::info!("Transaction request {}", bag.id());
        SessionEvent::TransactionBag(bag)
    });

    let scripts = {
        let launcher = WorkerLauncher::new(
            session.clone(),
            workers.clone(),
            ctx.fetcher.clone(),
            ctx.runtime.clone(),
            ctx.config.ipfs_gateway.clone(),
        );
        let mut stream = session.apps();
        Subscription::from_task(tokio::spawn(async move {
            while let Some(apps) = stream.next().await {
                launcher.on_apps(&apps);
            }
        }))
    };

    vec![apps, permissions, forwarders, transactions, scripts]
}

/// Pass stream items to `emit` at most once per `period`.
///
/// The first item is emitted right away; items arriving during the
/// following period collapse into the latest one, emitted when it ends.
pub async fn throttle<T, F>(mut stream: BoxStream<'static, T>, period: Duration, mut emit: F)
where
    F: FnMut(T),
{
    let mut window_end: Option<Instant> = None;
    let mut pending: Option<T> = None;

    loop {
        let Some(deadline) = window_end else {
            match stream.next().await {
                Some(value) => {
                    emit(value);
                    window_end = Some(Instant::now() + period);
                    continue;
                }
                None => return,
            }
        };

        tokio::select! {
            item = stream.next() => match item {
                Some(value) => pending = Some(value),
                None => {
                    if let Some(value) = pending.take() {
                        emit(value);
                    }
                    return;
                }
            },
            _ = tokio::time::sleep_until(deadline) => match pending.take() {
                Some(value) => {
                    emit(value);
                    window_end = Some(Instant::now() + period);
                }
                None => window_end = None,
            },
        }
    }
}

/// A connected organization and the subscriptions serving it
pub struct DaoConnection<S: DaoSession> {
    session: Arc<S>,
    dao: DaoIdentity,
    subscriptions: Mutex<Vec<Subscription>>,
    frame: Mutex<Option<Subscription>>,
    workers: WorkerSubscriptionPool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: DaoSession> DaoConnection<S> {
    pub fn dao(&self) -> &DaoIdentity {
        &self.dao
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    pub fn workers(&self) -> &WorkerSubscriptionPool {
        &self.workers
    }

    /// Connect an app's embedded frame. Only one frame is connected at a
    /// time; the previous one is shut down before the new one starts.
    pub fn connect_app_frame(&self, port: MessagePort, proxy_address: &str) -> DaoResult<()> {
        let mut frame = lock(&self.frame);
        if let Some(mut previous) = frame.take() {
            previous.unsubscribe();
        }
        *frame = Some(self.session.run_app(port, proxy_address)?);
        log::debug!("Frame connected to {}", proxy_address);
        Ok(())
    }

    /// Cancel every subscription, the embedded frame and all workers
    pub fn cancel(&self) {
        let subscriptions: Vec<Subscription> = lock(&self.subscriptions).drain(..).collect();
        for mut subscription in subscriptions {
            subscription.unsubscribe();
        }
        if let Some(mut frame) = lock(&self.frame).take() {
            frame.unsubscribe();
        }
        self.workers.unsubscribe();
    }
}

impl<S: DaoSession> Drop for DaoConnection<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Session data as the view layer renders it
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub dao: Option<DaoIdentity>,
    pub apps: Vec<FrontendApp>,
    pub permissions: Permissions,
    pub forwarders: Vec<RawApp>,
    pub transaction_bag: Option<TransactionBag>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::DaoResolved(dao) => self.dao = Some(dao),
            SessionEvent::Apps(apps) => {
                self.apps = apps;
                self.status = SessionStatus::Ready;
            }
            SessionEvent::Permissions(permissions) => self.permissions = permissions,
            SessionEvent::Forwarders(forwarders) => self.forwarders = forwarders,
            SessionEvent::TransactionBag(bag) => self.transaction_bag = Some(bag),
            SessionEvent::Failed(_) => self.status = SessionStatus::Error,
        }
    }

    /// Every connection failure collapses into the error status
    pub fn fail(&mut self, error: &DaoError) {
        log::debug!("Session failed: {}", error);
        self.status = SessionStatus::Error;
    }

    /// Back to the initial state, for a new address
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
