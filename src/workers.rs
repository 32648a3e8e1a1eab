//! # Background Workers
//!
//! Apps may declare a background script. For every such app the dashboard
//! fetches the script, starts it in its own execution context and connects
//! it to the session. [`WorkerSubscriptionPool`] tracks one registration per
//! app proxy address so each worker runs once and can be torn down in bulk.

use crate::apps::{script_url, RawApp};
use crate::error::{DaoError, DaoResult};
use crate::orchestrator::{DaoSession, MessagePort, Subscription};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Content-fetch collaborator
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch a resource as text; non-success statuses are errors
    async fn fetch_text(&self, url: &str) -> DaoResult<String>;
}

/// A running background execution context
pub trait Worker: Send {
    fn terminate(&mut self);
}

/// Starts background scripts. The returned port is the worker's side of the
/// message channel the session talks to it through.
pub trait ScriptRuntime: Send + Sync {
    fn spawn(&self, app: &RawApp, source: &str) -> DaoResult<(Box<dyn Worker>, MessagePort)>;
}

/// A running worker and the session subscription serving it
pub struct WorkerRegistration {
    pub app: RawApp,
    subscription: Subscription,
    worker: Box<dyn Worker>,
}

impl WorkerRegistration {
    pub fn new(app: RawApp, subscription: Subscription, worker: Box<dyn Worker>) -> Self {
        Self {
            app,
            subscription,
            worker,
        }
    }

    /// Terminate the worker and cancel its subscription
    pub fn shutdown(mut self) {
        self.worker.terminate();
        self.subscription.unsubscribe();
    }
}

impl fmt::Debug for WorkerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRegistration")
            .field("proxy_address", &self.app.proxy_address)
            .field("subscription", &self.subscription)
            .finish()
    }
}

#[derive(Default)]
struct PoolState {
    workers: HashMap<String, WorkerRegistration>,
    closed: bool,
}

/// Registrations keyed by app proxy address
#[derive(Clone, Default)]
pub struct WorkerSubscriptionPool {
    state: Arc<Mutex<PoolState>>,
}

fn pool_key(proxy_address: &str) -> String {
    proxy_address.to_ascii_lowercase()
}

impl WorkerSubscriptionPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a worker, replacing any registration for the same address.
    ///
    /// The replaced registration is handed back untouched; tearing it down is
    /// the caller's job.
    #[must_use = "the replaced registration keeps running until shut down"]
    pub fn add_worker(
        &self,
        app: &RawApp,
        subscription: Subscription,
        worker: Box<dyn Worker>,
    ) -> Option<WorkerRegistration> {
        let registration = WorkerRegistration::new(app.clone(), subscription, worker);
        let mut state = self.lock();
        if state.closed {
            drop(state);
            registration.shutdown();
            return None;
        }
        state.workers.insert(pool_key(&app.proxy_address), registration)
    }

    /// Register a worker only if none exists for the address.
    ///
    /// `start` runs under the pool lock, so two callers racing for the same
    /// address start exactly one worker. Returns whether `start` ran.
    pub fn add_worker_if_absent<F>(&self, app: &RawApp, start: F) -> DaoResult<bool>
    where
        F: FnOnce() -> DaoResult<(Subscription, Box<dyn Worker>)>,
    {
        let key = pool_key(&app.proxy_address);
        let mut state = self.lock();
        if state.closed || state.workers.contains_key(&key) {
            return Ok(false);
        }
        let (subscription, worker) = start()?;
        state
            .workers
            .insert(key, WorkerRegistration::new(app.clone(), subscription, worker));
        Ok(true)
    }

    pub fn has_worker(&self, proxy_address: &str) -> bool {
        self.lock().workers.contains_key(&pool_key(proxy_address))
    }

    pub fn len(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Terminate every worker and cancel every subscription. Registrations
    /// attempted afterwards are shut down immediately.
    pub fn unsubscribe(&self) {
        let registrations: Vec<WorkerRegistration> = {
            let mut state = self.lock();
            state.closed = true;
            state.workers.drain().map(|(_, registration)| registration).collect()
        };
        for registration in registrations {
            registration.shutdown();
        }
    }
}

/// Starts the workers of every app snapshot
pub struct WorkerLauncher<S: DaoSession> {
    session: Arc<S>,
    pool: WorkerSubscriptionPool,
    fetcher: Arc<dyn ContentFetcher>,
    runtime: Arc<dyn ScriptRuntime>,
    gateway: String,
}

impl<S: DaoSession> Clone for WorkerLauncher<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            pool: self.pool.clone(),
            fetcher: self.fetcher.clone(),
            runtime: self.runtime.clone(),
            gateway: self.gateway.clone(),
        }
    }
}

impl<S: DaoSession> WorkerLauncher<S> {
    pub fn new(
        session: Arc<S>,
        pool: WorkerSubscriptionPool,
        fetcher: Arc<dyn ContentFetcher>,
        runtime: Arc<dyn ScriptRuntime>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            session,
            pool,
            fetcher,
            runtime,
            gateway: gateway.into(),
        }
    }

    /// Launch, in the background, a worker for each app of the snapshot that
    /// declares a script and has none yet
    pub fn on_apps(&self, apps: &[RawApp]) -> Vec<JoinHandle<()>> {
        apps.iter()
            .filter(|app| app.script.as_deref().is_some_and(|s| !s.is_empty()))
            .filter(|app| !self.pool.has_worker(&app.proxy_address))
            .cloned()
            .map(|app| {
                let launcher = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = launcher.launch(&app).await {
                        log::error!(
                            "Failed to load {}({})'s script ({}): {}",
                            app.name,
                            app.proxy_address,
                            app.script.as_deref().unwrap_or_default(),
                            e
                        );
                    }
                })
            })
            .collect()
    }

    /// Fetch and start one app's script. Returns whether a worker was started;
    /// `false` when the content is unreachable or another launch won the race.
    pub async fn launch(&self, app: &RawApp) -> DaoResult<bool> {
        // Without a base URL the script can't be located
        let Some(url) = script_url(app, &self.gateway) else {
            return Ok(false);
        };

        let source = self
            .fetcher
            .fetch_text(&url)
            .await
            .map_err(|e| DaoError::ScriptLoad {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let started = self.pool.add_worker_if_absent(app, || {
            let (mut worker, port) = self.runtime.spawn(app, &source)?;
            match self.session.run_app(port, &app.proxy_address) {
                Ok(subscription) => Ok((subscription, worker)),
                Err(e) => {
                    worker.terminate();
                    Err(e)
                }
            }
        })?;

        if started {
            log::info!("Started worker for {}({})", app.name, app.proxy_address);
        } else {
            log::debug!("Worker for {} already running, discarding fetched script", app.proxy_address);
        }
        Ok(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::AppContent;
    use crate::testing::{MockFetcher, MockRuntime, MockSession, MockWorker};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const GATEWAY: &str = "https://ipfs.test/ipfs";

    fn scripted_app(proxy: &str, location: &str) -> RawApp {
        RawApp {
            name: format!("App {}", proxy),
            proxy_address: proxy.to_string(),
            content: Some(AppContent {
                provider: "ipfs".to_string(),
                location: location.to_string(),
            }),
            script: Some("/script.js".to_string()),
            ..Default::default()
        }
    }

    fn worker_flag() -> (Box<dyn Worker>, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Box::new(MockWorker { terminated: flag.clone() }), flag)
    }

    #[test]
    fn test_add_worker_overwrites_and_returns_previous() {
        let pool = WorkerSubscriptionPool::new();
        let app = scripted_app("0xA", "Qm1");
        let (first, first_flag) = worker_flag();
        let (second, second_flag) = worker_flag();

        assert!(pool.add_worker(&app, Subscription::noop(), first).is_none());
        let replaced = pool.add_worker(&app, Subscription::noop(), second);
        assert!(!first_flag.load(Ordering::SeqCst));

        replaced.unwrap().shutdown();
        pool.unsubscribe();
        assert!(first_flag.load(Ordering::SeqCst));
        assert!(second_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_membership_ignores_address_case() {
        let pool = WorkerSubscriptionPool::new();
        let (worker, _) = worker_flag();
        assert!(pool.add_worker(&scripted_app("0xAbC", "Qm1"), Subscription::noop(), worker).is_none());
        assert!(pool.has_worker("0xabc"));
        assert!(!pool.has_worker("0xdef"));
    }

    #[test]
    fn test_unsubscribe_on_empty_pool() {
        let pool = WorkerSubscriptionPool::new();
        pool.unsubscribe();
        pool.unsubscribe();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_insert_if_absent_starts_one_worker() {
        let pool = WorkerSubscriptionPool::new();
        let app = scripted_app("0xA", "Qm1");
        let mut starts = 0;

        for i in 0..2 {
            let started = pool
                .add_worker_if_absent(&app, || {
                    starts += 1;
                    let (worker, _) = worker_flag();
                    Ok((Subscription::noop(), worker))
                })
                .unwrap();
            assert_eq!(started, i == 0);
        }
        assert_eq!(starts, 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_registration_after_unsubscribe_is_shut_down() {
        let pool = WorkerSubscriptionPool::new();
        pool.unsubscribe();

        let (worker, flag) = worker_flag();
        assert!(pool.add_worker(&scripted_app("0xA", "Qm1"), Subscription::noop(), worker).is_none());
        assert!(flag.load(Ordering::SeqCst));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_launch_starts_and_connects_worker() {
        let session = MockSession::new();
        let runtime = Arc::new(MockRuntime::new());
        let fetcher = Arc::new(
            MockFetcher::new().with_script(&format!("{}/Qm1/script.js", GATEWAY), "onmessage = () => {}"),
        );
        let pool = WorkerSubscriptionPool::new();
        let launcher = WorkerLauncher::new(Arc::new(session.clone()), pool.clone(), fetcher, runtime.clone(), GATEWAY);

        let app = scripted_app("0xA", "Qm1");
        assert!(launcher.launch(&app).await.unwrap());
        assert!(pool.has_worker("0xA"));
        assert_eq!(session.run_app_calls(), vec!["0xA".to_string()]);

        pool.unsubscribe();
        assert_eq!(runtime.running(), 0);
        assert_eq!(session.active_apps(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_app() {
        let session = MockSession::new();
        let runtime = Arc::new(MockRuntime::new());
        let launcher = WorkerLauncher::new(
            Arc::new(session.clone()),
            WorkerSubscriptionPool::new(),
            Arc::new(MockFetcher::new()),
            runtime.clone(),
            GATEWAY,
        );

        let err = launcher.launch(&scripted_app("0xA", "Qm1")).await.unwrap_err();
        assert!(matches!(err, DaoError::ScriptLoad { .. }));
        assert!(runtime.started().is_empty());
        assert!(session.run_app_calls().is_empty());
    }

    #[tokio::test]
    async fn test_app_without_content_is_skipped() {
        let fetcher = Arc::new(MockFetcher::new());
        let launcher = WorkerLauncher::new(
            Arc::new(MockSession::new()),
            WorkerSubscriptionPool::new(),
            fetcher.clone(),
            Arc::new(MockRuntime::new()),
            GATEWAY,
        );
        let mut app = scripted_app("0xA", "Qm1");
        app.content = None;

        assert!(!launcher.launch(&app).await.unwrap());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_snapshots_leave_one_running_worker() {
        let session = MockSession::new();
        let runtime = Arc::new(MockRuntime::new());
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_script(&format!("{}/Qm1/script.js", GATEWAY), "worker")
                .with_delay(Duration::from_millis(50)),
        );
        let pool = WorkerSubscriptionPool::new();
        let launcher = WorkerLauncher::new(Arc::new(session.clone()), pool.clone(), fetcher.clone(), runtime.clone(), GATEWAY);

        let apps = vec![scripted_app("0xA", "Qm1")];
        // Second snapshot arrives while the first fetch is in flight
        let mut handles = launcher.on_apps(&apps);
        handles.extend(launcher.on_apps(&apps));
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(runtime.started().len(), 1);
        assert_eq!(pool.len(), 1);

        pool.unsubscribe();
        assert_eq!(runtime.running(), 0);
        assert_eq!(session.active_apps(), 0);
    }
}
