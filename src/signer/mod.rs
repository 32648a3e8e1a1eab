//! # Transaction Signer Panel
//!
//! Drives one signing request at a time from confirmation to signature:
//!
//! ```text
//! confirming ──sign──▶ signing ──▶ signed ──(3 s or close)──▶ closed
//!                               └─▶ error  ──(close)─────────▶ closed
//! ```
//!
//! A new request always replaces the current one and restarts at
//! `confirming`. Leaving `signed` before the auto-close fires cancels it.

pub mod intent;
pub mod view;


pub use intent::{state_from_bag, transaction_intent, BagState, Intent};
pub use view::{check_eligibility, ActionPathsView, ConfirmView, Eligibility, PathChoice};

use crate::apps::FrontendApp;
use crate::config::polling;
use crate::error::{DaoError, DaoResult};
use crate::transaction::{Transaction, TransactionBag};
use crate::wallet::WalletProvider;
use crate::watchers::WalletState;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningStatus {
    #[default]
    Confirming,
    Signing,
    Signed,
    Error,
}

/// What happens to an unresolved request when a new one replaces it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupersedePolicy {
    /// Leave it unresolved
    #[default]
    Abandon,
    /// Reject it so the requesting app stops waiting
    Reject,
}

/// Notifications for the rest of the dashboard
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    TransactionSent {
        transaction: Transaction,
        hash: String,
        sent_at: DateTime<Utc>,
    },
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignerState {
    pub panel_opened: bool,
    pub status: SigningStatus,
    pub intent: Option<Intent>,
    pub direct: bool,
    pub action_paths: Vec<Vec<Transaction>>,
    pub pretransaction: Option<Transaction>,
    /// Index into `action_paths`
    pub selected: usize,
    pub sign_error: Option<String>,
}

#[derive(Default)]
struct PanelInner {
    state: SignerState,
    bag: Option<TransactionBag>,
    close_timer: Option<JoinHandle<()>>,
}

impl PanelInner {
    fn cancel_close_timer(&mut self) {
        if let Some(timer) = self.close_timer.take() {
            timer.abort();
        }
    }

    fn set_status(&mut self, status: SigningStatus) {
        if status != self.state.status && status != SigningStatus::Signed {
            self.cancel_close_timer();
        }
        self.state.status = status;
    }

    fn reset(&mut self) {
        self.cancel_close_timer();
        self.state = SignerState::default();
    }

    fn is_current(&self, bag: &TransactionBag) -> bool {
        self.bag.as_ref().is_some_and(|current| current.same_request(bag))
    }
}

fn lock(inner: &Mutex<PanelInner>) -> MutexGuard<'_, PanelInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Confirmation panel state machine
#[derive(Clone)]
pub struct SignerPanel {
    inner: Arc<Mutex<PanelInner>>,
    wallet: Arc<dyn WalletProvider>,
    /// Network the organization lives on
    network_type: String,
    policy: SupersedePolicy,
    events: mpsc::UnboundedSender<PanelEvent>,
}

impl SignerPanel {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        network_type: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<PanelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let panel = Self {
            inner: Arc::new(Mutex::new(PanelInner::default())),
            wallet,
            network_type: network_type.into(),
            policy: SupersedePolicy::default(),
            events,
        };
        (panel, rx)
    }

    pub fn with_policy(mut self, policy: SupersedePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> SignerState {
        lock(&self.inner).state.clone()
    }

    /// Track a new request. Returns false if it is the one already tracked.
    pub fn receive_bag(&self, bag: TransactionBag, apps: &[FrontendApp]) -> bool {
        let mut inner = lock(&self.inner);
        if inner.is_current(&bag) {
            return false;
        }

        if let Some(previous) = inner.bag.take() {
            // A request being signed is resolved by its own signing outcome
            if self.policy == SupersedePolicy::Reject
                && inner.state.status != SigningStatus::Signing
                && previous.reject("Superseded by a new transaction request")
            {
                log::info!("Rejected superseded transaction request {}", previous.id());
            }
        }

        let derived = state_from_bag(&bag, apps);
        log::debug!(
            "New transaction request {} ({} hop path)",
            bag.id(),
            bag.path.len()
        );
        inner.cancel_close_timer();
        inner.state = SignerState {
            panel_opened: true,
            status: SigningStatus::Confirming,
            intent: Some(derived.intent),
            direct: derived.direct,
            action_paths: derived.action_paths,
            pretransaction: derived.pretransaction,
            selected: 0,
            sign_error: None,
        };
        inner.bag = Some(bag);
        true
    }

    /// Choose among the candidate paths while confirming
    pub fn select_path(&self, index: usize) -> bool {
        let mut inner = lock(&self.inner);
        if inner.state.status != SigningStatus::Confirming || index >= inner.state.action_paths.len() {
            return false;
        }
        inner.state.selected = index;
        true
    }

    fn eligibility(&self, wallet: &WalletState) -> Eligibility {
        check_eligibility(self.wallet.is_available(), wallet, &self.network_type)
    }

    pub fn confirm_view(&self, wallet: &WalletState) -> ConfirmView {
        let eligibility = self.eligibility(wallet);
        view::confirm_view(&lock(&self.inner).state, eligibility, self.wallet.provider_id())
    }

    /// Ask the wallet to expose an account, offered when it is locked
    pub async fn request_enable(&self) -> DaoResult<Vec<String>> {
        self.wallet.request_accounts().await
    }

    /// Sign the current request through the selected path.
    ///
    /// The setup transaction, if any, is sent and settled first; a failure
    /// there skips the main transaction. The request is accepted with the
    /// main transaction's hash or rejected with the failure.
    pub async fn sign(&self, wallet: &WalletState) -> DaoResult<String> {
        let eligibility = self.eligibility(wallet);

        let (bag, transaction, pretransaction) = {
            let mut inner = lock(&self.inner);
            let confirm = view::confirm_view(&inner.state, eligibility, self.wallet.provider_id());
            if !confirm.can_sign() {
                return Err(DaoError::transaction("No signable transaction request"));
            }
            let bag = inner
                .bag
                .clone()
                .ok_or_else(|| DaoError::transaction("No transaction request"))?;

            let state = &inner.state;
            let transaction = if state.direct {
                state.intent.as_ref().map(|intent| intent.transaction.clone())
            } else {
                state
                    .action_paths
                    .get(state.selected)
                    .and_then(|path| path.first())
                    .cloned()
            }
            .ok_or_else(|| DaoError::transaction("Selected path is empty"))?;
            let pretransaction = state.pretransaction.clone();

            inner.set_status(SigningStatus::Signing);
            (bag, transaction, pretransaction)
        };

        let result = self.send(pretransaction.as_ref(), &transaction).await;

        let mut inner = lock(&self.inner);
        let current = inner.is_current(&bag);
        match result {
            Ok(hash) => {
                log::info!("Transaction {} sent for request {}", hash, bag.id());
                bag.accept(hash.clone());
                let _ = self.events.send(PanelEvent::TransactionSent {
                    transaction,
                    hash: hash.clone(),
                    sent_at: Utc::now(),
                });
                if current {
                    inner.state.sign_error = None;
                    inner.set_status(SigningStatus::Signed);
                    self.start_closing(&mut inner);
                }
                Ok(hash)
            }
            Err(e) => {
                log::warn!("Signing request {} failed: {}", bag.id(), e);
                bag.reject(e.to_string());
                if current {
                    inner.state.sign_error = Some(e.to_string());
                    inner.set_status(SigningStatus::Error);
                }
                Err(e)
            }
        }
    }

    async fn send(&self, pretransaction: Option<&Transaction>, transaction: &Transaction) -> DaoResult<String> {
        if let Some(pretransaction) = pretransaction {
            self.wallet.send_transaction(pretransaction).await?;
        }
        self.wallet.send_transaction(transaction).await
    }

    fn start_closing(&self, inner: &mut PanelInner) {
        let panel = Arc::downgrade(&self.inner);
        let events = self.events.clone();

        inner.cancel_close_timer();
        inner.close_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(polling::SIGNER_AUTO_CLOSE).await;
            let Some(panel) = panel.upgrade() else {
                return;
            };
            let mut inner = lock(&panel);
            if inner.state.status == SigningStatus::Signed {
                inner.close_timer = None;
                inner.reset();
                let _ = events.send(PanelEvent::Closed);
            }
        }));
    }

    /// Hide the panel and reset it. Ignored while a signature is pending.
    pub fn close(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.state.status == SigningStatus::Signing {
            return false;
        }
        inner.reset();
        let _ = self.events.send(PanelEvent::Closed);
        true
    }
}
