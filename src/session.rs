// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analytics::SharedAnalyticsSink;
use crate::catalog::{CatalogSource, Offer, SubscriptionFrequency, SubscriptionTier};
use crate::error::SessionError;
use crate::preferences::PreferenceStore;
use crate::purchase::{BillingClient, PurchaseEvents, PurchaseResolution, run_purchase};
use crate::selection::{EntryContext, OfferEligibility, PreferenceReusePolicy};
use crate::state::{Effect, UpgradeEvent, UpgradeMachine, UpgradeState};

/// Options for an upgrade session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Entry parameters from the hosting screen
    pub entry: EntryContext,
    /// Give up waiting for a purchase outcome after this long (None = wait forever)
    pub purchase_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            entry: EntryContext::default(),
            purchase_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// External collaborators a session talks to
#[derive(Clone)]
pub struct SessionDeps {
    pub catalog: Arc<dyn CatalogSource>,
    pub eligibility: Arc<dyn OfferEligibility>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub billing: Arc<dyn BillingClient>,
    pub purchases: Arc<dyn PurchaseEvents>,
    pub analytics: SharedAnalyticsSink,
}

/// Called once when a purchase succeeds
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

enum Command {
    /// Apply an event and report back once it has been handled
    Event {
        event: UpgradeEvent,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Shutdown,
}

/// Cheap, cloneable handle for driving a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<UpgradeState>,
}

impl SessionHandle {
    /// The most recently published state
    pub fn state(&self) -> UpgradeState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<UpgradeState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies the predicate
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&UpgradeState) -> bool,
    ) -> Result<UpgradeState, SessionError> {
        let mut state = self.state.clone();
        state
            .wait_for(predicate)
            .await
            .map(|current| UpgradeState::clone(&current))
            .map_err(|_| SessionError::Closed)
    }

    /// Wait until the first catalog has been processed
    pub async fn wait_until_ready(&self) -> Result<UpgradeState, SessionError> {
        self.wait_for(|state| !state.is_loading()).await
    }

    pub async fn change_tier(&self, tier: SubscriptionTier) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::TierChanged(tier)).await
    }

    pub async fn change_frequency(
        &self,
        frequency: SubscriptionFrequency,
    ) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::FrequencyChanged(frequency)).await
    }

    /// Start purchasing the selected offer
    ///
    /// Returns once the attempt has started (or was ignored because nothing
    /// is selectable yet); the outcome shows up in the published state and
    /// through the completion callback.
    pub async fn request_purchase(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::PurchaseRequested).await
    }

    pub async fn shown(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::Shown).await
    }

    pub async fn dismissed(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::Dismissed).await
    }

    pub async fn not_now(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::NotNowTapped).await
    }

    pub async fn rate_us(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::RateUsTapped).await
    }

    pub async fn privacy_policy(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::PrivacyPolicyTapped).await
    }

    pub async fn terms_and_conditions(&self) -> Result<(), SessionError> {
        self.apply(UpgradeEvent::TermsAndConditionsTapped).await
    }

    /// Ask the session to stop; pending purchase waits are abandoned
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown).await
    }

    /// Queue an event and wait until the session has applied it
    async fn apply(&self, event: UpgradeEvent) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Event { event, reply }).await?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// A running upgrade session
pub struct UpgradeSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl UpgradeSession {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Stop the session and wait for its event loop to finish
    pub async fn shutdown(self) {
        let _ = self.handle.shutdown().await;
        let _ = self.task.await;
    }
}

/// Start an upgrade session on the current tokio runtime
///
/// The stored selection is read once here, and only when the entry context
/// allows reusing it. All further events are processed one at a time by a
/// single task that owns the state machine.
pub fn start_session(
    options: SessionOptions,
    deps: SessionDeps,
    on_complete: Option<CompletionCallback>,
) -> UpgradeSession {
    let policy = options.entry.policy();
    let stored = match policy.preference_reuse {
        PreferenceReusePolicy::Reuse => match deps.preferences.load() {
            Ok(preference) => Some(preference),
            Err(e) => {
                warn!(error = %e, "Could not read stored selection, ignoring it");
                None
            }
        },
        PreferenceReusePolicy::Ignore => None,
    };

    info!(
        flow = %options.entry.flow,
        source = %options.entry.source,
        patron_only = options.entry.patron_only,
        "Starting upgrade session"
    );

    let machine = UpgradeMachine::new(options.entry, stored, deps.eligibility.clone());
    let (state_tx, state_rx) = watch::channel(machine.state().clone());
    let (command_tx, command_rx) = mpsc::channel(32);
    let (resolution_tx, resolution_rx) = mpsc::channel(1);

    let actor = SessionActor {
        machine,
        deps,
        state: state_tx,
        on_complete,
        purchase_timeout: options.purchase_timeout,
        resolutions: resolution_tx,
        purchase_task: None,
    };

    let task = tokio::spawn(actor.run(command_rx, resolution_rx));

    UpgradeSession {
        handle: SessionHandle {
            commands: command_tx,
            state: state_rx,
        },
        task,
    }
}

struct SessionActor {
    machine: UpgradeMachine,
    deps: SessionDeps,
    state: watch::Sender<UpgradeState>,
    on_complete: Option<CompletionCallback>,
    purchase_timeout: Option<Duration>,
    resolutions: mpsc::Sender<PurchaseResolution>,
    purchase_task: Option<JoinHandle<()>>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut resolutions: mpsc::Receiver<PurchaseResolution>,
    ) {
        let mut catalog = self.deps.catalog.updates();
        let mut catalog_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Event { event, reply }) => {
                        let rejected = self.dispatch(event);
                        let result = if rejected {
                            Err(SessionError::PurchaseInProgress)
                        } else {
                            Ok(())
                        };
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                update = catalog.next(), if catalog_open => match update {
                    Some(update) => {
                        self.dispatch(UpgradeEvent::CatalogRefreshed(update));
                    }
                    None => {
                        debug!("Catalog source ended");
                        catalog_open = false;
                    }
                },
                Some(resolution) = resolutions.recv() => {
                    self.purchase_task = None;
                    self.dispatch(UpgradeEvent::PurchaseOutcomeReceived(resolution));
                }
            }
        }

        if let Some(task) = self.purchase_task.take() {
            debug!("Abandoning pending purchase wait");
            task.abort();
        }
        info!("Upgrade session closed");
    }

    /// Apply an event, run its effects and publish the new state
    ///
    /// Returns true if the event was a rejected purchase request.
    fn dispatch(&mut self, event: UpgradeEvent) -> bool {
        let mut rejected = false;

        for effect in self.machine.apply(event) {
            match effect {
                Effect::PersistTier(tier) => {
                    if let Err(e) = self.deps.preferences.set_last_tier(tier) {
                        warn!(error = %e, "Failed to persist selected tier");
                    }
                }
                Effect::PersistFrequency(frequency) => {
                    if let Err(e) = self.deps.preferences.set_last_frequency(frequency) {
                        warn!(error = %e, "Failed to persist selected frequency");
                    }
                }
                Effect::Track(event) => self.deps.analytics.record(event),
                Effect::BeginPurchase(offer) => self.begin_purchase(offer),
                Effect::Complete => {
                    if let Some(on_complete) = self.on_complete.take() {
                        on_complete();
                    }
                }
                Effect::PurchaseRejected => rejected = true,
                Effect::OutcomeMissing { product_id } => {
                    error!(%product_id, "Purchase event stream ended without an outcome");
                }
            }
        }

        let next = self.machine.state();
        self.state.send_if_modified(|current| {
            if *current == *next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        rejected
    }

    fn begin_purchase(&mut self, offer: Offer) {
        let billing = self.deps.billing.clone();
        let events = self.deps.purchases.clone();
        let resolutions = self.resolutions.clone();
        let timeout = self.purchase_timeout;

        info!(product_id = %offer.product_id, "Starting purchase");

        self.purchase_task = Some(tokio::spawn(async move {
            let resolution = run_purchase(billing.as_ref(), events.as_ref(), &offer, timeout).await;
            let _ = resolutions.send(resolution).await;
        }));
    }
}
