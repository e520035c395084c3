// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::catalog::Offer;
use crate::error::BillingError;

/// Result of a purchase as reported by the billing backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Success,
    Cancelled,
    Failure { message: String },
}

/// How waiting for a purchase outcome ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseResolution {
    /// The billing backend reported an outcome
    Reported(PurchaseOutcome),
    /// No outcome arrived within the configured timeout
    TimedOut,
    /// The event stream ended without reporting anything
    StreamClosed,
}

/// Hands a purchase off to the platform billing UI
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Start the billing flow; the outcome arrives on the purchase event stream
    async fn launch_purchase(&self, offer: &Offer) -> Result<(), BillingError>;
}

/// A stream of purchase outcomes
pub type PurchaseEventStream = Pin<Box<dyn Stream<Item = PurchaseOutcome> + Send>>;

/// Process-wide feed of purchase outcomes
pub trait PurchaseEvents: Send + Sync {
    /// Receive outcomes published from now on
    fn subscribe(&self) -> PurchaseEventStream;
}

/// Broadcast-backed purchase event feed shared by the whole process
#[derive(Debug, Clone)]
pub struct PurchaseBus {
    sender: broadcast::Sender<PurchaseOutcome>,
}

impl PurchaseBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    /// Publish an outcome to every current subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, outcome: PurchaseOutcome) -> usize {
        self.sender.send(outcome).unwrap_or(0)
    }
}

impl Default for PurchaseBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseEvents for PurchaseBus {
    fn subscribe(&self) -> PurchaseEventStream {
        let receiver = self.sender.subscribe();

        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(outcome) => return Some((outcome, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Purchase event subscriber lagged behind");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }))
    }
}

/// What a scripted billing backend does when a purchase is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingScript {
    /// Publish this outcome on the bus after the delay
    Respond(PurchaseOutcome),
    /// Accept the launch but never report an outcome
    Silent,
    /// Refuse to launch the billing flow
    RefuseLaunch,
}

/// Billing backend that answers every purchase with a preconfigured outcome
#[derive(Debug)]
pub struct ScriptedBilling {
    bus: PurchaseBus,
    script: BillingScript,
    delay: Duration,
    launched: Mutex<Vec<String>>,
}

impl ScriptedBilling {
    pub fn new(bus: PurchaseBus, script: BillingScript) -> Self {
        Self {
            bus,
            script,
            delay: Duration::from_millis(10),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before publishing the scripted outcome
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Product identifiers of every launched purchase, oldest first
    pub fn launched(&self) -> Vec<String> {
        self.launched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl BillingClient for ScriptedBilling {
    async fn launch_purchase(&self, offer: &Offer) -> Result<(), BillingError> {
        if self.script == BillingScript::RefuseLaunch {
            return Err(BillingError::LaunchFailed {
                product_id: offer.product_id.clone(),
                reason: "billing flow refused by script".to_string(),
            });
        }

        self.launched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(offer.product_id.clone());

        if let BillingScript::Respond(outcome) = &self.script {
            let bus = self.bus.clone();
            let outcome = outcome.clone();
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                bus.publish(outcome);
            });
        }

        Ok(())
    }
}

/// Launch the billing flow for an offer and wait for its outcome
///
/// Subscribes to the event stream before launching so an early outcome is
/// not missed, then consumes at most one event. A launch error resolves as
/// a failure without waiting.
pub async fn run_purchase(
    billing: &dyn BillingClient,
    events: &dyn PurchaseEvents,
    offer: &Offer,
    timeout: Option<Duration>,
) -> PurchaseResolution {
    let mut stream = events.subscribe();

    if let Err(e) = billing.launch_purchase(offer).await {
        warn!(product_id = %offer.product_id, error = %e, "Billing flow could not be launched");
        return PurchaseResolution::Reported(PurchaseOutcome::Failure {
            message: e.to_string(),
        });
    }

    debug!(product_id = %offer.product_id, "Billing flow launched, waiting for outcome");

    let next = match timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(next) => next,
            Err(_) => return PurchaseResolution::TimedOut,
        },
        None => stream.next().await,
    };

    match next {
        Some(outcome) => PurchaseResolution::Reported(outcome),
        None => PurchaseResolution::StreamClosed,
    }
}
