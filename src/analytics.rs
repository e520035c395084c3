// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::catalog::{SubscriptionFrequency, SubscriptionTier};
use crate::selection::{EntrySource, UpgradeFlow};

/// Events emitted by an upgrade session for analytics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsEvent {
    /// The upgrade screen became visible
    PromotionShown {
        flow: UpgradeFlow,
        source: EntrySource,
    },

    /// The upgrade screen was closed without purchasing
    PromotionDismissed {
        flow: UpgradeFlow,
        source: EntrySource,
    },

    /// The user chose to skip the upgrade for now
    PromotionNotNowTapped {
        flow: UpgradeFlow,
        source: EntrySource,
    },

    /// The user tapped the rate-us link
    RateUsTapped { source: EntrySource },

    PrivacyPolicyTapped,

    TermsAndConditionsTapped,

    /// The user switched to another tier card
    TierChanged { tier: SubscriptionTier },

    /// The user switched billing frequency
    FrequencyChanged { frequency: SubscriptionFrequency },

    /// A purchase attempt is starting; exactly one per attempt
    PurchaseStarted {
        product_id: String,
        flow: UpgradeFlow,
        source: EntrySource,
    },

    PurchaseSucceeded { product_id: String },

    PurchaseCancelled { product_id: String },

    PurchaseFailed { product_id: String, error: String },
}

impl AnalyticsEvent {
    /// Event name as sent to the analytics backend
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::PromotionShown { .. } => "plus_promotion_shown",
            AnalyticsEvent::PromotionDismissed { .. } => "plus_promotion_dismissed",
            AnalyticsEvent::PromotionNotNowTapped { .. } => {
                "plus_promotion_not_now_button_tapped"
            }
            AnalyticsEvent::RateUsTapped { .. } => "rate_us_tapped",
            AnalyticsEvent::PrivacyPolicyTapped => "plus_promotion_privacy_policy_tapped",
            AnalyticsEvent::TermsAndConditionsTapped => {
                "plus_promotion_terms_and_conditions_tapped"
            }
            AnalyticsEvent::TierChanged { .. } => "plus_promotion_subscription_tier_changed",
            AnalyticsEvent::FrequencyChanged { .. } => {
                "plus_promotion_subscription_frequency_changed"
            }
            AnalyticsEvent::PurchaseStarted { .. } => {
                "select_payment_frequency_next_button_tapped"
            }
            AnalyticsEvent::PurchaseSucceeded { .. } => "purchase_successful",
            AnalyticsEvent::PurchaseCancelled { .. } => "purchase_cancelled",
            AnalyticsEvent::PurchaseFailed { .. } => "purchase_failed",
        }
    }

    /// Event properties as string key/value pairs
    pub fn properties(&self) -> BTreeMap<&'static str, String> {
        let mut properties = BTreeMap::new();

        match self {
            AnalyticsEvent::PromotionShown { flow, source }
            | AnalyticsEvent::PromotionDismissed { flow, source }
            | AnalyticsEvent::PromotionNotNowTapped { flow, source } => {
                properties.insert("flow", flow.analytics_value().to_string());
                properties.insert("source", source.analytics_value().to_string());
            }
            AnalyticsEvent::RateUsTapped { source } => {
                properties.insert("source", source.analytics_value().to_string());
            }
            AnalyticsEvent::PrivacyPolicyTapped | AnalyticsEvent::TermsAndConditionsTapped => {}
            AnalyticsEvent::TierChanged { tier } => {
                properties.insert("value", tier.analytics_value().to_string());
            }
            AnalyticsEvent::FrequencyChanged { frequency } => {
                properties.insert("value", frequency.analytics_value().to_string());
            }
            AnalyticsEvent::PurchaseStarted {
                product_id,
                flow,
                source,
            } => {
                properties.insert("flow", flow.analytics_value().to_string());
                properties.insert("source", source.analytics_value().to_string());
                properties.insert("product", product_id.clone());
            }
            AnalyticsEvent::PurchaseSucceeded { product_id }
            | AnalyticsEvent::PurchaseCancelled { product_id } => {
                properties.insert("product", product_id.clone());
            }
            AnalyticsEvent::PurchaseFailed { product_id, error } => {
                properties.insert("product", product_id.clone());
                properties.insert("error", error.clone());
            }
        }

        properties
    }
}

/// Trait for recording analytics events.
///
/// Recording is fire-and-forget; implementations must not block.
pub trait AnalyticsSink: Send + Sync {
    /// Record an analytics event
    fn record(&self, event: AnalyticsEvent);
}

/// A shared reference to an analytics sink
pub type SharedAnalyticsSink = Arc<dyn AnalyticsSink>;

/// An analytics sink that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn record(&self, _event: AnalyticsEvent) {
        // Intentionally empty
    }
}

impl NoopSink {
    /// Create a new NoopSink wrapped in an Arc
    pub fn shared() -> SharedAnalyticsSink {
        Arc::new(Self)
    }
}

/// An analytics sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, oldest first
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl AnalyticsSink for RecordingSink {
    fn record(&self, event: AnalyticsEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
