// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Subscription level, ordered from least to most features
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Plus,
    Patron,
}

impl SubscriptionTier {
    /// Derive the tier from a store product identifier
    ///
    /// Identifiers look like `com.pocketcasts.plus.monthly`; anything that is
    /// neither a Plus nor a Patron product is treated as Free.
    pub fn from_product_id(product_id: &str) -> Self {
        let id = product_id.to_lowercase();
        if id.contains("patron") {
            SubscriptionTier::Patron
        } else if id.contains("plus") {
            SubscriptionTier::Plus
        } else {
            SubscriptionTier::Free
        }
    }

    /// Lowercase value used in analytics properties
    pub fn analytics_value(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Plus => "plus",
            SubscriptionTier::Patron => "patron",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::Plus => "Plus",
            SubscriptionTier::Patron => "Patron",
        };
        f.write_str(name)
    }
}

/// Billing cadence of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionFrequency {
    Monthly,
    Yearly,
}

impl SubscriptionFrequency {
    /// Map an ISO-8601 billing period (`P1M`, `P1Y`, `P12M`) to a frequency
    pub fn from_billing_period(period: &str) -> Option<Self> {
        match period.to_uppercase().as_str() {
            "P1M" | "P4W" => Some(SubscriptionFrequency::Monthly),
            "P1Y" | "P12M" | "P52W" => Some(SubscriptionFrequency::Yearly),
            _ => None,
        }
    }

    /// Lowercase value used in analytics properties
    pub fn analytics_value(&self) -> &'static str {
        match self {
            SubscriptionFrequency::Monthly => "monthly",
            SubscriptionFrequency::Yearly => "yearly",
        }
    }
}

impl fmt::Display for SubscriptionFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionFrequency::Monthly => "Monthly",
            SubscriptionFrequency::Yearly => "Yearly",
        };
        f.write_str(name)
    }
}

/// One pricing phase of an offer (trial, intro price or recurring price)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPhase {
    /// Price as shown to the user, e.g. "$3.99"
    pub formatted_price: String,
    pub price_amount_micros: i64,
    pub currency_code: String,
    /// ISO-8601 period, e.g. "P1M"
    pub billing_period: String,
    /// Number of billing cycles; 0 means the phase recurs indefinitely
    #[serde(default)]
    pub billing_cycle_count: u32,
}

impl PricingPhase {
    pub fn is_recurring(&self) -> bool {
        self.billing_cycle_count == 0
    }

    pub fn is_free(&self) -> bool {
        self.price_amount_micros == 0
    }
}

/// A purchasable subscription variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    /// Store product identifier
    pub product_id: String,
    /// Promotional offer identifier; `None` for the standard base plan
    pub offer_id: Option<String>,
    /// Opaque token handed to the billing backend
    pub offer_token: String,
    pub tier: SubscriptionTier,
    pub frequency: SubscriptionFrequency,
    /// The phase the user pays after any introductory phase ends
    pub recurring_phase: PricingPhase,
    /// Free trial or introductory price, if this is a promotional variant
    pub intro_phase: Option<PricingPhase>,
}

impl Offer {
    /// Whether this is a promotional variant rather than the base plan
    pub fn is_promotional(&self) -> bool {
        self.offer_id.is_some()
    }

    /// Whether the introductory phase is a free trial
    pub fn has_free_trial(&self) -> bool {
        self.intro_phase.as_ref().is_some_and(PricingPhase::is_free)
    }

    /// Catalog uniqueness key
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.product_id.as_str(), self.offer_id.as_deref())
    }
}

/// An ordered, immutable set of offers as reported by the store
///
/// Catalogs are replaced wholesale on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    offers: Vec<Offer>,
}

impl Catalog {
    /// Build a catalog, keeping the first offer for each `(product_id, offer_id)` key
    pub fn new(offers: Vec<Offer>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(offers.len());

        for offer in offers {
            let key = (offer.product_id.clone(), offer.offer_id.clone());
            if seen.insert(key) {
                unique.push(offer);
            } else {
                warn!(
                    product_id = %offer.product_id,
                    offer_id = ?offer.offer_id,
                    "Dropping duplicate catalog entry"
                );
            }
        }

        Self { offers: unique }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}
