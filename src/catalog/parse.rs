// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;
use tracing::debug;

use crate::error::CatalogError;

use super::offer::{Catalog, Offer, PricingPhase, SubscriptionFrequency, SubscriptionTier};

/// Product details document as exported by the store backend
#[derive(Debug, Deserialize)]
struct ProductDocument {
    #[serde(default)]
    products: Vec<ProductDetails>,
}

#[derive(Debug, Deserialize)]
struct ProductDetails {
    product_id: String,
    #[serde(default)]
    offers: Vec<OfferDetails>,
}

#[derive(Debug, Deserialize)]
struct OfferDetails {
    #[serde(default)]
    offer_id: Option<String>,
    offer_token: String,
    #[serde(default)]
    pricing_phases: Vec<PricingPhase>,
}

/// Parse a product-details JSON document into a catalog
///
/// Offers are emitted in document order. Entries whose tier or billing
/// frequency cannot be determined are skipped.
pub fn parse_catalog(bytes: &[u8]) -> Result<Catalog, CatalogError> {
    let document: ProductDocument = serde_json::from_slice(bytes)?;

    let offers = document
        .products
        .into_iter()
        .flat_map(|product| {
            let product_id = product.product_id;
            product
                .offers
                .into_iter()
                .filter_map(move |details| map_offer(&product_id, details))
        })
        .collect();

    Ok(Catalog::new(offers))
}

fn map_offer(product_id: &str, details: OfferDetails) -> Option<Offer> {
    let tier = SubscriptionTier::from_product_id(product_id);
    if tier == SubscriptionTier::Free {
        debug!(product_id, "Skipping product without a subscription tier");
        return None;
    }

    let mut phases = details.pricing_phases;

    // The recurring phase is the last one; anything before it is introductory
    let Some(recurring_phase) = phases.pop() else {
        debug!(product_id, "Skipping offer without pricing phases");
        return None;
    };

    let Some(frequency) = SubscriptionFrequency::from_billing_period(&recurring_phase.billing_period)
    else {
        debug!(
            product_id,
            billing_period = %recurring_phase.billing_period,
            "Skipping offer with unsupported billing period"
        );
        return None;
    };

    Some(Offer {
        product_id: product_id.to_string(),
        offer_id: details.offer_id,
        offer_token: details.offer_token,
        tier,
        frequency,
        recurring_phase,
        intro_phase: phases.into_iter().next(),
    })
}
