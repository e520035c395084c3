// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use crate::catalog::{Offer, SubscriptionFrequency, SubscriptionTier};

use super::policy::VisibilityConstraint;

/// Answers whether the current user may redeem promotional pricing for a tier
pub trait OfferEligibility: Send + Sync {
    fn is_promotionally_eligible(&self, tier: SubscriptionTier) -> bool;
}

/// Eligibility that gives the same answer for every tier
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedEligibility(pub bool);

impl OfferEligibility for FixedEligibility {
    fn is_promotionally_eligible(&self, _tier: SubscriptionTier) -> bool {
        self.0
    }
}

/// Narrow a catalog to the offers that may be presented
///
/// Offers outside the visibility constraint are dropped. When a tier and
/// frequency pair has several variants, only one survives: the promotional
/// one if the user is eligible for that tier, the standard one otherwise,
/// or the first of the pair if the preferred kind is missing. Survivors keep
/// their catalog order.
pub fn filter_offers(
    offers: &[Offer],
    visibility: VisibilityConstraint,
    eligibility: &dyn OfferEligibility,
) -> Vec<Offer> {
    let visible: Vec<&Offer> = offers
        .iter()
        .filter(|offer| visibility.allows(offer.tier))
        .collect();

    let mut chosen: HashMap<(SubscriptionTier, SubscriptionFrequency), usize> = HashMap::new();
    let mut eligible: HashMap<SubscriptionTier, bool> = HashMap::new();

    for (index, offer) in visible.iter().enumerate() {
        let pair = (offer.tier, offer.frequency);
        let prefer_promotional = *eligible
            .entry(offer.tier)
            .or_insert_with(|| eligibility.is_promotionally_eligible(offer.tier));

        match chosen.get(&pair) {
            None => {
                chosen.insert(pair, index);
            }
            Some(&current) => {
                let current_matches = visible[current].is_promotional() == prefer_promotional;
                let candidate_matches = offer.is_promotional() == prefer_promotional;
                if candidate_matches && !current_matches {
                    chosen.insert(pair, index);
                }
            }
        }
    }

    visible
        .iter()
        .enumerate()
        .filter(|(index, offer)| chosen.get(&(offer.tier, offer.frequency)) == Some(index))
        .map(|(_, offer)| (*offer).clone())
        .collect()
}
