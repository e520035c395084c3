// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::catalog::{Offer, SubscriptionFrequency, SubscriptionTier};

/// Pick the offer to present from a filtered catalog
///
/// Determines the selection based on:
/// 1. An empty catalog selects nothing
/// 2. A requested tier narrows the candidates to that tier, falling back to
///    the whole catalog if the tier is not on offer
/// 3. A requested frequency picks the first candidate billed that way
/// 4. Otherwise the first candidate in catalog order wins
pub fn select_default_offer<'a>(
    offers: &'a [Offer],
    tier: Option<SubscriptionTier>,
    frequency: Option<SubscriptionFrequency>,
) -> Option<&'a Offer> {
    if offers.is_empty() {
        return None;
    }

    let mut candidates: Vec<&Offer> = match tier {
        Some(tier) => offers.iter().filter(|offer| offer.tier == tier).collect(),
        None => Vec::new(),
    };
    if candidates.is_empty() {
        candidates = offers.iter().collect();
    }

    frequency
        .and_then(|frequency| {
            candidates
                .iter()
                .find(|offer| offer.frequency == frequency)
                .copied()
        })
        .or_else(|| candidates.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::catalog::test_support::offer;

    use crate::catalog::SubscriptionFrequency::{Monthly, Yearly};
    use crate::catalog::SubscriptionTier::{Free, Patron, Plus};

    fn full_catalog() -> Vec<Offer> {
        vec![
            offer(Plus, Monthly),
            offer(Plus, Yearly),
            offer(Patron, Monthly),
            offer(Patron, Yearly),
        ]
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        for tier in [None, Some(Free), Some(Plus), Some(Patron)] {
            for frequency in [None, Some(Monthly), Some(Yearly)] {
                assert_eq!(select_default_offer(&[], tier, frequency), None);
            }
        }
    }

    #[test]
    fn selection_always_belongs_to_catalog() {
        let catalogs = [
            full_catalog(),
            vec![offer(Patron, Yearly)],
            vec![offer(Plus, Monthly), offer(Patron, Yearly)],
        ];

        for catalog in &catalogs {
            for tier in [None, Some(Free), Some(Plus), Some(Patron)] {
                for frequency in [None, Some(Monthly), Some(Yearly)] {
                    let selected = select_default_offer(catalog, tier, frequency).unwrap();
                    assert!(catalog.contains(selected));
                }
            }
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let catalog = full_catalog();
        let first = select_default_offer(&catalog, Some(Patron), Some(Monthly));
        let second = select_default_offer(&catalog, Some(Patron), Some(Monthly));
        assert_eq!(first, second);
    }

    #[test]
    fn absent_tier_falls_back_to_first_offer() {
        let catalog = vec![offer(Plus, Monthly), offer(Patron, Yearly)];

        let selected = select_default_offer(&catalog, Some(Free), None);

        assert_eq!(selected, Some(&offer(Plus, Monthly)));
    }

    #[test]
    fn requested_frequency_is_preferred() {
        let catalog = vec![offer(Plus, Monthly), offer(Plus, Yearly)];

        let selected = select_default_offer(&catalog, Some(Plus), Some(Yearly));

        assert_eq!(selected, Some(&offer(Plus, Yearly)));
    }

    #[test]
    fn missing_frequency_falls_back_to_first_of_tier() {
        let catalog = vec![offer(Plus, Monthly), offer(Patron, Yearly)];

        let selected = select_default_offer(&catalog, Some(Patron), Some(Monthly));

        assert_eq!(selected, Some(&offer(Patron, Yearly)));
    }

    #[test]
    fn frequency_without_tier_searches_whole_catalog() {
        let catalog = full_catalog();

        let selected = select_default_offer(&catalog, None, Some(Yearly));

        assert_eq!(selected, Some(&offer(Plus, Yearly)));
    }

    #[test]
    fn no_request_selects_first_offer() {
        let catalog = full_catalog();

        let selected = select_default_offer(&catalog, None, None);

        assert_eq!(selected, Some(&offer(Plus, Monthly)));
    }
}
