// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::analytics::AnalyticsEvent;
use crate::catalog::{CatalogUpdate, Offer, SubscriptionFrequency, SubscriptionTier};
use crate::preferences::SelectionPreference;
use crate::purchase::{PurchaseOutcome, PurchaseResolution};
use crate::selection::{
    EntryContext, EntryPolicy, EntrySource, OfferEligibility, PreferenceReusePolicy, filter_offers,
    select_default_offer,
};

/// Screen state once a selectable offer exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    /// The filtered catalog the user can choose from
    pub offers: Vec<Offer>,
    /// The offer a purchase would buy; always one of `offers`
    pub selected: Offer,
    /// Always equal to `selected.tier`
    pub tier: SubscriptionTier,
    /// Always equal to `selected.frequency`
    pub frequency: SubscriptionFrequency,
    pub show_skip: bool,
    /// Set by a failed purchase, cleared when the next attempt starts
    pub purchase_failed: bool,
}

impl LoadedState {
    fn new(offers: Vec<Offer>, selected: Offer, show_skip: bool) -> Self {
        Self {
            tier: selected.tier,
            frequency: selected.frequency,
            offers,
            selected,
            show_skip,
            purchase_failed: false,
        }
    }

    fn reselect(&self, selected: Offer) -> Self {
        Self::new(self.offers.clone(), selected, self.show_skip)
    }

    /// Billing frequencies offered by the frequency switch, in display order
    pub fn frequencies(&self) -> [SubscriptionFrequency; 2] {
        [SubscriptionFrequency::Yearly, SubscriptionFrequency::Monthly]
    }

    /// Tiers present in the filtered catalog, in catalog order
    pub fn tiers(&self) -> Vec<SubscriptionTier> {
        let mut tiers = Vec::new();
        for offer in &self.offers {
            if !tiers.contains(&offer.tier) {
                tiers.push(offer.tier);
            }
        }
        tiers
    }
}

/// What the upgrade screen shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpgradeState {
    /// No catalog has arrived yet
    #[default]
    Loading,
    /// A catalog arrived but nothing in it can be offered
    NoSubscriptions { show_skip: bool },
    Loaded(LoadedState),
}

impl UpgradeState {
    pub fn is_loading(&self) -> bool {
        matches!(self, UpgradeState::Loading)
    }

    pub fn as_loaded(&self) -> Option<&LoadedState> {
        match self {
            UpgradeState::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeEvent {
    CatalogRefreshed(CatalogUpdate),
    TierChanged(SubscriptionTier),
    FrequencyChanged(SubscriptionFrequency),
    PurchaseRequested,
    PurchaseOutcomeReceived(PurchaseResolution),
    Shown,
    Dismissed,
    NotNowTapped,
    RateUsTapped,
    PrivacyPolicyTapped,
    TermsAndConditionsTapped,
}

/// Side effects requested by a transition, executed by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistTier(SubscriptionTier),
    PersistFrequency(SubscriptionFrequency),
    Track(AnalyticsEvent),
    /// Launch billing for this offer and wait for its outcome
    BeginPurchase(Offer),
    /// The purchase succeeded; hand control back to the host
    Complete,
    /// A purchase was requested while another one is pending
    PurchaseRejected,
    /// The outcome stream ended without reporting anything
    OutcomeMissing { product_id: String },
}

/// Upgrade screen state machine
///
/// Transitions are synchronous and free of I/O; every side effect is
/// returned as an [`Effect`]. Events that make no sense in the current state
/// are ignored.
pub struct UpgradeMachine {
    state: UpgradeState,
    entry: EntryContext,
    policy: EntryPolicy,
    initial_preference: Option<SelectionPreference>,
    eligibility: Arc<dyn OfferEligibility>,
    pending_purchase: Option<Offer>,
    /// Tier and frequency of the last loaded selection, kept while no offers are shown
    last_choice: Option<(SubscriptionTier, SubscriptionFrequency)>,
}

impl UpgradeMachine {
    /// Create a machine in the `Loading` state
    ///
    /// `stored` is only honoured when the entry context allows reusing the
    /// previous choice.
    pub fn new(
        entry: EntryContext,
        stored: Option<SelectionPreference>,
        eligibility: Arc<dyn OfferEligibility>,
    ) -> Self {
        let policy = entry.policy();
        let initial_preference = match policy.preference_reuse {
            PreferenceReusePolicy::Reuse => stored,
            PreferenceReusePolicy::Ignore => None,
        };

        Self {
            state: UpgradeState::Loading,
            entry,
            policy,
            initial_preference,
            eligibility,
            pending_purchase: None,
            last_choice: None,
        }
    }

    pub fn state(&self) -> &UpgradeState {
        &self.state
    }

    /// The offer of the purchase attempt awaiting its outcome, if any
    pub fn pending_purchase(&self) -> Option<&Offer> {
        self.pending_purchase.as_ref()
    }

    /// Apply one event and return the side effects it requires
    pub fn apply(&mut self, event: UpgradeEvent) -> Vec<Effect> {
        match event {
            UpgradeEvent::CatalogRefreshed(update) => self.on_catalog_refreshed(update),
            UpgradeEvent::TierChanged(tier) => self.on_tier_changed(tier),
            UpgradeEvent::FrequencyChanged(frequency) => self.on_frequency_changed(frequency),
            UpgradeEvent::PurchaseRequested => self.on_purchase_requested(),
            UpgradeEvent::PurchaseOutcomeReceived(resolution) => {
                self.on_purchase_resolved(resolution)
            }
            UpgradeEvent::Shown => vec![Effect::Track(AnalyticsEvent::PromotionShown {
                flow: self.entry.flow,
                source: self.entry.source,
            })],
            UpgradeEvent::Dismissed => vec![Effect::Track(AnalyticsEvent::PromotionDismissed {
                flow: self.entry.flow,
                source: self.entry.source,
            })],
            UpgradeEvent::NotNowTapped => {
                vec![Effect::Track(AnalyticsEvent::PromotionNotNowTapped {
                    flow: self.entry.flow,
                    source: self.entry.source,
                })]
            }
            // Rating is attributed to the plus details screen wherever it was opened from
            UpgradeEvent::RateUsTapped => vec![Effect::Track(AnalyticsEvent::RateUsTapped {
                source: EntrySource::PlusDetails,
            })],
            UpgradeEvent::PrivacyPolicyTapped => {
                vec![Effect::Track(AnalyticsEvent::PrivacyPolicyTapped)]
            }
            UpgradeEvent::TermsAndConditionsTapped => {
                vec![Effect::Track(AnalyticsEvent::TermsAndConditionsTapped)]
            }
        }
    }

    fn initial_request(&self) -> (Option<SubscriptionTier>, Option<SubscriptionFrequency>) {
        let preference = self.initial_preference.unwrap_or_default();
        let tier = self.policy.visibility.required_tier().or(preference.tier);
        (tier, preference.frequency)
    }

    fn on_catalog_refreshed(&mut self, update: CatalogUpdate) -> Vec<Effect> {
        if let CatalogUpdate::Failed(reason) = &update {
            warn!(%reason, "Catalog refresh failed, treating it as empty");
        }

        let catalog = update.into_catalog();
        let offers = filter_offers(
            catalog.offers(),
            self.policy.visibility,
            self.eligibility.as_ref(),
        );

        // A refresh keeps whatever the user last looked at, even across an empty catalog
        if let UpgradeState::Loaded(loaded) = &self.state {
            self.last_choice = Some((loaded.tier, loaded.frequency));
        }
        let (tier, frequency) = match self.last_choice {
            Some((tier, frequency)) => (Some(tier), Some(frequency)),
            None => self.initial_request(),
        };

        let show_skip = self.policy.show_skip;
        self.state = match select_default_offer(&offers, tier, frequency).cloned() {
            Some(selected) => {
                debug!(
                    product_id = %selected.product_id,
                    offers = offers.len(),
                    "Catalog refreshed"
                );
                UpgradeState::Loaded(LoadedState::new(offers, selected, show_skip))
            }
            None => {
                debug!("Catalog refreshed without any selectable offer");
                UpgradeState::NoSubscriptions { show_skip }
            }
        };

        Vec::new()
    }

    fn on_tier_changed(&mut self, tier: SubscriptionTier) -> Vec<Effect> {
        let UpgradeState::Loaded(loaded) = &self.state else {
            return Vec::new();
        };

        let selected = select_default_offer(&loaded.offers, Some(tier), Some(loaded.frequency));
        if let Some(offer) = selected {
            let next = loaded.reselect(offer.clone());
            self.state = UpgradeState::Loaded(next);
        }

        vec![
            Effect::PersistTier(tier),
            Effect::Track(AnalyticsEvent::TierChanged { tier }),
        ]
    }

    fn on_frequency_changed(&mut self, frequency: SubscriptionFrequency) -> Vec<Effect> {
        let UpgradeState::Loaded(loaded) = &self.state else {
            return Vec::new();
        };

        let selected = select_default_offer(&loaded.offers, Some(loaded.tier), Some(frequency));
        if let Some(offer) = selected {
            let next = loaded.reselect(offer.clone());
            self.state = UpgradeState::Loaded(next);
        }

        vec![
            Effect::PersistFrequency(frequency),
            Effect::Track(AnalyticsEvent::FrequencyChanged { frequency }),
        ]
    }

    fn on_purchase_requested(&mut self) -> Vec<Effect> {
        let UpgradeState::Loaded(loaded) = &mut self.state else {
            return Vec::new();
        };

        if let Some(pending) = &self.pending_purchase {
            debug!(product_id = %pending.product_id, "Purchase already in progress");
            return vec![Effect::PurchaseRejected];
        }

        loaded.purchase_failed = false;
        let offer = loaded.selected.clone();
        self.pending_purchase = Some(offer.clone());

        vec![
            Effect::Track(AnalyticsEvent::PurchaseStarted {
                product_id: offer.product_id.clone(),
                flow: self.entry.flow,
                source: self.entry.source,
            }),
            Effect::BeginPurchase(offer),
        ]
    }

    fn on_purchase_resolved(&mut self, resolution: PurchaseResolution) -> Vec<Effect> {
        let Some(offer) = self.pending_purchase.take() else {
            debug!(?resolution, "Ignoring purchase outcome without a pending purchase");
            return Vec::new();
        };
        let product_id = offer.product_id;

        match resolution {
            PurchaseResolution::Reported(PurchaseOutcome::Success) => vec![
                Effect::Track(AnalyticsEvent::PurchaseSucceeded { product_id }),
                Effect::Complete,
            ],
            PurchaseResolution::Reported(PurchaseOutcome::Cancelled) => {
                vec![Effect::Track(AnalyticsEvent::PurchaseCancelled { product_id })]
            }
            PurchaseResolution::Reported(PurchaseOutcome::Failure { message }) => {
                self.mark_purchase_failed();
                vec![Effect::Track(AnalyticsEvent::PurchaseFailed {
                    product_id,
                    error: message,
                })]
            }
            PurchaseResolution::TimedOut => {
                self.mark_purchase_failed();
                vec![Effect::Track(AnalyticsEvent::PurchaseFailed {
                    product_id,
                    error: "timed out waiting for purchase outcome".to_string(),
                })]
            }
            PurchaseResolution::StreamClosed => vec![Effect::OutcomeMissing { product_id }],
        }
    }

    fn mark_purchase_failed(&mut self) {
        if let UpgradeState::Loaded(loaded) = &mut self.state {
            loaded.purchase_failed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::catalog::Catalog;
    use crate::catalog::SubscriptionFrequency::{Monthly, Yearly};
    use crate::catalog::SubscriptionTier::{Patron, Plus};
    use crate::catalog::test_support::{offer, trial_offer};
    use crate::selection::{FixedEligibility, UpgradeFlow};

    fn machine(entry: EntryContext) -> UpgradeMachine {
        UpgradeMachine::new(entry, None, Arc::new(FixedEligibility(false)))
    }

    fn refreshed(offers: Vec<Offer>) -> UpgradeEvent {
        UpgradeEvent::CatalogRefreshed(CatalogUpdate::Loaded(Catalog::new(offers)))
    }

    fn loaded(machine: &UpgradeMachine) -> &LoadedState {
        machine.state().as_loaded().expect("machine should be loaded")
    }

    fn loaded_machine(offers: Vec<Offer>) -> UpgradeMachine {
        let mut machine = machine(EntryContext::default());
        machine.apply(refreshed(offers));
        machine
    }

    #[test]
    fn starts_loading() {
        let machine = machine(EntryContext::default());
        assert!(machine.state().is_loading());
    }

    #[test]
    fn empty_catalog_yields_no_subscriptions() {
        let mut machine = machine(EntryContext::default());

        let effects = machine.apply(refreshed(vec![]));

        assert!(effects.is_empty());
        assert_eq!(
            machine.state(),
            &UpgradeState::NoSubscriptions { show_skip: false }
        );
    }

    #[test]
    fn failed_refresh_yields_no_subscriptions_with_skip() {
        let mut machine = machine(EntryContext {
            source: EntrySource::Recommendations,
            ..Default::default()
        });

        machine.apply(UpgradeEvent::CatalogRefreshed(CatalogUpdate::Failed(
            "offline".to_string(),
        )));

        assert_eq!(
            machine.state(),
            &UpgradeState::NoSubscriptions { show_skip: true }
        );
    }

    #[test]
    fn failed_refresh_drops_previous_catalog() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);

        machine.apply(UpgradeEvent::CatalogRefreshed(CatalogUpdate::Failed(
            "offline".to_string(),
        )));

        assert!(matches!(
            machine.state(),
            UpgradeState::NoSubscriptions { .. }
        ));
    }

    #[test]
    fn single_offer_catalog_is_loaded() {
        let machine = loaded_machine(vec![offer(Plus, Monthly)]);
        let state = loaded(&machine);

        assert_eq!(state.selected, offer(Plus, Monthly));
        assert_eq!(state.tier, Plus);
        assert_eq!(state.frequency, Monthly);
        assert!(!state.purchase_failed);
    }

    #[test]
    fn tier_change_selects_offer_of_new_tier() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly), offer(Patron, Yearly)]);

        let effects = machine.apply(UpgradeEvent::TierChanged(Patron));
        let state = loaded(&machine);

        assert_eq!(state.selected, offer(Patron, Yearly));
        assert_eq!(state.tier, Patron);
        assert_eq!(state.frequency, Yearly);
        assert!(!state.purchase_failed);
        assert_eq!(
            effects,
            vec![
                Effect::PersistTier(Patron),
                Effect::Track(AnalyticsEvent::TierChanged { tier: Patron }),
            ]
        );
    }

    #[test]
    fn tier_change_keeps_current_frequency_when_available() {
        let mut machine = loaded_machine(vec![
            offer(Plus, Monthly),
            offer(Plus, Yearly),
            offer(Patron, Monthly),
            offer(Patron, Yearly),
        ]);
        machine.apply(UpgradeEvent::FrequencyChanged(Yearly));

        machine.apply(UpgradeEvent::TierChanged(Patron));

        assert_eq!(loaded(&machine).selected, offer(Patron, Yearly));
    }

    fn failed_purchase(machine: &mut UpgradeMachine) {
        machine.apply(UpgradeEvent::PurchaseRequested);
        machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::Reported(PurchaseOutcome::Failure {
                message: "declined".to_string(),
            }),
        ));
        assert!(loaded(machine).purchase_failed);
    }

    #[test]
    fn tier_change_clears_failed_purchase() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly), offer(Patron, Yearly)]);
        failed_purchase(&mut machine);

        machine.apply(UpgradeEvent::TierChanged(Patron));

        assert_eq!(loaded(&machine).selected, offer(Patron, Yearly));
        assert!(!loaded(&machine).purchase_failed);
    }

    #[test]
    fn frequency_change_clears_failed_purchase() {
        let mut machine = loaded_machine(vec![offer(Plus, Yearly), offer(Plus, Monthly)]);
        failed_purchase(&mut machine);

        machine.apply(UpgradeEvent::FrequencyChanged(Monthly));

        assert_eq!(loaded(&machine).selected, offer(Plus, Monthly));
        assert!(!loaded(&machine).purchase_failed);
    }

    #[test]
    fn frequency_change_selects_within_current_tier() {
        let mut machine = loaded_machine(vec![
            offer(Plus, Monthly),
            offer(Patron, Yearly),
            offer(Plus, Yearly),
        ]);

        let effects = machine.apply(UpgradeEvent::FrequencyChanged(Yearly));
        let state = loaded(&machine);

        assert_eq!(state.selected, offer(Plus, Yearly));
        assert_eq!(state.frequency, Yearly);
        assert_eq!(effects[0], Effect::PersistFrequency(Yearly));
    }

    #[test]
    fn selection_changes_are_ignored_before_loading() {
        let mut machine = machine(EntryContext::default());

        assert!(machine.apply(UpgradeEvent::TierChanged(Patron)).is_empty());
        assert!(machine.apply(UpgradeEvent::FrequencyChanged(Yearly)).is_empty());
        assert!(machine.apply(UpgradeEvent::PurchaseRequested).is_empty());
        assert!(machine.state().is_loading());
    }

    #[test]
    fn purchase_request_begins_purchase_of_selected_offer() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);

        let effects = machine.apply(UpgradeEvent::PurchaseRequested);

        assert_eq!(
            effects,
            vec![
                Effect::Track(AnalyticsEvent::PurchaseStarted {
                    product_id: "com.pocketcasts.plus.monthly".to_string(),
                    flow: UpgradeFlow::Onboarding,
                    source: EntrySource::Unknown,
                }),
                Effect::BeginPurchase(offer(Plus, Monthly)),
            ]
        );
        assert_eq!(machine.pending_purchase(), Some(&offer(Plus, Monthly)));
    }

    #[test]
    fn failure_sets_flag_and_next_request_clears_it() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);

        machine.apply(UpgradeEvent::PurchaseRequested);
        machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::Reported(PurchaseOutcome::Failure {
                message: "declined".to_string(),
            }),
        ));
        assert!(loaded(&machine).purchase_failed);

        machine.apply(UpgradeEvent::PurchaseRequested);
        assert!(!loaded(&machine).purchase_failed);
    }

    #[test]
    fn success_completes_without_state_change() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);
        machine.apply(UpgradeEvent::PurchaseRequested);
        let before = machine.state().clone();

        let effects = machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::Reported(PurchaseOutcome::Success),
        ));

        assert!(effects.contains(&Effect::Complete));
        assert_eq!(machine.state(), &before);
        assert!(machine.pending_purchase().is_none());
    }

    #[test]
    fn cancellation_changes_nothing() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);
        machine.apply(UpgradeEvent::PurchaseRequested);
        let before = machine.state().clone();

        let effects = machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::Reported(PurchaseOutcome::Cancelled),
        ));

        assert!(!effects.contains(&Effect::Complete));
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn timeout_counts_as_failure() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);
        machine.apply(UpgradeEvent::PurchaseRequested);

        machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::TimedOut,
        ));

        assert!(loaded(&machine).purchase_failed);
    }

    #[test]
    fn closed_stream_is_reported_without_state_change() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);
        machine.apply(UpgradeEvent::PurchaseRequested);
        let before = machine.state().clone();

        let effects = machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::StreamClosed,
        ));

        assert_eq!(
            effects,
            vec![Effect::OutcomeMissing {
                product_id: "com.pocketcasts.plus.monthly".to_string()
            }]
        );
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn overlapping_purchase_is_rejected() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);
        machine.apply(UpgradeEvent::PurchaseRequested);

        let effects = machine.apply(UpgradeEvent::PurchaseRequested);

        assert_eq!(effects, vec![Effect::PurchaseRejected]);
    }

    #[test]
    fn outcome_without_pending_purchase_is_ignored() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);

        let effects = machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::Reported(PurchaseOutcome::Failure {
                message: "stale".to_string(),
            }),
        ));

        assert!(effects.is_empty());
        assert!(!loaded(&machine).purchase_failed);
    }

    #[test]
    fn refresh_during_purchase_keeps_pending_attempt() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly)]);
        machine.apply(UpgradeEvent::PurchaseRequested);

        machine.apply(refreshed(vec![offer(Plus, Monthly), offer(Plus, Yearly)]));

        assert_eq!(machine.pending_purchase(), Some(&offer(Plus, Monthly)));
        let effects = machine.apply(UpgradeEvent::PurchaseOutcomeReceived(
            PurchaseResolution::Reported(PurchaseOutcome::Success),
        ));
        assert!(effects.contains(&Effect::Complete));
    }

    #[test]
    fn refresh_keeps_user_selection() {
        let mut machine = loaded_machine(vec![offer(Plus, Monthly), offer(Patron, Yearly)]);
        machine.apply(UpgradeEvent::TierChanged(Patron));

        machine.apply(refreshed(vec![
            offer(Plus, Monthly),
            offer(Patron, Monthly),
            offer(Patron, Yearly),
        ]));

        assert_eq!(loaded(&machine).selected, offer(Patron, Yearly));
    }

    #[test]
    fn patron_only_filters_before_selection() {
        let mut machine = machine(EntryContext {
            source: EntrySource::AccountDetails,
            ..Default::default()
        });

        machine.apply(refreshed(vec![
            offer(Plus, Monthly),
            offer(Plus, Yearly),
            offer(Patron, Monthly),
            offer(Patron, Yearly),
        ]));
        let state = loaded(&machine);

        assert!(state.offers.iter().all(|offer| offer.tier == Patron));
        assert_eq!(state.selected, offer(Patron, Monthly));
        assert_eq!(state.tiers(), vec![Patron]);
    }

    #[test]
    fn patron_only_without_patron_offers_has_no_subscriptions() {
        let mut machine = machine(EntryContext {
            patron_only: true,
            ..Default::default()
        });

        machine.apply(refreshed(vec![offer(Plus, Monthly)]));

        assert!(matches!(
            machine.state(),
            UpgradeState::NoSubscriptions { .. }
        ));
    }

    #[test]
    fn login_reuses_stored_preference() {
        let stored = SelectionPreference {
            tier: Some(Patron),
            frequency: Some(Yearly),
        };
        let mut machine = UpgradeMachine::new(
            EntryContext {
                source: EntrySource::Login,
                ..Default::default()
            },
            Some(stored),
            Arc::new(FixedEligibility(false)),
        );

        machine.apply(refreshed(vec![
            offer(Plus, Monthly),
            offer(Patron, Monthly),
            offer(Patron, Yearly),
        ]));

        assert_eq!(loaded(&machine).selected, offer(Patron, Yearly));
    }

    #[test]
    fn other_sources_ignore_stored_preference() {
        let stored = SelectionPreference {
            tier: Some(Patron),
            frequency: Some(Yearly),
        };
        let mut machine = UpgradeMachine::new(
            EntryContext {
                source: EntrySource::Profile,
                ..Default::default()
            },
            Some(stored),
            Arc::new(FixedEligibility(false)),
        );

        machine.apply(refreshed(vec![offer(Plus, Monthly), offer(Patron, Yearly)]));

        assert_eq!(loaded(&machine).selected, offer(Plus, Monthly));
    }

    #[test]
    fn eligible_users_see_trial_variant() {
        let mut machine = UpgradeMachine::new(
            EntryContext::default(),
            None,
            Arc::new(FixedEligibility(true)),
        );

        machine.apply(refreshed(vec![
            offer(Plus, Monthly),
            trial_offer(Plus, Monthly),
        ]));

        assert_eq!(loaded(&machine).selected, trial_offer(Plus, Monthly));
    }

    #[test]
    fn screen_events_are_tracked_with_flow_and_source() {
        let mut machine = machine(EntryContext {
            flow: UpgradeFlow::Upsell,
            source: EntrySource::Recommendations,
            patron_only: false,
        });

        let effects = machine.apply(UpgradeEvent::NotNowTapped);

        assert_eq!(
            effects,
            vec![Effect::Track(AnalyticsEvent::PromotionNotNowTapped {
                flow: UpgradeFlow::Upsell,
                source: EntrySource::Recommendations,
            })]
        );
    }

    #[test]
    fn selection_survives_failed_refresh() {
        let offers = vec![offer(Plus, Monthly), offer(Patron, Yearly)];
        let mut machine = loaded_machine(offers.clone());
        machine.apply(UpgradeEvent::TierChanged(Patron));

        machine.apply(UpgradeEvent::CatalogRefreshed(CatalogUpdate::Failed(
            "offline".to_string(),
        )));
        machine.apply(refreshed(offers));

        assert_eq!(loaded(&machine).selected, offer(Patron, Yearly));
    }

    #[test]
    fn link_taps_are_tracked() {
        let mut machine = machine(EntryContext {
            source: EntrySource::Login,
            ..Default::default()
        });

        let mut effects = machine.apply(UpgradeEvent::RateUsTapped);
        effects.extend(machine.apply(UpgradeEvent::PrivacyPolicyTapped));
        effects.extend(machine.apply(UpgradeEvent::TermsAndConditionsTapped));

        assert_eq!(
            effects,
            vec![
                Effect::Track(AnalyticsEvent::RateUsTapped {
                    source: EntrySource::PlusDetails,
                }),
                Effect::Track(AnalyticsEvent::PrivacyPolicyTapped),
                Effect::Track(AnalyticsEvent::TermsAndConditionsTapped),
            ]
        );
        assert!(machine.state().is_loading());
    }
}
