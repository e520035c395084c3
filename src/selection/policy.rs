// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::str::FromStr;

use crate::catalog::SubscriptionTier;

/// Where the upgrade screen was opened from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntrySource {
    Login,
    Profile,
    AccountDetails,
    Recommendations,
    Settings,
    PlusDetails,
    #[default]
    Unknown,
}

impl EntrySource {
    pub fn analytics_value(&self) -> &'static str {
        match self {
            EntrySource::Login => "login",
            EntrySource::Profile => "profile",
            EntrySource::AccountDetails => "account_details",
            EntrySource::Recommendations => "recommendations",
            EntrySource::Settings => "settings",
            EntrySource::PlusDetails => "plus_details",
            EntrySource::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.analytics_value())
    }
}

impl FromStr for EntrySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "login" => Ok(EntrySource::Login),
            "profile" => Ok(EntrySource::Profile),
            "account_details" => Ok(EntrySource::AccountDetails),
            "recommendations" => Ok(EntrySource::Recommendations),
            "settings" => Ok(EntrySource::Settings),
            "plus_details" => Ok(EntrySource::PlusDetails),
            "unknown" => Ok(EntrySource::Unknown),
            other => Err(format!("unknown entry source '{other}'")),
        }
    }
}

/// Which onboarding flow hosts the upgrade screen; used to tag analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpgradeFlow {
    #[default]
    Onboarding,
    Upsell,
    PlusUpgrade,
    PatronUpgrade,
}

impl UpgradeFlow {
    pub fn analytics_value(&self) -> &'static str {
        match self {
            UpgradeFlow::Onboarding => "onboarding",
            UpgradeFlow::Upsell => "upsell",
            UpgradeFlow::PlusUpgrade => "plus_upgrade",
            UpgradeFlow::PatronUpgrade => "patron_upgrade",
        }
    }
}

impl fmt::Display for UpgradeFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.analytics_value())
    }
}

/// Which tiers may be shown and selected in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityConstraint {
    #[default]
    AllTiers,
    SingleTier(SubscriptionTier),
}

impl VisibilityConstraint {
    pub fn allows(&self, tier: SubscriptionTier) -> bool {
        match self {
            VisibilityConstraint::AllTiers => true,
            VisibilityConstraint::SingleTier(only) => *only == tier,
        }
    }

    /// The tier a session must request, if the constraint pins one
    pub fn required_tier(&self) -> Option<SubscriptionTier> {
        match self {
            VisibilityConstraint::AllTiers => None,
            VisibilityConstraint::SingleTier(tier) => Some(*tier),
        }
    }
}

/// Whether a stored tier/frequency choice seeds the initial selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferenceReusePolicy {
    Reuse,
    #[default]
    Ignore,
}

/// Everything derived from the entry parameters, computed once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryPolicy {
    pub visibility: VisibilityConstraint,
    pub preference_reuse: PreferenceReusePolicy,
    /// Show a "not now" affordance that lets the user skip the upgrade
    pub show_skip: bool,
}

impl EntryPolicy {
    pub fn from_entry(source: EntrySource, patron_only: bool) -> Self {
        let visibility = if patron_only || source == EntrySource::AccountDetails {
            VisibilityConstraint::SingleTier(SubscriptionTier::Patron)
        } else {
            VisibilityConstraint::AllTiers
        };

        let preference_reuse = if source == EntrySource::Login {
            PreferenceReusePolicy::Reuse
        } else {
            PreferenceReusePolicy::Ignore
        };

        Self {
            visibility,
            preference_reuse,
            show_skip: source == EntrySource::Recommendations,
        }
    }
}

/// Entry parameters supplied by the hosting screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryContext {
    pub flow: UpgradeFlow,
    pub source: EntrySource,
    /// Restrict the screen to the top tier
    pub patron_only: bool,
}

impl EntryContext {
    pub fn policy(&self) -> EntryPolicy {
        EntryPolicy::from_entry(self.source, self.patron_only)
    }
}
