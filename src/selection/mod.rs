mod filter;
mod policy;
mod selector;

pub use filter::{FixedEligibility, OfferEligibility, filter_offers};
pub use policy::{
    EntryContext, EntryPolicy, EntrySource, PreferenceReusePolicy, UpgradeFlow, VisibilityConstraint,
};
pub use selector::select_default_offer;
