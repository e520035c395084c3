pub mod analytics;
pub mod catalog;
pub mod error;
pub mod http;
pub mod preferences;
pub mod purchase;
pub mod selection;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use analytics::{AnalyticsEvent, AnalyticsSink, NoopSink, RecordingSink, SharedAnalyticsSink};
pub use catalog::{
    Catalog, CatalogLocation, CatalogSource, CatalogUpdate, Offer, PollingCatalogSource,
    PricingPhase, StaticCatalogSource, SubscriptionFrequency, SubscriptionTier, fetch_catalog,
    is_url, parse_catalog, parse_catalog_file,
};
pub use error::{BillingError, CatalogError, PreferenceError, SessionError};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use preferences::{
    JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore, SelectionPreference,
};
pub use purchase::{
    BillingClient, BillingScript, PurchaseBus, PurchaseEvents, PurchaseOutcome,
    PurchaseResolution, ScriptedBilling, run_purchase,
};
pub use selection::{
    EntryContext, EntryPolicy, EntrySource, FixedEligibility, OfferEligibility,
    PreferenceReusePolicy, UpgradeFlow, VisibilityConstraint, filter_offers,
    select_default_offer,
};
pub use session::{
    CompletionCallback, SessionDeps, SessionHandle, SessionOptions, UpgradeSession, start_session,
};
pub use state::{Effect, LoadedState, UpgradeEvent, UpgradeMachine, UpgradeState};
