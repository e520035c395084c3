mod fetch;
mod offer;
mod parse;
mod source;

#[cfg(test)]
pub(crate) use offer::test_support;

pub use fetch::{fetch_catalog, fetch_catalog_bytes, is_url, parse_catalog_file, read_catalog_file};
pub use offer::{Catalog, Offer, PricingPhase, SubscriptionFrequency, SubscriptionTier};
pub use parse::parse_catalog;
pub use source::{
    CatalogLocation, CatalogSource, CatalogStream, CatalogUpdate, PollingCatalogSource,
    StaticCatalogSource,
};
