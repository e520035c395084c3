// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::http::HttpClient;

use super::fetch::{fetch_catalog, is_url, parse_catalog_file};
use super::offer::Catalog;

/// One snapshot pushed by a catalog source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogUpdate {
    /// A complete replacement catalog
    Loaded(Catalog),
    /// The source could not produce a catalog
    Failed(String),
}

impl CatalogUpdate {
    /// Resolve to a catalog; failures count as an empty catalog
    pub fn into_catalog(self) -> Catalog {
        match self {
            CatalogUpdate::Loaded(catalog) => catalog,
            CatalogUpdate::Failed(_) => Catalog::empty(),
        }
    }
}

impl From<Result<Catalog, CatalogError>> for CatalogUpdate {
    fn from(result: Result<Catalog, CatalogError>) -> Self {
        match result {
            Ok(catalog) => CatalogUpdate::Loaded(catalog),
            Err(e) => CatalogUpdate::Failed(e.to_string()),
        }
    }
}

/// A stream of catalog snapshots
pub type CatalogStream = Pin<Box<dyn Stream<Item = CatalogUpdate> + Send>>;

/// Push-based supplier of catalog snapshots
///
/// Each item fully supersedes the previous one. Retrying failed fetches is
/// the source's own business.
pub trait CatalogSource: Send + Sync {
    fn updates(&self) -> CatalogStream;
}

/// Emits a fixed sequence of updates and then ends
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    updates: Vec<CatalogUpdate>,
}

impl StaticCatalogSource {
    pub fn new(updates: Vec<CatalogUpdate>) -> Self {
        Self { updates }
    }
}

impl CatalogSource for StaticCatalogSource {
    fn updates(&self) -> CatalogStream {
        Box::pin(futures::stream::iter(self.updates.clone()))
    }
}

/// Where a polling source loads its catalog from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    Url(String),
    File(PathBuf),
}

impl CatalogLocation {
    /// Interpret a command-line style argument as URL or file path
    pub fn parse(source: &str) -> Self {
        if is_url(source) {
            CatalogLocation::Url(source.to_string())
        } else {
            CatalogLocation::File(PathBuf::from(source))
        }
    }
}

/// Loads the catalog once immediately and then on every refresh interval
pub struct PollingCatalogSource {
    location: CatalogLocation,
    client: Arc<dyn HttpClient>,
    refresh_interval: Option<Duration>,
}

impl PollingCatalogSource {
    /// Create a source that loads exactly once
    pub fn new(location: CatalogLocation, client: Arc<dyn HttpClient>) -> Self {
        Self {
            location,
            client,
            refresh_interval: None,
        }
    }

    /// Keep reloading the catalog at the given interval
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

async fn load(location: &CatalogLocation, client: &dyn HttpClient) -> CatalogUpdate {
    let result = match location {
        CatalogLocation::Url(url) => fetch_catalog(client, url).await,
        CatalogLocation::File(path) => parse_catalog_file(path).await,
    };

    match &result {
        Ok(catalog) => debug!(offers = catalog.len(), "Catalog loaded"),
        Err(e) => warn!(error = %e, "Catalog load failed"),
    }

    result.into()
}

impl CatalogSource for PollingCatalogSource {
    fn updates(&self) -> CatalogStream {
        let location = self.location.clone();
        let client = self.client.clone();
        let refresh_interval = self.refresh_interval;

        Box::pin(futures::stream::unfold(true, move |first| {
            let location = location.clone();
            let client = client.clone();
            async move {
                if !first {
                    tokio::time::sleep(refresh_interval?).await;
                }
                let update = load(&location, client.as_ref()).await;
                Some((update, false))
            }
        }))
    }
}
