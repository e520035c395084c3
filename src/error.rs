// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing an offer catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to fetch catalog from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read catalog file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog JSON: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors that can occur when reading or writing the selection preference
#[derive(Error, Debug)]
pub enum PreferenceError {
    #[error("Failed to read preference file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write preference file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse preference JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize preferences: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors raised by a billing backend when handing off a purchase
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Billing flow could not be launched for {product_id}: {reason}")]
    LaunchFailed { product_id: String, reason: String },
}

/// Errors returned to callers of a running upgrade session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Upgrade session has been closed")]
    Closed,

    #[error("A purchase is already in progress")]
    PurchaseInProgress,
}
