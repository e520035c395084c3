// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;
use url::Url;

use crate::error::CatalogError;
use crate::http::HttpClient;

use super::offer::Catalog;
use super::parse::parse_catalog;

/// Fetch raw catalog bytes from a URL (without parsing)
pub async fn fetch_catalog_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, CatalogError> {
    let response = client
        .get(url)
        .await
        .map_err(|e| CatalogError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(CatalogError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}

/// Read raw catalog bytes from a local file (without parsing)
pub async fn read_catalog_file(path: &Path) -> Result<Vec<u8>, CatalogError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| CatalogError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Fetch and parse an offer catalog from a URL
pub async fn fetch_catalog<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Catalog, CatalogError> {
    Url::parse(url)?;
    let bytes = fetch_catalog_bytes(client, url).await?;
    parse_catalog(&bytes)
}

/// Parse an offer catalog from a local file
pub async fn parse_catalog_file(path: &Path) -> Result<Catalog, CatalogError> {
    let bytes = read_catalog_file(path).await?;
    parse_catalog(&bytes)
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::http::HttpResponse;
    use async_trait::async_trait;
    use tempfile::tempdir;

    const ONE_OFFER: &str = r#"{"products":[{"product_id":"com.pocketcasts.plus.yearly","offers":[
        {"offer_token":"t","pricing_phases":[{"formatted_price":"$39.99","price_amount_micros":39990000,"currency_code":"USD","billing_period":"P1Y"}]}
    ]}]}"#;

    struct MockHttpClient {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            Ok(HttpResponse {
                status: self.status,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    #[test]
    fn is_url_detects_http() {
        assert!(is_url("http://example.com/catalog.json"));
        assert!(is_url("https://example.com/catalog.json"));
    }

    #[test]
    fn is_url_rejects_file_paths() {
        assert!(!is_url("/path/to/catalog.json"));
        assert!(!is_url("./catalog.json"));
        assert!(!is_url("catalog.json"));
    }

    #[tokio::test]
    async fn fetch_catalog_parses_response() {
        let client = MockHttpClient {
            status: 200,
            body: ONE_OFFER,
        };

        let catalog = fetch_catalog(&client, "https://example.com/catalog.json")
            .await
            .unwrap();

        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn fetch_catalog_rejects_error_status() {
        let client = MockHttpClient {
            status: 503,
            body: "",
        };

        let result = fetch_catalog(&client, "https://example.com/catalog.json").await;

        assert!(matches!(
            result,
            Err(CatalogError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn fetch_catalog_rejects_invalid_url() {
        let client = MockHttpClient {
            status: 200,
            body: ONE_OFFER,
        };

        let result = fetch_catalog(&client, "not a url").await;

        assert!(matches!(result, Err(CatalogError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn parse_catalog_file_reads_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, ONE_OFFER).unwrap();

        let catalog = parse_catalog_file(&path).await.unwrap();

        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = parse_catalog_file(&dir.path().join("missing.json")).await;

        assert!(matches!(result, Err(CatalogError::FileReadFailed { .. })));
    }
}
