//! HTTP asset store client
//!
//! `GET {base}/assets?prefix=..&recursive=..&limit=..` returns a JSON array of
//! `{ "name": ... }` objects; `GET {base}/assets/{name}` returns the raw bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{AssetEntry, AssetStore};
use crate::errors::{AppError, AppResult, SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    client: Client,
    base_url: Url,
}

impl HttpAssetStore {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::configuration(format!("invalid asset base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::configuration(format!(
                "asset base url '{base_url}' cannot be a base"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// `{base}/assets/<segments...>`
    fn asset_url<'a, I>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("assets").extend(segments);
        }
        url
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn list(&self, prefix: &str, recursive: bool, limit: usize) -> SyncResult<Vec<String>> {
        let url = self.asset_url(std::iter::empty());
        debug!("Listing assets from {} (prefix='{}')", url, prefix);

        let response = self
            .client
            .get(url)
            .query(&[
                ("prefix", prefix.to_string()),
                ("recursive", recursive.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Listing {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Listing {
                message: format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let entries: Vec<AssetEntry> = response.json().await.map_err(|e| SyncError::Listing {
            message: format!("invalid listing body: {e}"),
        })?;
        Ok(entries.into_iter().take(limit).map(|entry| entry.name).collect())
    }

    async fn get_content(&self, name: &str) -> SyncResult<Bytes> {
        let url = self.asset_url(name.split('/'));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::download(name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::download(
                name,
                format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::download(name, format!("failed to read body: {e}")))?;
        debug!("Fetched {} bytes for asset {}", bytes.len(), name);
        Ok(bytes)
    }
}
