//! Marketing cloud integration: consent, feedback and message-tracking
//! webhooks upserted as data-extension rows.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{MarketingConfig, TrackingConfig};
use crate::errors::{AppError, AppResult};
use crate::state::StateStore;
use crate::utils::DateTimeParser;

pub mod client;
pub mod rows;
pub mod token;

pub use client::MarketingClient;
pub use rows::{ConsentRow, FeedbackRow, TrackingRow};
pub use token::{CachedToken, Clock, SystemClock, TokenCache, TokenExchanger, TokenGrant};

/// Placeholder in `tracking.forward_url` replaced by the request's target
pub const FORWARD_TARGET_PLACEHOLDER: &str = "{target}";

#[derive(Debug, Clone)]
struct ExtensionKeys {
    consent: String,
    feedback: String,
    tracking: String,
}

#[derive(Clone)]
pub struct MarketingService {
    client: MarketingClient,
    tokens: Arc<TokenCache>,
    keys: ExtensionKeys,
    tracking: TrackingConfig,
    double_format: bool,
    forwarder: reqwest::Client,
}

impl MarketingService {
    pub fn new(
        marketing: &MarketingConfig,
        tracking: &TrackingConfig,
        state: Arc<dyn StateStore>,
    ) -> AppResult<Self> {
        let client = MarketingClient::new(marketing)?;
        let tokens = TokenCache::new(state, Arc::new(client.clone()), marketing.token_timeout);
        Self::with_tokens(client, Arc::new(tokens), marketing, tracking)
    }

    pub fn with_tokens(
        client: MarketingClient,
        tokens: Arc<TokenCache>,
        marketing: &MarketingConfig,
        tracking: &TrackingConfig,
    ) -> AppResult<Self> {
        let forwarder = reqwest::Client::builder()
            .timeout(marketing.request_timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            tokens,
            keys: ExtensionKeys {
                consent: marketing.consent_key.clone(),
                feedback: marketing.feedback_key.clone(),
                tracking: marketing.tracking_key.clone(),
            },
            tracking: tracking.clone(),
            double_format: marketing.double_format,
            forwarder,
        })
    }

    pub async fn submit_consent(&self, body: &Value) -> AppResult<()> {
        let rows = rows::consent_rows(body, &DateTimeParser::now_for_upsert(), self.double_format)?;
        self.upsert(&self.keys.consent, &rows).await
    }

    pub async fn submit_feedback(&self, body: &Value) -> AppResult<()> {
        let rows = rows::feedback_rows(body, &DateTimeParser::now_for_upsert(), self.double_format)?;
        self.upsert(&self.keys.feedback, &rows).await
    }

    pub async fn submit_tracking(&self, body: &Value) -> AppResult<()> {
        let rows = rows::tracking_rows(
            body,
            &DateTimeParser::now_for_upsert(),
            &self.tracking,
            self.double_format,
        )?;
        self.upsert(&self.keys.tracking, &rows).await
    }

    /// Upsert a JSON array of tracking events as one batch
    pub async fn submit_bulk_tracking(&self, body: &Value) -> AppResult<usize> {
        let items = body
            .as_array()
            .ok_or_else(|| AppError::validation("expected an array of tracking items"))?;

        let rows = rows::bulk_tracking_rows(items, &self.tracking, self.double_format);
        info!("Bulk tracking import: {} rows from {} items", rows.len(), items.len());
        if rows.is_empty() {
            return Ok(0);
        }

        self.upsert(&self.keys.tracking, &rows).await?;
        Ok(rows.len())
    }

    /// Relay an inbound tracking event to the configured forward target.
    /// Failures are logged and never fail the request.
    pub async fn forward_event(&self, target: &str, headers: &HeaderMap, body: Bytes) {
        let Some(template) = self.tracking.forward_url.as_deref() else {
            return;
        };
        let url = template.replace(FORWARD_TARGET_PLACEHOLDER, target);

        let response = self
            .forwarder
            .post(&url)
            .headers(forwarded_headers(headers))
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!("Forwarded tracking event to {}", url);
            }
            Ok(response) => warn!(
                "Forward target {} answered HTTP {}",
                url,
                response.status().as_u16()
            ),
            Err(e) => warn!("Failed to forward tracking event to {}: {}", url, e),
        }
    }

    async fn upsert<T>(&self, external_key: &str, rows: &[T]) -> AppResult<()>
    where
        T: Serialize + Sync,
    {
        let token = self.tokens.get_token().await?;
        self.client.upsert_rows(&token, external_key, rows).await?;
        Ok(())
    }
}

/// Inbound headers minus the hop-specific ones
fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in [HOST, CONTENT_LENGTH, CONNECTION] {
        forwarded.remove(name);
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_headers_drop_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("authorization", HeaderValue::from_static("Bearer inbound"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let forwarded = forwarded_headers(&headers);
        assert_eq!(forwarded.len(), 2);
        assert!(forwarded.get(HOST).is_none());
        assert_eq!(forwarded["authorization"], "Bearer inbound");
    }
}
