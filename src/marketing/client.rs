//! HTTP client for the marketing cloud auth and data-extension APIs

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use super::token::{TokenExchanger, TokenGrant};
use crate::config::MarketingConfig;
use crate::errors::{AppError, AppResult, AuthError, AuthResult, UpsertError};

const GRANT_TYPE: &str = "client_credentials";

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
}

#[derive(Serialize)]
struct UpsertBody<'a, T> {
    items: &'a [T],
}

#[derive(Debug, Clone)]
pub struct MarketingClient {
    client: Client,
    auth_base_url: String,
    rest_base_url: String,
    client_id: String,
    client_secret: String,
}

impl MarketingClient {
    pub fn new(config: &MarketingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            auth_base_url: config.auth_base_url().trim_end_matches('/').to_string(),
            rest_base_url: config.rest_base_url().trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Upsert rows into the data extension identified by `external_key`
    pub async fn upsert_rows<T>(
        &self,
        access_token: &str,
        external_key: &str,
        rows: &[T],
    ) -> Result<Value, UpsertError>
    where
        T: Serialize + Sync,
    {
        let url = format!(
            "{}/data/v1/async/dataextensions/key:{}/rows",
            self.rest_base_url, external_key
        );
        debug!("Upserting {} rows into data extension {}", rows.len(), external_key);

        let response = self
            .client
            .put(&url)
            .bearer_auth(access_token)
            .json(&UpsertBody { items: rows })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response_message(response).await;
            error!(
                "Upsert into {} rejected with HTTP {}: {}",
                external_key,
                status.as_u16(),
                message
            );
            return Err(UpsertError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
        debug!("Upsert response: {}", parsed);
        Ok(parsed)
    }
}

#[async_trait]
impl TokenExchanger for MarketingClient {
    async fn exchange(&self) -> AuthResult<TokenGrant> {
        let url = format!("{}/v2/token", self.auth_base_url);
        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                grant_type: GRANT_TYPE,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: response_message(response).await,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AuthError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

async fn response_message(response: Response) -> String {
    match response.text().await {
        Ok(text) if !text.is_empty() => text,
        _ => "Unknown error".to_string(),
    }
}
