//! Bearer token cache for the marketing APIs
//!
//! The token and its expiry live in the instance-state store, so they
//! survive restarts and are shared by every request. Refreshes are
//! single-flight: callers that find the token expired queue on one lock,
//! and whoever gets it second sees the freshly stored token instead of
//! exchanging again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{AuthError, AuthResult};
use crate::state::{STORED_ACCESS_TOKEN, STORED_EXPIRY_TIME, StateStore};

/// Source of the current time in whole seconds since the epoch
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Successful client-credentials exchange
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self) -> AuthResult<TokenGrant>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: i64,
}

impl CachedToken {
    /// A token whose expiry equals `now` is already expired
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

pub struct TokenCache {
    state: Arc<dyn StateStore>,
    exchanger: Arc<dyn TokenExchanger>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    pub fn new(
        state: Arc<dyn StateStore>,
        exchanger: Arc<dyn TokenExchanger>,
        timeout: Duration,
    ) -> Self {
        Self {
            state,
            exchanger,
            clock: Arc::new(SystemClock),
            timeout,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Return the stored token while it is valid, otherwise exchange for a
    /// new one and store it. A failed exchange leaves the stored slot as is.
    pub async fn get_token(&self) -> AuthResult<String> {
        if let Some(token) = self.valid_token().await? {
            return Ok(token.value);
        }

        let _refresh = self.refresh_lock.lock().await;
        if let Some(token) = self.valid_token().await? {
            debug!("Access token was refreshed by a concurrent request");
            return Ok(token.value);
        }

        let now = self.clock.now_secs();
        let grant = tokio::time::timeout(self.timeout, self.exchanger.exchange())
            .await
            .map_err(|_| AuthError::Timeout {
                after: self.timeout,
            })?
            .inspect_err(|e| warn!("Access token exchange failed: {}", e))?;

        if grant.expires_in <= 0 {
            return Err(AuthError::InvalidResponse {
                message: format!("non-positive expires_in: {}", grant.expires_in),
            });
        }
        let expires_at = now.saturating_add(grant.expires_in);

        // The expiry is written last: it is what marks the stored token valid
        self.state
            .set(STORED_ACCESS_TOKEN, json!(grant.access_token))
            .await?;
        self.state.set(STORED_EXPIRY_TIME, json!(expires_at)).await?;

        info!(
            expires_in = grant.expires_in,
            "Obtained new marketing API access token"
        );
        Ok(grant.access_token)
    }

    /// The stored token and expiry, if both are present
    pub async fn cached(&self) -> AuthResult<Option<CachedToken>> {
        let value = self.state.get(STORED_ACCESS_TOKEN).await?;
        let expires_at = self.state.get(STORED_EXPIRY_TIME).await?;

        let value = match value {
            Some(Value::String(value)) => value,
            _ => return Ok(None),
        };
        let Some(expires_at) = expires_at.as_ref().and_then(epoch_seconds) else {
            return Ok(None);
        };
        Ok(Some(CachedToken { value, expires_at }))
    }

    async fn valid_token(&self) -> AuthResult<Option<CachedToken>> {
        let now = self.clock.now_secs();
        Ok(self.cached().await?.filter(|token| token.is_valid_at(now)))
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs as i64))
}
