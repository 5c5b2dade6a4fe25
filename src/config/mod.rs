use anyhow::{Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

/// Prefix for environment variable overrides, e.g. `LANGPACK_MARKETING__CLIENT_SECRET`
pub const ENV_PREFIX: &str = "LANGPACK_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub assets: AssetsConfig,
    pub mirror: MirrorConfig,
    pub state: StateConfig,
    pub marketing: MarketingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path segment the webhook routes are mounted under
    #[serde(default = "default_hook_path")]
    pub hook_path: String,
}

/// Where the language-pack assets are listed and fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// HTTP asset store base url; takes precedence over `directory`
    pub base_url: Option<String>,
    /// Local directory served as an asset store
    pub directory: Option<PathBuf>,
    #[serde(default = "default_asset_prefix")]
    pub prefix: String,
    #[serde(default = "default_asset_recursive")]
    pub recursive: bool,
    #[serde(default = "default_asset_list_limit")]
    pub list_limit: usize,
    #[serde(default = "default_asset_request_timeout", with = "duration")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_mirror_path")]
    pub path: PathBuf,
    #[serde(default = "default_sync_timeout", with = "duration")]
    pub sync_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

/// Marketing data store credentials and data-extension keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketingConfig {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Overrides `https://{subdomain}.auth.marketingcloudapis.com`
    pub auth_base_url: Option<String>,
    /// Overrides `https://{subdomain}.rest.marketingcloudapis.com`
    pub rest_base_url: Option<String>,
    #[serde(default = "default_token_timeout", with = "duration")]
    pub token_timeout: Duration,
    #[serde(default = "default_marketing_request_timeout", with = "duration")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub consent_key: String,
    #[serde(default)]
    pub feedback_key: String,
    #[serde(default)]
    pub tracking_key: String,
    /// Also upsert each phone number in its national-format variant when
    /// that differs from the number as sent
    #[serde(default)]
    pub double_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Inbound tracking events are forwarded here before the upsert;
    /// `{target}` is replaced by the path parameter of the request
    pub forward_url: Option<String>,
    /// Sender number -> market id used for the `MID` column
    #[serde(default = "default_sender_markets")]
    pub sender_markets: BTreeMap<String, String>,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_hook_path() -> String {
    DEFAULT_HOOK_PATH.to_string()
}

// Asset defaults
fn default_asset_prefix() -> String {
    DEFAULT_ASSET_PREFIX.to_string()
}

fn default_asset_recursive() -> bool {
    DEFAULT_ASSET_RECURSIVE
}

fn default_asset_list_limit() -> usize {
    DEFAULT_ASSET_LIST_LIMIT
}

fn default_asset_request_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_ASSET_REQUEST_TIMEOUT).unwrap_or(Duration::from_secs(30))
}

// Mirror defaults
fn default_mirror_path() -> PathBuf {
    PathBuf::from(DEFAULT_MIRROR_PATH)
}

fn default_sync_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_SYNC_TIMEOUT).unwrap_or(Duration::from_secs(60))
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

// Marketing defaults
fn default_token_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_TOKEN_TIMEOUT).unwrap_or(Duration::from_secs(30))
}

fn default_marketing_request_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_MARKETING_REQUEST_TIMEOUT)
        .unwrap_or(Duration::from_secs(30))
}

fn default_sender_markets() -> BTreeMap<String, String> {
    DEFAULT_SENDER_MARKETS
        .iter()
        .map(|(sender, market)| (sender.to_string(), market.to_string()))
        .collect()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            forward_url: None,
            sender_markets: default_sender_markets(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: default_host(),
                port: default_port(),
                hook_path: default_hook_path(),
            },
            assets: AssetsConfig {
                base_url: None,
                directory: Some(PathBuf::from(DEFAULT_ASSET_DIRECTORY)),
                prefix: default_asset_prefix(),
                recursive: default_asset_recursive(),
                list_limit: default_asset_list_limit(),
                request_timeout: default_asset_request_timeout(),
            },
            mirror: MirrorConfig {
                path: default_mirror_path(),
                sync_timeout: default_sync_timeout(),
            },
            state: StateConfig {
                path: default_state_path(),
            },
            marketing: MarketingConfig {
                subdomain: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                auth_base_url: None,
                rest_base_url: None,
                token_timeout: default_token_timeout(),
                request_timeout: default_marketing_request_timeout(),
                consent_key: String::new(),
                feedback_key: String::new(),
                tracking_key: String::new(),
                double_format: false,
            },
            tracking: TrackingConfig::default(),
        }
    }
}

impl MarketingConfig {
    pub fn auth_base_url(&self) -> String {
        self.auth_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.auth.marketingcloudapis.com", self.subdomain))
    }

    pub fn rest_base_url(&self) -> String {
        self.rest_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.rest.marketingcloudapis.com", self.subdomain))
    }
}

impl TrackingConfig {
    /// Market id for a sender number, `unmatched` when unknown
    pub fn market_for(&self, sender: &str) -> &str {
        self.sender_markets
            .get(sender)
            .map(String::as_str)
            .unwrap_or(UNMATCHED_MARKET)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Defaults, then the TOML file, then `LANGPACK_*` environment overrides.
    /// A missing file is created from the defaults.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.base_url.is_none() && self.assets.directory.is_none() {
            bail!("assets: either base_url or directory must be configured");
        }
        if self.assets.list_limit == 0 {
            bail!("assets: list_limit must be greater than zero");
        }
        if self.mirror.path.file_name().is_none() {
            bail!(
                "mirror: path {:?} must name a directory, not a filesystem root",
                self.mirror.path
            );
        }
        if self.web.hook_path.is_empty() || self.web.hook_path.contains('/') {
            bail!("web: hook_path must be a single non-empty path segment");
        }
        Ok(())
    }
}
