/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOOK_PATH: &str = "p4fVCqqbXrYu9RTOl9ZBdq";

// Asset store defaults
pub const DEFAULT_ASSET_DIRECTORY: &str = "./data/assets";
pub const DEFAULT_ASSET_PREFIX: &str = "";
pub const DEFAULT_ASSET_RECURSIVE: bool = true;
pub const DEFAULT_ASSET_LIST_LIMIT: usize = 50;
pub const DEFAULT_ASSET_REQUEST_TIMEOUT: &str = "30s";

// Mirror defaults
pub const DEFAULT_MIRROR_PATH: &str = "./data/language";
pub const DEFAULT_SYNC_TIMEOUT: &str = "1m";

// Instance state defaults
pub const DEFAULT_STATE_PATH: &str = "./data/instance-state.json";

// Marketing API defaults
pub const DEFAULT_TOKEN_TIMEOUT: &str = "30s";
pub const DEFAULT_MARKETING_REQUEST_TIMEOUT: &str = "30s";

// Tracking defaults: sender number -> market id
pub const DEFAULT_SENDER_MARKETS: &[(&str, &str)] =
    &[("966544259926", "KSA"), ("5511992007729", "BR")];
pub const UNMATCHED_MARKET: &str = "unmatched";
