//! Error type definitions for the language-pack service
//!
//! Each layer owns a focused error enum; `AppError` aggregates them so the
//! web layer can map any failure onto a response in one place.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Mirror synchronisation failures
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Tabular merge failures
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Token exchange failures
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Downstream row upsert failures
    #[error("Upsert error: {0}")]
    Upsert(#[from] UpsertError),

    /// Instance-state store failures
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Failures while reconciling the local mirror with the remote asset store
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote listing call failed
    #[error("Asset listing failed: {message}")]
    Listing { message: String },

    /// Fetching a single asset failed
    #[error("Download failed for {asset}: {message}")]
    Download { asset: String, message: String },

    /// A compressed asset could not be decoded
    #[error("Decompression failed for {asset}: {message}")]
    Decompress { asset: String, message: String },

    /// Local mirror filesystem operation failed
    #[error("Mirror filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sync did not finish in time
    #[error("Sync timed out after {}", humantime::format_duration(*after))]
    Timeout { after: Duration },
}

/// Failures while merging mirrored files into one table
#[derive(Error, Debug)]
pub enum MergeError {
    /// A mirrored file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The merged text is not valid delimited data
    #[error("Malformed tabular data on line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Failures while obtaining a bearer token
#[derive(Error, Debug)]
pub enum AuthError {
    /// The auth endpoint rejected the exchange
    #[error("Token exchange rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// The auth endpoint answered with an unexpected body
    #[error("Invalid token response: {message}")]
    InvalidResponse { message: String },

    /// Transport failure talking to the auth endpoint
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The exchange did not finish in time
    #[error("Token exchange timed out after {}", humantime::format_duration(*after))]
    Timeout { after: Duration },

    /// The token slot could not be read or written
    #[error("Token state unavailable: {0}")]
    State(#[from] StateError),
}

/// Failures while pushing rows to the downstream data store
#[derive(Error, Debug)]
pub enum UpsertError {
    /// Non-success response from the upsert endpoint
    #[error("Upsert rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Transport failure talking to the upsert endpoint
    #[error("Upsert request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Failures of the durable instance-state store
#[derive(Error, Debug)]
pub enum StateError {
    /// Backing file could not be read or written
    #[error("State file error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file does not contain a JSON object
    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl SyncError {
    pub fn filesystem<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn download<A: Into<String>, M: Into<String>>(asset: A, message: M) -> Self {
        Self::Download {
            asset: asset.into(),
            message: message.into(),
        }
    }
}

impl MergeError {
    pub fn malformed<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }
}
