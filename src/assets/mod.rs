//! Remote asset store abstraction
//!
//! The language pack is published as `.csv` / `.gz` objects in a remote
//! store. This module defines the store contract consumed by the mirror sync
//! and the listing-side helpers (suffix filtering, basename derivation).

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::SyncResult;

pub mod directory;
pub mod http;

pub use directory::DirectoryAssetStore;
pub use http::HttpAssetStore;

/// Content encoding of a remote asset, derived from its name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Csv,
    Gzip,
}

impl AssetKind {
    /// `None` for names that are not language-pack data
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".csv") {
            Some(Self::Csv)
        } else if name.ends_with(".gz") {
            Some(Self::Gzip)
        } else {
            None
        }
    }
}

/// One entry of a store listing as returned on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub name: String,
}

/// A data asset selected from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    pub name: String,
    pub kind: AssetKind,
}

impl RemoteAsset {
    pub fn from_name<S: Into<String>>(name: S) -> Option<Self> {
        let name = name.into();
        AssetKind::from_name(&name).map(|kind| Self { name, kind })
    }

    /// File name without directories and without its last extension
    pub fn base_name(&self) -> String {
        base_name(&self.name)
    }
}

/// `dir/fr.csv.gz` -> `fr.csv`, `en.csv` -> `en`
pub fn base_name(name: &str) -> String {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Keep only names with a recognised data suffix, preserving listing order
pub fn filter_data_assets<I, S>(names: I) -> Vec<RemoteAsset>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().filter_map(RemoteAsset::from_name).collect()
}

/// Name-and-count staleness heuristic.
///
/// The mirror is stale when any remote basename is missing locally or the
/// number of local files differs from the number of remote data assets.
/// Content changes under an unchanged name are not detected.
pub fn is_stale(remote: &[RemoteAsset], local_base_names: &[String]) -> bool {
    let local: HashSet<&str> = local_base_names.iter().map(String::as_str).collect();
    let any_missing = remote
        .iter()
        .any(|asset| !local.contains(asset.base_name().as_str()));
    any_missing || local_base_names.len() != remote.len()
}

/// Remote object store holding the language-pack assets
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// List object names under `prefix`, at most `limit` of them
    async fn list(&self, prefix: &str, recursive: bool, limit: usize) -> SyncResult<Vec<String>>;

    /// Fetch the full content of one object
    async fn get_content(&self, name: &str) -> SyncResult<Bytes>;
}
