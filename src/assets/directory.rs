//! Local directory served as an asset store
//!
//! Object names are `/`-separated paths relative to the root directory.
//! Useful for offline deployments and for exercising the sync end to end.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::AssetStore;
use crate::errors::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct DirectoryAssetStore {
    root: PathBuf,
}

impl DirectoryAssetStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object name below the root, rejecting escapes
    fn resolve(&self, name: &str) -> SyncResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(SyncError::download(name, "invalid asset name"));
        }
        Ok(self.root.join(relative))
    }

    async fn collect_names(&self, recursive: bool) -> SyncResult<Vec<String>> {
        let mut names = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, relative)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && relative.is_empty() => {
                    debug!("Asset directory {:?} does not exist, listing is empty", dir);
                    return Ok(Vec::new());
                }
                Err(e) => {
                    return Err(SyncError::Listing {
                        message: format!("failed to read {dir:?}: {e}"),
                    });
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| SyncError::Listing {
                message: format!("failed to read {dir:?}: {e}"),
            })? {
                let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let name = if relative.is_empty() {
                    file_name
                } else {
                    format!("{relative}/{file_name}")
                };
                let file_type = entry.file_type().await.map_err(|e| SyncError::Listing {
                    message: format!("failed to stat {name}: {e}"),
                })?;

                if file_type.is_dir() {
                    if recursive {
                        pending.push((entry.path(), name));
                    }
                } else if file_type.is_file() {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl AssetStore for DirectoryAssetStore {
    async fn list(&self, prefix: &str, recursive: bool, limit: usize) -> SyncResult<Vec<String>> {
        let names = self.collect_names(recursive).await?;
        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .take(limit)
            .collect())
    }

    async fn get_content(&self, name: &str) -> SyncResult<Bytes> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| SyncError::download(name, e.to_string()))
    }
}
