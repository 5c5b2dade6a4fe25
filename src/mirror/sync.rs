//! Mirror synchronisation
//!
//! `AssetSyncCache::ensure_synced` compares the remote listing against the
//! local mirror by name and count, and rebuilds the mirror when they differ.
//! Syncs are serialised: concurrent callers queue on one mutex and re-check
//! staleness once they hold it, so a burst of requests resyncs at most once.
//!
//! Readers of the mirror hold `read_gate()` while they read; the directory
//! swap at the end of a resync takes the write side, so nobody ever reads a
//! half-swapped mirror.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use super::store::{LocalMirror, StagedMirror};
use crate::assets::{AssetStore, RemoteAsset, filter_data_assets, is_stale};
use crate::config::{AssetsConfig, MirrorConfig};
use crate::errors::{SyncError, SyncResult};
use crate::utils::DecompressionService;

/// Listing parameters and time bound of a sync
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub prefix: String,
    pub recursive: bool,
    pub limit: usize,
    pub timeout: Duration,
}

impl SyncSettings {
    pub fn from_config(assets: &AssetsConfig, mirror: &MirrorConfig) -> Self {
        Self {
            prefix: assets.prefix.clone(),
            recursive: assets.recursive,
            limit: assets.list_limit,
            timeout: mirror.sync_timeout,
        }
    }
}

/// Result of one `ensure_synced` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Whether the mirror was rebuilt
    pub resynced: bool,
    /// Number of data assets in the remote listing
    pub files: usize,
}

pub struct AssetSyncCache {
    store: Arc<dyn AssetStore>,
    mirror: LocalMirror,
    settings: SyncSettings,
    sync_lock: Mutex<()>,
    gate: RwLock<()>,
}

impl AssetSyncCache {
    pub fn new(store: Arc<dyn AssetStore>, mirror: LocalMirror, settings: SyncSettings) -> Self {
        Self {
            store,
            mirror,
            settings,
            sync_lock: Mutex::new(()),
            gate: RwLock::new(()),
        }
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    /// Shared access to the mirror content; blocks while a swap is in progress
    pub async fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    /// Bring the mirror in line with the remote listing.
    ///
    /// Waiting for the lock, listing and downloading all count against the
    /// configured timeout. The final directory swap does not: once staged
    /// content is complete it is always committed or rolled back.
    pub async fn ensure_synced(&self) -> SyncResult<SyncOutcome> {
        let after = self.settings.timeout;
        let deadline = Instant::now() + after;

        let _guard = timeout_at(deadline, self.sync_lock.lock())
            .await
            .map_err(|_| {
                warn!("Timed out waiting for in-flight mirror sync");
                SyncError::Timeout { after }
            })?;

        let prepared = timeout_at(deadline, self.prepare()).await.map_err(|_| {
            warn!("Mirror sync timed out after {}", humantime::format_duration(after));
            SyncError::Timeout { after }
        })??;

        let files = prepared.files;
        let Some(staged) = prepared.staged else {
            debug!("Mirror is fresh ({} files)", files);
            return Ok(SyncOutcome {
                resynced: false,
                files,
            });
        };

        {
            let _write = self.gate.write().await;
            staged
                .commit()
                .await
                .map_err(|e| SyncError::filesystem(self.mirror.root(), e))?;
        }

        info!(files = files, "Mirror resynced into {:?}", self.mirror.root());
        Ok(SyncOutcome {
            resynced: true,
            files,
        })
    }

    async fn prepare(&self) -> SyncResult<Prepared> {
        let root = self.mirror.root();
        self.mirror
            .ensure_exists()
            .await
            .map_err(|e| SyncError::filesystem(root, e))?;

        match self.mirror.remove_leftovers().await {
            Ok(0) => {}
            Ok(n) => debug!("Removed {} leftover staging directories", n),
            Err(e) => warn!("Failed to sweep leftover staging directories: {}", e),
        }

        let names = self
            .store
            .list(
                &self.settings.prefix,
                self.settings.recursive,
                self.settings.limit,
            )
            .await?;
        let remote = filter_data_assets(names);

        let local = self
            .mirror
            .base_names()
            .await
            .map_err(|e| SyncError::filesystem(root, e))?;

        if !is_stale(&remote, &local) {
            return Ok(Prepared {
                files: remote.len(),
                staged: None,
            });
        }

        info!(
            remote = remote.len(),
            local = local.len(),
            "Mirror is stale, resyncing"
        );

        let staged = self
            .mirror
            .stage()
            .await
            .map_err(|e| SyncError::filesystem(root, e))?;

        match self.populate(&staged, &remote).await {
            Ok(()) => Ok(Prepared {
                files: remote.len(),
                staged: Some(staged),
            }),
            Err(e) => {
                staged.abandon().await;
                Err(e)
            }
        }
    }

    async fn populate(&self, staged: &StagedMirror, remote: &[RemoteAsset]) -> SyncResult<()> {
        for asset in remote {
            let content = self.store.get_content(&asset.name).await?;
            let fetched = content.len();
            if !DecompressionService::matches_declared_kind(asset.kind, &content) {
                warn!(
                    asset = %asset.name,
                    "Asset content does not match its {:?} suffix",
                    asset.kind
                );
            }
            let decoded = DecompressionService::decompress_asset(asset.kind, content).map_err(
                |e| SyncError::Decompress {
                    asset: asset.name.clone(),
                    message: format!("{e:#}"),
                },
            )?;

            let path = staged
                .write(&asset.base_name(), &decoded)
                .await
                .map_err(|e| SyncError::filesystem(staged.path(), e))?;
            debug!(
                asset = %asset.name,
                "Mirrored {} bytes ({} decoded) to {:?}",
                fetched,
                decoded.len(),
                path
            );
        }
        Ok(())
    }
}

struct Prepared {
    files: usize,
    staged: Option<StagedMirror>,
}
