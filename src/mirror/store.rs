//! On-disk mirror of the language-pack assets
//!
//! The mirror is a single directory holding one decompressed `.csv` file per
//! remote asset basename. A resync never edits it in place: new content is
//! written to a sibling staging directory that replaces the live one only
//! once every asset has been written.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Extension every mirrored file is written with, whatever the remote encoding
pub const MIRROR_EXTENSION: &str = "csv";

const STAGING_TAG: &str = "staging";
const RETIRED_TAG: &str = "old";

/// One file of the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub base_name: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_exists(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Every regular file in the mirror, sorted by file name.
    /// A mirror directory that does not exist yet is empty.
    pub async fn entries(&self) -> io::Result<Vec<MirrorEntry>> {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(base_name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            entries.push(MirrorEntry {
                base_name: base_name.to_string(),
                local_path: path.clone(),
            });
        }

        entries.sort_by(|a, b| a.local_path.cmp(&b.local_path));
        Ok(entries)
    }

    /// Mirrored `.csv` files in deterministic (file name) order
    pub async fn csv_entries(&self) -> io::Result<Vec<MirrorEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| {
                entry.local_path.extension().and_then(|e| e.to_str()) == Some(MIRROR_EXTENSION)
            })
            .collect())
    }

    pub async fn base_names(&self) -> io::Result<Vec<String>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|entry| entry.base_name)
            .collect())
    }

    /// Open a fresh staging directory next to the mirror
    pub async fn stage(&self) -> io::Result<StagedMirror> {
        let staging = self.sibling(STAGING_TAG)?;
        tokio::fs::create_dir_all(&staging).await?;
        debug!("Staging mirror update in {:?}", staging);
        Ok(StagedMirror {
            target: self.root.clone(),
            staging,
        })
    }

    /// Remove staging/retired siblings left behind by an interrupted sync
    pub async fn remove_leftovers(&self) -> io::Result<usize> {
        let (Some(parent), Some(prefix)) = (self.parent_dir(), self.leftover_prefix()) else {
            return Ok(0);
        };

        let mut read_dir = match tokio::fs::read_dir(&parent).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_leftover = [STAGING_TAG, RETIRED_TAG]
                .iter()
                .any(|tag| name.starts_with(&format!("{prefix}{tag}-")));
            if is_leftover && entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn parent_dir(&self) -> Option<PathBuf> {
        let parent = self.root.parent()?;
        Some(if parent.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            parent.to_path_buf()
        })
    }

    fn leftover_prefix(&self) -> Option<String> {
        let name = self.root.file_name()?.to_str()?;
        Some(format!(".{name}."))
    }

    /// `<parent>/.<name>.<tag>-<uuid>`
    fn sibling(&self, tag: &str) -> io::Result<PathBuf> {
        let prefix = self.leftover_prefix().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("mirror path {:?} has no directory name", self.root),
            )
        })?;
        Ok(self
            .root
            .with_file_name(format!("{prefix}{tag}-{}", Uuid::new_v4().simple())))
    }
}

/// A mirror update being assembled next to the live directory
#[derive(Debug)]
pub struct StagedMirror {
    target: PathBuf,
    staging: PathBuf,
}

impl StagedMirror {
    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// Write `<base_name>.csv` into the staging directory
    pub async fn write(&self, base_name: &str, content: &[u8]) -> io::Result<PathBuf> {
        let path = self
            .staging
            .join(format!("{base_name}.{MIRROR_EXTENSION}"));
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    /// Swap the staged directory into place of the live mirror
    pub async fn commit(self) -> io::Result<()> {
        let retired = self.target.with_file_name(
            self.staging
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.replacen(STAGING_TAG, RETIRED_TAG, 1))
                .unwrap_or_else(|| format!("{RETIRED_TAG}-{}", Uuid::new_v4().simple())),
        );

        let had_live = match tokio::fs::rename(&self.target, &retired).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                self.abandon().await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&self.staging, &self.target).await {
            if had_live && let Err(restore) = tokio::fs::rename(&retired, &self.target).await {
                warn!(
                    "Failed to restore previous mirror {:?} from {:?}: {}",
                    self.target, retired, restore
                );
            }
            self.abandon().await;
            return Err(e);
        }

        if had_live && let Err(e) = tokio::fs::remove_dir_all(&retired).await {
            warn!("Failed to remove retired mirror {:?}: {}", retired, e);
        }
        Ok(())
    }

    /// Drop the staged content, leaving the live mirror untouched
    pub async fn abandon(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.staging).await
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove staging directory {:?}: {}", self.staging, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mirror_in(dir: &TempDir) -> LocalMirror {
        LocalMirror::new(dir.path().join("language"))
    }

    #[tokio::test]
    async fn test_missing_mirror_is_empty() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_in(&dir);
        assert!(mirror.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entries_sorted_with_stems() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_in(&dir);
        mirror.ensure_exists().await.unwrap();
        std::fs::write(mirror.root().join("fr.csv"), "x").unwrap();
        std::fs::write(mirror.root().join("en.csv"), "x").unwrap();
        std::fs::write(mirror.root().join("stray.tmp"), "x").unwrap();

        assert_eq!(
            mirror.base_names().await.unwrap(),
            vec!["en", "fr", "stray"]
        );
        let csv: Vec<_> = mirror
            .csv_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.base_name)
            .collect();
        assert_eq!(csv, vec!["en", "fr"]);
    }

    #[tokio::test]
    async fn test_commit_replaces_live_mirror() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_in(&dir);
        mirror.ensure_exists().await.unwrap();
        std::fs::write(mirror.root().join("old.csv"), "stale").unwrap();

        let staged = mirror.stage().await.unwrap();
        staged.write("en", b"Phone|Lang\n").await.unwrap();
        staged.commit().await.unwrap();

        assert_eq!(mirror.base_names().await.unwrap(), vec!["en"]);
        // Only the live mirror remains next to it
        let siblings: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_without_previous_mirror() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_in(&dir);

        let staged = mirror.stage().await.unwrap();
        staged.write("en", b"Phone|Lang\n").await.unwrap();
        staged.commit().await.unwrap();

        assert_eq!(mirror.base_names().await.unwrap(), vec!["en"]);
    }

    #[tokio::test]
    async fn test_abandon_keeps_live_mirror() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_in(&dir);
        mirror.ensure_exists().await.unwrap();
        std::fs::write(mirror.root().join("en.csv"), "keep").unwrap();

        let staged = mirror.stage().await.unwrap();
        staged.write("fr", b"partial").await.unwrap();
        let staging_path = staged.path().to_path_buf();
        staged.abandon().await;

        assert!(!staging_path.exists());
        assert_eq!(mirror.base_names().await.unwrap(), vec!["en"]);
    }

    #[tokio::test]
    async fn test_remove_leftovers() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_in(&dir);
        mirror.ensure_exists().await.unwrap();

        let staged = mirror.stage().await.unwrap();
        staged.write("en", b"x").await.unwrap();
        std::mem::forget(staged);
        std::fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        assert_eq!(mirror.remove_leftovers().await.unwrap(), 1);
        assert!(dir.path().join("unrelated").exists());
        assert!(mirror.root().exists());
    }
}
