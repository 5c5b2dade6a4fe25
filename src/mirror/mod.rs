//! Local mirror of the remote language-pack assets
//!
//! - [`store`]: the on-disk directory and its staged replacement
//! - [`sync`]: reconciliation against the remote listing

pub mod store;
pub mod sync;

pub use store::{LocalMirror, MIRROR_EXTENSION, MirrorEntry, StagedMirror};
pub use sync::{AssetSyncCache, SyncOutcome, SyncSettings};
