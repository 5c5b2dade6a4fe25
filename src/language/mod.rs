//! Phone-to-language lookups over the mirrored language pack
//!
//! Every lookup brings the mirror up to date, rebuilds the merged table from
//! the files on disk and answers from that. Nothing is cached between
//! requests, so a lookup always reflects the mirror as of that request.

use std::sync::Arc;

use tracing::debug;

use crate::errors::AppResult;
use crate::mirror::AssetSyncCache;

pub mod lookup;
pub mod merge;

pub use lookup::{LanguageAnswer, LookupFormat, LookupResponse, LookupService, NOT_FOUND};
pub use merge::{CsvMergeEngine, DELIMITER, MergedTable};

#[derive(Clone)]
pub struct LanguagePackService {
    sync: Arc<AssetSyncCache>,
}

impl LanguagePackService {
    pub fn new(sync: Arc<AssetSyncCache>) -> Self {
        Self { sync }
    }

    /// Sync, merge, then answer one query
    pub async fn lookup(&self, phone: Option<&str>, format: LookupFormat) -> AppResult<LookupResponse> {
        let outcome = self.sync.ensure_synced().await?;
        if outcome.resynced {
            debug!(files = outcome.files, "Serving lookup from freshly synced mirror");
        }

        let table = {
            let _read = self.sync.read_gate().await;
            CsvMergeEngine::build_table(self.sync.mirror()).await?
        };
        Ok(LookupService::query(&table, phone, format))
    }
}
