//! The Source Reader (spec §4.3, component C1): enumerates legacy
//! products from either a live query against the legacy store or a
//! pre-exported JSON snapshot, behind one deterministic-ordering read
//! contract, plus the legacy-store history lookups the History Gap
//! Filler (C5) needs.

mod history;
mod schema;
mod snapshot;
mod store;

pub use history::{LegacySourceHistoryStore, PgSourceHistoryStore};
pub use snapshot::SnapshotSourceReader;
pub use store::{build_legacy_pool, LegacyPool, LegacyPoolError, StoreSourceReader};

use async_trait::async_trait;
use migration_types::{MigrationResult, SourceProduct};
use std::path::Path;
use std::sync::Arc;

/// The uniform read contract both source backends satisfy (spec §4.3).
/// `read`/`count` must agree on a single deterministic ordering so that
/// `[startOffset, endOffset)` chunk windows mean the same thing across
/// every worker that calls them.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn count(&self) -> MigrationResult<u64>;
    async fn read(&self, skip: u64, take: u64) -> MigrationResult<Vec<SourceProduct>>;
}

/// Pick a backend by presence of the snapshot file (spec §4.3: "Selection
/// is by presence of the snapshot file").
pub async fn build_source_reader(
    snapshot_path: &Path,
    legacy_pool: LegacyPool,
) -> MigrationResult<Arc<dyn SourceReader>> {
    if snapshot_path.exists() {
        tracing::info!(path = %snapshot_path.display(), "using snapshot source backend");
        Ok(Arc::new(SnapshotSourceReader::load(snapshot_path).await?))
    } else {
        tracing::info!("snapshot file absent; using live legacy-store source backend");
        Ok(Arc::new(StoreSourceReader::new(legacy_pool)))
    }
}
