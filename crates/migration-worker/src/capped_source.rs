use async_trait::async_trait;
use migration_source::SourceReader;
use migration_types::{MigrationResult, SourceProduct};
use std::sync::Arc;

/// Wraps a [`SourceReader`] so `TEST_MODE` (spec §6: "cap total records to
/// a small constant for smoke tests") is enforced uniformly regardless of
/// which backend (live store or snapshot) is selected underneath.
pub struct CappedSourceReader {
    inner: Arc<dyn SourceReader>,
    cap: u64,
}

impl CappedSourceReader {
    pub fn new(inner: Arc<dyn SourceReader>, cap: u64) -> Self {
        Self { inner, cap }
    }
}

#[async_trait]
impl SourceReader for CappedSourceReader {
    async fn count(&self) -> MigrationResult<u64> {
        Ok(self.inner.count().await?.min(self.cap))
    }

    async fn read(&self, skip: u64, take: u64) -> MigrationResult<Vec<SourceProduct>> {
        if skip >= self.cap {
            return Ok(Vec::new());
        }
        let take = take.min(self.cap - skip);
        self.inner.read(skip, take).await
    }
}
