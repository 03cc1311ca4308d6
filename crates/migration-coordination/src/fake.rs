use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use migration_types::{ChunkResult, ChunkState, ChunkStatus, MigrationError, MigrationResult, Progress};

use crate::ChunkCoordination;

/// An in-process [`ChunkCoordination`] used by tests that don't want a
/// live Redis instance. Lease exclusivity is enforced with a plain
/// `HashSet` of held chunk ids rather than a TTL — good enough to test
/// the driver and pipeline logic, not a substitute for testing the real
/// Redis lock semantics (that lives in `redis_impl`'s own tests, which
/// need `#[cfg(feature = "pg_integration")]`-style opt-in and a broker).
#[derive(Default)]
pub struct InMemoryChunkCoordination {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    chunks: HashMap<u64, ChunkState>,
    locked: HashSet<u64>,
}

impl InMemoryChunkCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force-expire a held lock without changing `status`, to simulate a
    /// worker that crashed mid-chunk (spec §4.1 crash-recovery scenario).
    pub fn expire_lock_for_test(&self, chunk_id: u64) {
        self.inner.lock().unwrap().locked.remove(&chunk_id);
    }
}

#[async_trait]
impl ChunkCoordination for InMemoryChunkCoordination {
    async fn initialize_chunks(&self, total: u64, chunk_size: u64) -> MigrationResult<u64> {
        if chunk_size == 0 {
            return Err(MigrationError::Configuration("chunk_size must be > 0".into()));
        }
        let num_chunks = total.div_ceil(chunk_size);
        let mut inner = self.inner.lock().unwrap();
        for chunk_id in 0..num_chunks {
            let start_offset = chunk_id * chunk_size;
            let end_offset = std::cmp::min((chunk_id + 1) * chunk_size, total);
            inner
                .chunks
                .insert(chunk_id, ChunkState::new(chunk_id, start_offset, end_offset));
        }
        Ok(num_chunks)
    }

    async fn chunk_map_is_empty(&self) -> MigrationResult<bool> {
        Ok(self.inner.lock().unwrap().chunks.is_empty())
    }

    async fn get_next_chunk(&self, worker_id: &str) -> MigrationResult<Option<ChunkState>> {
        let mut inner = self.inner.lock().unwrap();
        let mut ids: Vec<u64> = inner.chunks.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let leasable = {
                let chunk = inner.chunks.get(&id).unwrap();
                chunk.status == ChunkStatus::Pending && !inner.locked.contains(&id)
            };
            if !leasable {
                continue;
            }
            inner.locked.insert(id);
            let chunk = inner.chunks.get_mut(&id).unwrap();
            chunk.status = ChunkStatus::Processing;
            chunk.worker_id = Some(worker_id.to_string());
            chunk.last_update = Some(Utc::now());
            return Ok(Some(chunk.clone()));
        }
        Ok(None)
    }

    async fn renew_lock(&self, chunk_id: u64) -> MigrationResult<()> {
        let inner = self.inner.lock().unwrap();
        if inner.locked.contains(&chunk_id) {
            Ok(())
        } else {
            Err(MigrationError::TransientStore(format!(
                "lease for chunk {chunk_id} was lost before renewal"
            )))
        }
    }

    async fn mark_chunk_completed(&self, chunk_id: u64, result: ChunkResult) -> MigrationResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let chunk = inner
            .chunks
            .get_mut(&chunk_id)
            .ok_or_else(|| MigrationError::CoordinationUnavailable(format!("unknown chunk {chunk_id}")))?;
        chunk.result.merge(&result);
        chunk.status = ChunkStatus::Completed;
        chunk.last_update = Some(Utc::now());
        inner.locked.remove(&chunk_id);
        Ok(())
    }

    async fn mark_chunk_pending(&self, chunk_id: u64) -> MigrationResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let chunk = inner
            .chunks
            .get_mut(&chunk_id)
            .ok_or_else(|| MigrationError::CoordinationUnavailable(format!("unknown chunk {chunk_id}")))?;
        chunk.status = ChunkStatus::Pending;
        chunk.worker_id = None;
        chunk.last_update = Some(Utc::now());
        inner.locked.remove(&chunk_id);
        Ok(())
    }

    async fn are_all_chunks_completed(&self) -> MigrationResult<bool> {
        let inner = self.inner.lock().unwrap();
        if inner.chunks.is_empty() {
            return Ok(false);
        }
        Ok(inner.chunks.values().all(|c| c.status == ChunkStatus::Completed))
    }

    async fn get_progress(&self) -> MigrationResult<Progress> {
        let inner = self.inner.lock().unwrap();
        let mut progress = Progress {
            total_chunks: inner.chunks.len() as u64,
            ..Default::default()
        };
        for chunk in inner.chunks.values() {
            match chunk.status {
                ChunkStatus::Pending => progress.pending += 1,
                ChunkStatus::Processing => progress.processing += 1,
                ChunkStatus::Completed => progress.completed += 1,
            }
        }
        Ok(progress)
    }

    async fn reset(&self) -> MigrationResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.chunks.clear();
        inner.locked.clear();
        Ok(())
    }

    async fn sweep_stale_leases(&self) -> MigrationResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<u64> = inner
            .chunks
            .values()
            .filter(|c| c.status == ChunkStatus::Processing && !inner.locked.contains(&c.chunk_id))
            .map(|c| c.chunk_id)
            .collect();
        for id in &stale {
            let chunk = inner.chunks.get_mut(id).unwrap();
            chunk.status = ChunkStatus::Pending;
            chunk.worker_id = None;
            chunk.last_update = Some(Utc::now());
        }
        Ok(stale.len() as u64)
    }
}
