//! The Chunk Scheduler (spec §4.1, component C7): the coordination core
//! that partitions a workload into fixed-size chunks and leases them out
//! to cooperating workers with TTL-bounded exclusive locks.

mod fake;
mod redis_impl;
mod renewer;

pub use fake::InMemoryChunkCoordination;
pub use redis_impl::RedisChunkCoordination;
pub use renewer::LeaseRenewer;

use async_trait::async_trait;
use migration_types::{ChunkResult, ChunkState, MigrationResult, Progress};

/// Everything the migration driver needs from the coordination service.
/// Kept as a trait so the driver and pipeline can be tested against
/// [`InMemoryChunkCoordination`] without a live Redis instance, rather
/// than exercising this logic only against a live database.
#[async_trait]
pub trait ChunkCoordination: Send + Sync {
    /// Create `ceil(total / chunk_size)` chunk entries, each
    /// `pending`. Does not check whether chunks already exist — callers
    /// (the migration driver) are responsible for only calling this once,
    /// per spec §4.1's "idempotent only if caller has not already
    /// initialized" contract.
    async fn initialize_chunks(&self, total: u64, chunk_size: u64) -> MigrationResult<u64>;

    /// True iff no chunk entries exist yet.
    async fn chunk_map_is_empty(&self) -> MigrationResult<bool>;

    /// Lease the first leasable `pending` chunk, or `None` if every
    /// remaining chunk is already leased by someone else.
    async fn get_next_chunk(&self, worker_id: &str) -> MigrationResult<Option<ChunkState>>;

    /// Extend a held lease's TTL. Must be called periodically by the
    /// lease holder while it still owns the chunk.
    async fn renew_lock(&self, chunk_id: u64) -> MigrationResult<()>;

    /// Merge `result` into the chunk's persisted state, mark it
    /// `completed`, and release its lock.
    async fn mark_chunk_completed(&self, chunk_id: u64, result: ChunkResult) -> MigrationResult<()>;

    /// Revert a chunk to `pending` and release its lock — the
    /// worker-local-failure recovery path (spec §4.1).
    async fn mark_chunk_pending(&self, chunk_id: u64) -> MigrationResult<()>;

    /// True iff the chunk map is non-empty and every chunk is `completed`.
    async fn are_all_chunks_completed(&self) -> MigrationResult<bool>;

    /// A point-in-time progress summary.
    async fn get_progress(&self) -> MigrationResult<Progress>;

    /// Delete all chunk state and locks unconditionally.
    async fn reset(&self) -> MigrationResult<()>;

    /// Flip any `processing` chunk whose lock key has expired back to
    /// `pending` (spec §9 Open Question Q1, resolved as a sweeper rather
    /// than implicit lease-stealing — see DESIGN.md). Returns the number
    /// of chunks swept.
    async fn sweep_stale_leases(&self) -> MigrationResult<u64>;
}
