use serde::{Deserialize, Serialize};

/// `Chunk` lifecycle (spec §3 invariant I5): `pending -> processing ->
/// completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
}

/// Per-chunk metrics aggregated while a worker processes it (spec §4.2).
/// Merged into the persisted `ChunkState` on completion and also used as
/// the in-memory accumulator the driver builds up record by record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub processed: u64,
    pub providers_created: u64,
    pub products_created: u64,
    pub products_updated: u64,
    pub histories_filled: u64,
    pub multimedia_created: u64,
    pub duplicates_skipped: u64,
    pub errors: u64,
}

impl ChunkResult {
    pub fn merge(&mut self, other: &ChunkResult) {
        self.processed += other.processed;
        self.providers_created += other.providers_created;
        self.products_created += other.products_created;
        self.products_updated += other.products_updated;
        self.histories_filled += other.histories_filled;
        self.multimedia_created += other.multimedia_created;
        self.duplicates_skipped += other.duplicates_skipped;
        self.errors += other.errors;
    }
}

/// Persistent state for one chunk (spec §4.1). Serialized as the hash-map
/// value under `chunksKey` in the coordination service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkState {
    pub chunk_id: u64,
    pub start_offset: u64,
    pub end_offset: u64,
    pub status: ChunkStatus,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub result: ChunkResult,
}

impl ChunkState {
    pub fn new(chunk_id: u64, start_offset: u64, end_offset: u64) -> Self {
        Self {
            chunk_id,
            start_offset,
            end_offset,
            status: ChunkStatus::Pending,
            worker_id: None,
            last_update: None,
            result: ChunkResult::default(),
        }
    }

    pub fn len(&self) -> u64 {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A summary of overall progress (spec §4.1 `getProgress`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total_chunks: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.total_chunks > 0 && self.completed == self.total_chunks
    }
}
