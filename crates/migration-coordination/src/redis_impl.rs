use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use migration_types::{ChunkResult, ChunkState, ChunkStatus, MigrationError, MigrationResult, Progress};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::ChunkCoordination;

fn to_coord_err(e: redis::RedisError) -> MigrationError {
    MigrationError::CoordinationUnavailable(e.to_string())
}

fn to_parse_err(e: serde_json::Error, chunk_id: &str) -> MigrationError {
    MigrationError::CoordinationUnavailable(format!("corrupt chunk state for {chunk_id}: {e}"))
}

/// Redis-backed [`ChunkCoordination`] (spec §4.1, §6).
///
/// Key conventions (spec §6):
/// - `chunks_key` — a hash of `chunkId -> JSON(ChunkState)`.
/// - `lock_prefix + chunkId` — a string key with TTL; its value is the
///   lease holder's worker id. Presence of the key *is* the lease.
#[derive(Clone)]
pub struct RedisChunkCoordination {
    conn: ConnectionManager,
    chunks_key: String,
    lock_prefix: String,
    lock_ttl_secs: u64,
}

impl RedisChunkCoordination {
    pub async fn connect(redis_url: &str, lock_ttl_secs: u64) -> MigrationResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| MigrationError::Configuration(format!("invalid REDIS_URL: {e}")))?;
        let conn = client.get_connection_manager().await.map_err(to_coord_err)?;
        Ok(Self {
            conn,
            chunks_key: "migration:chunks".to_string(),
            lock_prefix: "migration:lock:".to_string(),
            lock_ttl_secs,
        })
    }

    #[cfg(test)]
    pub fn with_keys(conn: ConnectionManager, chunks_key: String, lock_prefix: String, lock_ttl_secs: u64) -> Self {
        Self {
            conn,
            chunks_key,
            lock_prefix,
            lock_ttl_secs,
        }
    }

    fn lock_key(&self, chunk_id: u64) -> String {
        format!("{}{}", self.lock_prefix, chunk_id)
    }

    async fn load_all(&self, conn: &mut ConnectionManager) -> MigrationResult<HashMap<String, ChunkState>> {
        let raw: HashMap<String, String> = conn.hgetall(&self.chunks_key).await.map_err(to_coord_err)?;
        raw.into_iter()
            .map(|(field, json)| {
                let state: ChunkState = serde_json::from_str(&json).map_err(|e| to_parse_err(e, &field))?;
                Ok((field, state))
            })
            .collect()
    }

    async fn load_one(&self, conn: &mut ConnectionManager, chunk_id: u64) -> MigrationResult<Option<ChunkState>> {
        let field = chunk_id.to_string();
        let json: Option<String> = conn.hget(&self.chunks_key, &field).await.map_err(to_coord_err)?;
        match json {
            None => Ok(None),
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| to_parse_err(e, &field))?)),
        }
    }

    async fn save(&self, conn: &mut ConnectionManager, chunk: &ChunkState) -> MigrationResult<()> {
        let field = chunk.chunk_id.to_string();
        let json = serde_json::to_string(chunk)
            .map_err(|e| MigrationError::CoordinationUnavailable(format!("failed to serialize chunk state: {e}")))?;
        let _: () = conn.hset(&self.chunks_key, &field, json).await.map_err(to_coord_err)?;
        Ok(())
    }
}

#[async_trait]
impl ChunkCoordination for RedisChunkCoordination {
    async fn initialize_chunks(&self, total: u64, chunk_size: u64) -> MigrationResult<u64> {
        if chunk_size == 0 {
            return Err(MigrationError::Configuration("chunk_size must be > 0".into()));
        }
        let num_chunks = total.div_ceil(chunk_size);
        let mut conn = self.conn.clone();
        for chunk_id in 0..num_chunks {
            let start_offset = chunk_id * chunk_size;
            let end_offset = std::cmp::min((chunk_id + 1) * chunk_size, total);
            let state = ChunkState::new(chunk_id, start_offset, end_offset);
            self.save(&mut conn, &state).await?;
        }
        Ok(num_chunks)
    }

    async fn chunk_map_is_empty(&self) -> MigrationResult<bool> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.hlen(&self.chunks_key).await.map_err(to_coord_err)?;
        Ok(len == 0)
    }

    async fn get_next_chunk(&self, worker_id: &str) -> MigrationResult<Option<ChunkState>> {
        let mut conn = self.conn.clone();
        let mut entries: Vec<ChunkState> = self.load_all(&mut conn).await?.into_values().collect();
        entries.sort_by_key(|c| c.chunk_id);

        for mut chunk in entries {
            if chunk.status != ChunkStatus::Pending {
                continue;
            }
            let lock_key = self.lock_key(chunk.chunk_id);
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&lock_key)
                .arg(worker_id)
                .arg("NX")
                .arg("EX")
                .arg(self.lock_ttl_secs)
                .query_async(&mut conn)
                .await
                .map_err(to_coord_err)?;
            if acquired.is_some() {
                chunk.status = ChunkStatus::Processing;
                chunk.worker_id = Some(worker_id.to_string());
                chunk.last_update = Some(Utc::now());
                self.save(&mut conn, &chunk).await?;
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }

    async fn renew_lock(&self, chunk_id: u64) -> MigrationResult<()> {
        let mut conn = self.conn.clone();
        let lock_key = self.lock_key(chunk_id);
        let extended: bool = conn.expire(&lock_key, self.lock_ttl_secs as i64).await.map_err(to_coord_err)?;
        if !extended {
            return Err(MigrationError::TransientStore(format!(
                "lease for chunk {chunk_id} was lost before renewal"
            )));
        }
        Ok(())
    }

    async fn mark_chunk_completed(&self, chunk_id: u64, result: ChunkResult) -> MigrationResult<()> {
        let mut conn = self.conn.clone();
        let mut chunk = self
            .load_one(&mut conn, chunk_id)
            .await?
            .ok_or_else(|| MigrationError::CoordinationUnavailable(format!("unknown chunk {chunk_id}")))?;
        chunk.result.merge(&result);
        chunk.status = ChunkStatus::Completed;
        chunk.last_update = Some(Utc::now());
        self.save(&mut conn, &chunk).await?;
        let _: () = conn.del(self.lock_key(chunk_id)).await.map_err(to_coord_err)?;
        Ok(())
    }

    async fn mark_chunk_pending(&self, chunk_id: u64) -> MigrationResult<()> {
        let mut conn = self.conn.clone();
        let mut chunk = self
            .load_one(&mut conn, chunk_id)
            .await?
            .ok_or_else(|| MigrationError::CoordinationUnavailable(format!("unknown chunk {chunk_id}")))?;
        chunk.status = ChunkStatus::Pending;
        chunk.worker_id = None;
        chunk.last_update = Some(Utc::now());
        self.save(&mut conn, &chunk).await?;
        let _: () = conn.del(self.lock_key(chunk_id)).await.map_err(to_coord_err)?;
        Ok(())
    }

    async fn are_all_chunks_completed(&self) -> MigrationResult<bool> {
        let mut conn = self.conn.clone();
        let all = self.load_all(&mut conn).await?;
        if all.is_empty() {
            return Ok(false);
        }
        Ok(all.values().all(|c| c.status == ChunkStatus::Completed))
    }

    async fn get_progress(&self) -> MigrationResult<Progress> {
        let mut conn = self.conn.clone();
        let all = self.load_all(&mut conn).await?;
        let mut progress = Progress {
            total_chunks: all.len() as u64,
            ..Default::default()
        };
        for chunk in all.values() {
            match chunk.status {
                ChunkStatus::Pending => progress.pending += 1,
                ChunkStatus::Processing => progress.processing += 1,
                ChunkStatus::Completed => progress.completed += 1,
            }
        }
        Ok(progress)
    }

    async fn reset(&self) -> MigrationResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(&self.chunks_key).await.map_err(to_coord_err)?;

        let pattern = format!("{}*", self.lock_prefix);
        let mut iter: redis::AsyncIter<String> = conn
            .clone()
            .scan_match(&pattern)
            .await
            .map_err(to_coord_err)?;
        let mut keys = Vec::new();
        while let Some(key) = futures::StreamExt::next(&mut iter).await {
            keys.push(key);
        }
        drop(iter);
        if !keys.is_empty() {
            let _: () = conn.del(keys).await.map_err(to_coord_err)?;
        }
        Ok(())
    }

    async fn sweep_stale_leases(&self) -> MigrationResult<u64> {
        let mut conn = self.conn.clone();
        let all = self.load_all(&mut conn).await?;
        let mut swept = 0u64;
        for (_, mut chunk) in all {
            if chunk.status != ChunkStatus::Processing {
                continue;
            }
            let lock_key = self.lock_key(chunk.chunk_id);
            let exists: bool = conn.exists(&lock_key).await.map_err(to_coord_err)?;
            if exists {
                continue;
            }
            tracing::warn!(chunk_id = chunk.chunk_id, "sweeping orphaned processing chunk back to pending");
            chunk.status = ChunkStatus::Pending;
            chunk.worker_id = None;
            chunk.last_update = Some(Utc::now());
            self.save(&mut conn, &chunk).await?;
            swept += 1;
        }
        Ok(swept)
    }
}
