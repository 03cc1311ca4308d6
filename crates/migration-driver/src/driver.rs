use std::collections::HashSet;
use std::sync::Arc;

use migration_coordination::{ChunkCoordination, LeaseRenewer};
use migration_pipeline::RecordProcessor;
use migration_source::SourceReader;
use migration_types::{ChunkResult, ChunkState, MigrationResult, Progress};
use tokio_util::sync::CancellationToken;

use crate::config::DriverConfig;

/// A hook the driver calls with each chunk's aggregated [`ChunkResult`]
/// as soon as it completes, so a caller-owned metrics sink (spec §4.2's
/// per-chunk counters) can observe run progress without the driver
/// needing to know anything about how metrics are collected or served.
pub trait ChunkObserver: Send + Sync {
    fn on_chunk_completed(&self, result: &ChunkResult);
}

/// The Migration Driver (spec §4.2, component C8): leases chunks from the
/// Chunk Scheduler (C7), asks the Source Reader (C1) for the records in
/// each chunk's window, and runs them one at a time through the
/// Per-Record Migration Pipeline (C2-C6), aggregating a [`ChunkResult`]
/// as it goes.
pub struct MigrationDriver {
    coordination: Arc<dyn ChunkCoordination>,
    source: Arc<dyn SourceReader>,
    processor: Arc<dyn RecordProcessor>,
    config: DriverConfig,
    observer: Option<Arc<dyn ChunkObserver>>,
}

impl MigrationDriver {
    pub fn new(
        coordination: Arc<dyn ChunkCoordination>,
        source: Arc<dyn SourceReader>,
        processor: Arc<dyn RecordProcessor>,
        config: DriverConfig,
    ) -> Self {
        Self {
            coordination,
            source,
            processor,
            config,
            observer: None,
        }
    }

    /// Attaches a [`ChunkObserver`] notified after each chunk completes.
    pub fn with_observer(mut self, observer: Arc<dyn ChunkObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The main loop (spec §4.2 `execute`). Runs until every chunk is
    /// completed or `shutdown` is cancelled, then returns a final
    /// progress summary.
    pub async fn execute(&self, shutdown: CancellationToken) -> MigrationResult<Progress> {
        if self.coordination.chunk_map_is_empty().await? {
            let total = self.source.count().await?;
            let num_chunks = self.coordination.initialize_chunks(total, self.config.chunk_size).await?;
            tracing::info!(total, num_chunks, "initialized chunk map");
            // Q3 (spec §9): a zero-record source creates zero chunks, so the
            // map never stops being "empty" and `areAllChunksCompleted`
            // would never return true either. Short-circuit here instead
            // of looping forever.
            if total == 0 {
                tracing::info!("source has zero records; nothing to migrate");
                return Ok(Progress::default());
            }
        }

        // Q1 (spec §9): before scanning for work, reclaim any chunk whose
        // holder crashed without releasing its lock.
        let swept = self.coordination.sweep_stale_leases().await?;
        if swept > 0 {
            tracing::info!(swept, "reclaimed stale chunk leases before starting");
        }

        let mut seen_source_ids: HashSet<i64> = HashSet::new();

        loop {
            if shutdown.is_cancelled() {
                tracing::info!("shutdown requested, not leasing another chunk");
                break;
            }

            let chunk = match self.coordination.get_next_chunk(&self.config.worker_id).await? {
                Some(chunk) => chunk,
                None => {
                    if self.coordination.are_all_chunks_completed().await? {
                        tracing::info!("all chunks completed");
                        break;
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.idle_poll_interval) => {}
                    }
                    continue;
                }
            };

            match self.process_chunk(&chunk, &mut seen_source_ids, &shutdown).await {
                Ok(Some(result)) => {
                    tracing::info!(
                        chunk_id = chunk.chunk_id,
                        processed = result.processed,
                        errors = result.errors,
                        "chunk completed"
                    );
                    if let Some(observer) = &self.observer {
                        observer.on_chunk_completed(&result);
                    }
                    self.coordination.mark_chunk_completed(chunk.chunk_id, result).await?;
                }
                Ok(None) => {
                    // Interrupted mid-chunk by shutdown (spec §5): leave it
                    // `processing`. Its lease will expire and it will be
                    // swept back to `pending` for the next worker to pick up.
                    tracing::info!(chunk_id = chunk.chunk_id, "exiting with chunk still in flight");
                    break;
                }
                Err(e) => {
                    tracing::warn!(chunk_id = chunk.chunk_id, error = %e, "chunk failed, reverting to pending");
                    self.coordination.mark_chunk_pending(chunk.chunk_id).await?;
                }
            }
        }

        self.coordination.get_progress().await
    }

    /// Runs one chunk's records under a lease-renewal timer (spec §4.1
    /// lease renewal contract). `Ok(None)` means shutdown interrupted the
    /// chunk before it finished; `Err` means a chunk-fatal error escaped
    /// the record loop (spec §7) and the caller should revert the chunk.
    async fn process_chunk(
        &self,
        chunk: &ChunkState,
        seen_source_ids: &mut HashSet<i64>,
        shutdown: &CancellationToken,
    ) -> MigrationResult<Option<ChunkResult>> {
        let renewer = LeaseRenewer::start(self.coordination.clone(), chunk.chunk_id, self.config.lock_renew_interval);
        let outcome = self.run_records(chunk, seen_source_ids, shutdown).await;
        renewer.stop().await;
        outcome
    }

    async fn run_records(
        &self,
        chunk: &ChunkState,
        seen_source_ids: &mut HashSet<i64>,
        shutdown: &CancellationToken,
    ) -> MigrationResult<Option<ChunkResult>> {
        let records = self.source.read(chunk.start_offset, chunk.len()).await?;
        let mut result = ChunkResult::default();

        for record in &records {
            if shutdown.is_cancelled() {
                tracing::info!(
                    chunk_id = chunk.chunk_id,
                    processed = result.processed,
                    "shutdown requested mid-chunk, finishing current record only"
                );
                return Ok(None);
            }

            // In-process duplicate suppression (spec §4.2): distinct from
            // datastore-level idempotence, this only guards against the
            // same record appearing twice within one worker's run (e.g.
            // overlapping chunk bounds from operator error).
            if !seen_source_ids.insert(record.source_id) {
                result.duplicates_skipped += 1;
                continue;
            }

            match self.processor.process(record).await {
                Ok(outcome) => {
                    result.processed += 1;
                    if outcome.provider_created {
                        result.providers_created += 1;
                    }
                    if outcome.product_created {
                        result.products_created += 1;
                    }
                    if outcome.product_updated {
                        result.products_updated += 1;
                    }
                    result.histories_filled += outcome.histories_filled;
                    result.multimedia_created += outcome.multimedia_written;
                }
                Err(e) if e.is_chunk_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        source_id = record.source_id,
                        external_id = %record.external_id,
                        platform = %record.platform_name,
                        country = %record.country_code,
                        error = %e,
                        "record failed, continuing with next record"
                    );
                    result.errors += 1;
                }
            }
        }

        Ok(Some(result))
    }

    /// Deletes all chunk state and locks unconditionally (the `reset`
    /// operator command, spec §4.1).
    pub async fn reset(&self) -> MigrationResult<()> {
        self.coordination.reset().await
    }

    /// A point-in-time progress summary (the `progress` operator command).
    pub async fn progress(&self) -> MigrationResult<Progress> {
        self.coordination.get_progress().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use migration_coordination::InMemoryChunkCoordination;
    use migration_pipeline::RecordOutcome;
    use migration_types::{MigrationError, SourceProduct};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeSource {
        records: Vec<SourceProduct>,
    }

    #[async_trait]
    impl SourceReader for FakeSource {
        async fn count(&self) -> MigrationResult<u64> {
            Ok(self.records.len() as u64)
        }
        async fn read(&self, skip: u64, take: u64) -> MigrationResult<Vec<SourceProduct>> {
            Ok(self
                .records
                .iter()
                .skip(skip as usize)
                .take(take as usize)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingProcessor {
        calls: AtomicUsize,
        fail_source_id: Option<i64>,
    }

    #[async_trait]
    impl RecordProcessor for CountingProcessor {
        async fn process(&self, product: &SourceProduct) -> MigrationResult<RecordOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(product.source_id) == self.fail_source_id {
                return Err(MigrationError::SourceDataMalformed("boom".into()));
            }
            Ok(RecordOutcome {
                provider_created: false,
                product_created: true,
                product_updated: false,
                histories_filled: 1,
                multimedia_written: 1,
            })
        }
    }

    fn product(source_id: i64) -> SourceProduct {
        let mut p = migration_types::test_support::sample_product();
        p.source_id = source_id;
        p
    }

    #[tokio::test]
    async fn zero_records_completes_immediately_without_looping() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records: vec![] });
        let processor: Arc<dyn RecordProcessor> = Arc::new(CountingProcessor::default());
        let driver = MigrationDriver::new(
            coordination,
            source,
            processor,
            DriverConfig::new("w1".into(), 10, Duration::from_secs(30)),
        );

        let progress = tokio::time::timeout(Duration::from_secs(1), driver.execute(CancellationToken::new()))
            .await
            .expect("must not hang on a zero-record source")
            .unwrap();
        assert_eq!(progress, Progress::default());
    }

    #[tokio::test]
    async fn processes_all_chunks_to_completion() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        let records: Vec<SourceProduct> = (1..=25).map(product).collect();
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records });
        let processor = Arc::new(CountingProcessor::default());
        let driver = MigrationDriver::new(
            coordination,
            source,
            processor.clone(),
            DriverConfig::new("w1".into(), 10, Duration::from_secs(30)),
        );

        let progress = tokio::time::timeout(Duration::from_secs(5), driver.execute(CancellationToken::new()))
            .await
            .unwrap()
            .unwrap();
        assert!(progress.is_complete());
        assert_eq!(progress.total_chunks, 3);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 25);
    }

    struct AlwaysFatal;
    #[async_trait]
    impl RecordProcessor for AlwaysFatal {
        async fn process(&self, _product: &SourceProduct) -> MigrationResult<RecordOutcome> {
            Err(MigrationError::TransientStore("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn chunk_fatal_error_reverts_chunk_to_pending() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        coordination.initialize_chunks(5, 10).await.unwrap();
        let chunk = coordination.get_next_chunk("w1").await.unwrap().unwrap();

        let records: Vec<SourceProduct> = (1..=5).map(product).collect();
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records });
        let processor: Arc<dyn RecordProcessor> = Arc::new(AlwaysFatal);
        let driver = MigrationDriver::new(
            coordination.clone(),
            source,
            processor,
            DriverConfig::new("w1".into(), 10, Duration::from_secs(30)),
        );

        let mut seen = HashSet::new();
        let token = CancellationToken::new();
        let result = driver.process_chunk(&chunk, &mut seen, &token).await;
        assert!(result.is_err());

        // Mirrors what `execute` does on this path: the chunk-level
        // bookkeeping reverts even though the processor already wrote
        // whatever it wrote for earlier records in the chunk (spec §4.1
        // "partial work from a failed chunk is not rolled back").
        coordination.mark_chunk_pending(chunk.chunk_id).await.unwrap();
        let progress = coordination.get_progress().await.unwrap();
        assert_eq!(progress.pending, 1);
        assert_eq!(progress.processing, 0);
    }

    #[tokio::test]
    async fn duplicate_source_ids_within_a_chunk_are_counted_not_reprocessed() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        coordination.initialize_chunks(2, 10).await.unwrap();
        let chunk = coordination.get_next_chunk("w1").await.unwrap().unwrap();

        let mut one = product(1);
        one.source_id = 1;
        let mut dup = product(1);
        dup.source_id = 1;
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records: vec![one, dup] });
        let processor = Arc::new(CountingProcessor::default());
        let driver = MigrationDriver::new(
            coordination.clone(),
            source,
            processor.clone(),
            DriverConfig::new("w1".into(), 10, Duration::from_secs(30)),
        );

        let mut seen = HashSet::new();
        let token = CancellationToken::new();
        let result = driver.process_chunk(&chunk, &mut seen, &token).await.unwrap().unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.duplicates_skipped, 1);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_mid_chunk_leaves_it_processing_for_a_sweep_to_reclaim() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        coordination.initialize_chunks(3, 10).await.unwrap();
        let chunk = coordination.get_next_chunk("w1").await.unwrap().unwrap();

        let records: Vec<SourceProduct> = (1..=3).map(product).collect();
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records });
        let processor: Arc<dyn RecordProcessor> = Arc::new(CountingProcessor::default());
        let driver = MigrationDriver::new(
            coordination.clone(),
            source,
            processor,
            DriverConfig::new("w1".into(), 10, Duration::from_secs(30)),
        );

        let token = CancellationToken::new();
        token.cancel();
        let mut seen = HashSet::new();
        let outcome = driver.process_chunk(&chunk, &mut seen, &token).await.unwrap();
        assert!(outcome.is_none());

        let progress = coordination.get_progress().await.unwrap();
        assert_eq!(progress.processing, 1);
    }

    #[tokio::test]
    async fn lock_renewal_keeps_the_lease_alive_during_a_long_chunk() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        coordination.initialize_chunks(1, 10).await.unwrap();
        let chunk = coordination.get_next_chunk("w1").await.unwrap().unwrap();

        let records: Vec<SourceProduct> = vec![product(1)];
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records });
        let processor: Arc<dyn RecordProcessor> = Arc::new(CountingProcessor::default());
        let config = DriverConfig::new("w1".into(), 10, Duration::from_millis(50));
        let driver = MigrationDriver::new(coordination.clone(), source, processor, config);

        let mut seen = HashSet::new();
        let token = CancellationToken::new();
        let result = driver.process_chunk(&chunk, &mut seen, &token).await.unwrap().unwrap();
        assert_eq!(result.processed, 1);
    }

    #[derive(Default)]
    struct RecordingObserver {
        completions: Mutex<Vec<ChunkResult>>,
    }

    impl ChunkObserver for RecordingObserver {
        fn on_chunk_completed(&self, result: &ChunkResult) {
            self.completions.lock().unwrap().push(result.clone());
        }
    }

    #[tokio::test]
    async fn observer_is_notified_once_per_completed_chunk() {
        let coordination: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        let records: Vec<SourceProduct> = (1..=25).map(product).collect();
        let source: Arc<dyn SourceReader> = Arc::new(FakeSource { records });
        let processor: Arc<dyn RecordProcessor> = Arc::new(CountingProcessor::default());
        let observer = Arc::new(RecordingObserver::default());
        let driver = MigrationDriver::new(
            coordination,
            source,
            processor,
            DriverConfig::new("w1".into(), 10, Duration::from_secs(30)),
        )
        .with_observer(observer.clone());

        tokio::time::timeout(Duration::from_secs(5), driver.execute(CancellationToken::new()))
            .await
            .unwrap()
            .unwrap();

        let completions = observer.completions.lock().unwrap();
        assert_eq!(completions.len(), 3, "one notification per completed chunk");
        let total_processed: u64 = completions.iter().map(|r| r.processed).sum();
        assert_eq!(total_processed, 25);
    }
}
