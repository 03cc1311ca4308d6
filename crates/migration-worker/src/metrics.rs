use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use migration_driver::ChunkObserver;
use migration_types::{ChunkResult, Progress};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Per-chunk counters and run-level progress gauges (spec §4.2's
/// aggregated metrics), served over HTTP as a `prometheus::Registry`
/// scraped through a tiny `axum` router, separate from the `tracing` logs.
pub struct WorkerMetrics {
    registry: Registry,
    processed: IntCounter,
    providers_created: IntCounter,
    products_created: IntCounter,
    products_updated: IntCounter,
    histories_filled: IntCounter,
    multimedia_created: IntCounter,
    duplicates_skipped: IntCounter,
    errors: IntCounter,
    chunks_total: IntGauge,
    chunks_pending: IntGauge,
    chunks_processing: IntGauge,
    chunks_completed: IntGauge,
}

impl WorkerMetrics {
    pub fn new() -> anyhow::Result<Arc<Self>> {
        let registry = Registry::new();
        macro_rules! counter {
            ($name:expr, $help:expr) => {{
                let c = IntCounter::new($name, $help)?;
                registry.register(Box::new(c.clone()))?;
                c
            }};
        }
        macro_rules! gauge {
            ($name:expr, $help:expr) => {{
                let g = IntGauge::new($name, $help)?;
                registry.register(Box::new(g.clone()))?;
                g
            }};
        }

        Ok(Arc::new(Self {
            processed: counter!("migration_records_processed_total", "records processed"),
            providers_created: counter!("migration_providers_created_total", "providers created"),
            products_created: counter!("migration_products_created_total", "products created"),
            products_updated: counter!("migration_products_updated_total", "products updated"),
            histories_filled: counter!("migration_histories_filled_total", "history rows synthesized"),
            multimedia_created: counter!("migration_multimedia_created_total", "multimedia rows written"),
            duplicates_skipped: counter!(
                "migration_duplicates_skipped_total",
                "records skipped as in-run duplicates"
            ),
            errors: counter!("migration_record_errors_total", "per-record failures"),
            chunks_total: gauge!("migration_chunks_total", "total chunk count"),
            chunks_pending: gauge!("migration_chunks_pending", "chunks awaiting a worker"),
            chunks_processing: gauge!("migration_chunks_processing", "chunks currently leased"),
            chunks_completed: gauge!("migration_chunks_completed", "chunks completed"),
            registry,
        }))
    }

    pub fn observe_chunk(&self, result: &ChunkResult) {
        self.processed.inc_by(result.processed);
        self.providers_created.inc_by(result.providers_created);
        self.products_created.inc_by(result.products_created);
        self.products_updated.inc_by(result.products_updated);
        self.histories_filled.inc_by(result.histories_filled);
        self.multimedia_created.inc_by(result.multimedia_created);
        self.duplicates_skipped.inc_by(result.duplicates_skipped);
        self.errors.inc_by(result.errors);
    }

    pub fn observe_progress(&self, progress: &Progress) {
        self.chunks_total.set(progress.total_chunks as i64);
        self.chunks_pending.set(progress.pending as i64);
        self.chunks_processing.set(progress.processing as i64);
        self.chunks_completed.set(progress.completed as i64);
    }

    /// Binds the `/metrics` endpoint and serves it until `shutdown` fires.
    pub async fn serve(
        self: Arc<Self>,
        address: SocketAddr,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/metrics", get(scrape))
            .route("/health", get(|| async { "ok" }))
            .with_state(self);
        let listener = tokio::net::TcpListener::bind(address).await?;
        tracing::info!(%address, "metrics server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}

impl ChunkObserver for WorkerMetrics {
    fn on_chunk_completed(&self, result: &ChunkResult) {
        self.observe_chunk(result);
    }
}

async fn scrape(State(metrics): State<Arc<WorkerMetrics>>) -> impl IntoResponse {
    let families = metrics.registry.gather();
    let mut buffer = Vec::new();
    match TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| e.to_string())
        .and_then(|_| String::from_utf8(buffer).map_err(|e| e.to_string()))
    {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
