mod capped_source;
mod config;
mod metrics;

use std::process::ExitCode;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use migration_coordination::{ChunkCoordination, RedisChunkCoordination};
use migration_driver::MigrationDriver;
use migration_pipeline::RecordPipeline;
use migration_source::{build_legacy_pool, build_source_reader, PgSourceHistoryStore};
use migration_store::{build_target_pool, PgTargetStore};
use tokio_util::sync::CancellationToken;

use crate::capped_source::CappedSourceReader;
use crate::config::{Args, Command};
use crate::metrics::WorkerMetrics;

/// Which signal, if any, requested shutdown (spec §6 exit codes).
#[derive(Default)]
struct SignalReason(AtomicU8);

const SIGNAL_NONE: u8 = 0;
const SIGNAL_INT: u8 = 130;
const SIGNAL_TERM: u8 = 143;

impl SignalReason {
    fn exit_code(&self) -> ExitCode {
        match self.0.load(Ordering::SeqCst) {
            SIGNAL_NONE => ExitCode::SUCCESS,
            code => ExitCode::from(code),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "fatal error");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let shutdown = CancellationToken::new();
    let signal_reason = Arc::new(SignalReason::default());
    install_signal_handlers(shutdown.clone(), signal_reason.clone());

    let coordination: Arc<dyn ChunkCoordination> =
        Arc::new(RedisChunkCoordination::connect(&args.config.redis_url, args.config.lock_ttl_secs).await?);

    match args.command {
        Command::Reset => {
            coordination.reset().await.context("resetting chunk state")?;
            tracing::info!("chunk state reset");
            return Ok(ExitCode::SUCCESS);
        }
        Command::Progress => {
            let progress = coordination.get_progress().await.context("reading progress")?;
            println!(
                "{}/{} chunks completed ({} pending, {} processing)",
                progress.completed, progress.total_chunks, progress.pending, progress.processing
            );
            return Ok(ExitCode::SUCCESS);
        }
        Command::Run => {}
    }

    let legacy_url = args.config.legacy_database_url()?;
    let legacy_pool = build_legacy_pool(legacy_url).await.context("building legacy pool")?;
    let target_pool = build_target_pool(&args.config.products_database_url)
        .await
        .context("building target pool")?;

    let target_store = Arc::new(PgTargetStore::new(target_pool));
    let legacy_history_store = Arc::new(PgSourceHistoryStore::new(legacy_pool.clone()));

    let pipeline = Arc::new(RecordPipeline::new(
        target_store.clone(),
        target_store.clone(),
        target_store.clone(),
        legacy_history_store,
        target_store.clone(),
        target_store,
    ));

    let source = build_source_reader(&args.config.snapshot_path, legacy_pool)
        .await
        .context("selecting source backend")?;
    let source: Arc<dyn migration_source::SourceReader> = if args.config.test_mode {
        Arc::new(CappedSourceReader::new(source, args.config.test_mode_cap()))
    } else {
        source
    };

    let metrics = WorkerMetrics::new().context("initializing metrics registry")?;
    let metrics_shutdown = shutdown.clone();
    let metrics_handle = tokio::spawn(metrics.clone().serve(args.config.metrics_address, metrics_shutdown));

    let driver = MigrationDriver::new(coordination, source, pipeline, args.config.driver_config())
        .with_observer(metrics.clone());
    let progress = driver.execute(shutdown.clone()).await.context("running migration driver")?;
    metrics.observe_progress(&progress);
    tracing::info!(?progress, "driver run finished");

    shutdown.cancel();
    let _ = metrics_handle.await;

    Ok(signal_reason.exit_code())
}

/// Wires SIGINT/SIGTERM into `shutdown` (spec §5: "finish the current
/// record, release connections, exit") and records which signal fired so
/// `run` can map it to the `130`/`143` exit codes spec §6 requires once
/// the driver loop actually returns, rather than killing the process
/// mid-record.
fn install_signal_handlers(shutdown: CancellationToken, reason: Arc<SignalReason>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, finishing current record then exiting");
                    reason.0.store(SIGNAL_INT, Ordering::SeqCst);
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, finishing current record then exiting");
                    reason.0.store(SIGNAL_TERM, Ordering::SeqCst);
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received ctrl-c, finishing current record then exiting");
            reason.0.store(SIGNAL_INT, Ordering::SeqCst);
        }
        shutdown.cancel();
    });
}
