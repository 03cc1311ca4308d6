use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use migration_driver::DriverConfig;

/// Default record cap applied under `TEST_MODE` for smoke tests (spec §6).
const TEST_MODE_RECORD_CAP: u64 = 200;

#[derive(Parser, Debug)]
#[command(author, version, about = "Catalog migration worker", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum Command {
    /// Run the migration driver to completion (or until shutdown).
    Run,
    /// Delete all chunk state and locks unconditionally.
    Reset,
    /// Print a point-in-time progress summary and exit.
    Progress,
}

/// Everything the worker needs, sourced from spec §6's environment
/// variables plus the scheduler tunables spec §4.1 names as configurable
/// constants. `clap`'s `env` derive means every field can equally be set
/// as a flag or an environment variable.
#[derive(ClapArgs, Debug, Clone)]
pub struct Config {
    /// Legacy store connection string. Accepts either env name (spec §6).
    #[arg(long, env = "OLD_DATABASE_URL")]
    pub old_database_url: Option<String>,
    #[arg(long, env = "LEGACY_DATABASE_URL")]
    pub legacy_database_url: Option<String>,

    /// Target store connection string.
    #[arg(long, env = "PRODUCTS_DATABASE_URL")]
    pub products_database_url: String,

    /// Coordination service connection string.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: String,

    /// Identity recorded as the lease holder; defaults to a random token.
    #[arg(long, env = "WORKER_ID")]
    pub worker_id: Option<String>,

    /// Caps total records processed, for smoke tests.
    #[arg(long, env = "TEST_MODE", default_value_t = false)]
    pub test_mode: bool,

    /// Reserved for per-operation retry policy (spec §6).
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Reserved for per-operation retry backoff, in seconds (spec §6).
    #[arg(long, env = "RETRY_DELAY", default_value_t = 1)]
    pub retry_delay_secs: u64,

    /// Records per chunk (spec §4.1).
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 500)]
    pub chunk_size: u64,

    /// Lease TTL in seconds (spec §4.1 default 30s).
    #[arg(long, env = "LOCK_TTL_SECS", default_value_t = 30)]
    pub lock_ttl_secs: u64,

    /// Overrides the lease-renewal interval; defaults to 40% of
    /// `lock_ttl_secs` (spec §4.1) when unset.
    #[arg(long, env = "LOCK_RENEW_INTERVAL_MS")]
    pub lock_renew_interval_ms: Option<u64>,

    /// Path checked for a pre-exported snapshot file (spec §4.3, §6).
    #[arg(long, env = "SNAPSHOT_PATH", default_value = "data/products/all-products.json")]
    pub snapshot_path: PathBuf,

    /// Address the Prometheus metrics server binds to.
    #[arg(long, env = "METRICS_ADDRESS", default_value = "0.0.0.0:9184")]
    pub metrics_address: SocketAddr,
}

impl Config {
    pub fn legacy_database_url(&self) -> Result<&str, anyhow::Error> {
        self.old_database_url
            .as_deref()
            .or(self.legacy_database_url.as_deref())
            .ok_or_else(|| {
                anyhow::anyhow!("one of OLD_DATABASE_URL or LEGACY_DATABASE_URL must be set")
            })
    }

    pub fn worker_id(&self) -> String {
        self.worker_id.clone().unwrap_or_else(random_worker_id)
    }

    pub fn driver_config(&self) -> DriverConfig {
        let mut config =
            DriverConfig::new(self.worker_id(), self.chunk_size, Duration::from_secs(self.lock_ttl_secs));
        if let Some(ms) = self.lock_renew_interval_ms {
            config.lock_renew_interval = Duration::from_millis(ms);
        }
        config
    }

    /// Record cap to apply when `test_mode` is set (spec §6).
    pub fn test_mode_cap(&self) -> u64 {
        TEST_MODE_RECORD_CAP
    }
}

fn random_worker_id() -> String {
    use rand::Rng;
    let suffix: u64 = rand::thread_rng().gen();
    format!("worker-{suffix:016x}")
}
