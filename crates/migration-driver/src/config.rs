use std::time::Duration;

/// Tunables for one [`crate::MigrationDriver`] instance (spec §4.1, §6).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Identity recorded as the lease holder (spec §4.1 `workerId`).
    pub worker_id: String,
    pub chunk_size: u64,
    pub lock_ttl: Duration,
    /// How often the background renewer calls `renewLock` while a chunk
    /// is held (spec §4.1: "default 40% of lockTTL").
    pub lock_renew_interval: Duration,
    /// How long to sleep between scans when no chunk is leasable but the
    /// run isn't complete yet (spec §4.2 step 2: "sleep 5s and retry").
    pub idle_poll_interval: Duration,
}

impl DriverConfig {
    pub fn new(worker_id: String, chunk_size: u64, lock_ttl: Duration) -> Self {
        let renew_millis = (lock_ttl.as_millis() as u64).saturating_mul(4) / 10;
        Self {
            worker_id,
            chunk_size,
            lock_ttl,
            lock_renew_interval: Duration::from_millis(renew_millis.max(1)),
            idle_poll_interval: Duration::from_secs(5),
        }
    }
}
