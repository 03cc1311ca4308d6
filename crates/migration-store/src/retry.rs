//! Bounded-retry wrapper for target-store writes, in the spirit of the
//! teacher's `transactional_blocking_with_retry!` macro (a blocking-pool
//! retry loop around a diesel closure) but recast for `diesel-async`:
//! a plain async function wrapping a closure, retrying only errors the
//! caller marks transient.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use migration_types::{MigrationError, MigrationResult};

/// Runs `op` up to a bounded number of times with exponential backoff,
/// retrying only on [`MigrationError::TransientStore`]. Any other error
/// variant is returned immediately without retry, matching the error
/// taxonomy's classification of which failures are worth retrying.
pub async fn retry_transient<T, F, Fut>(op: F) -> MigrationResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = MigrationResult<T>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(Duration::from_secs(30)))
        .build();

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(MigrationError::TransientStore(msg)) => match backoff.next_backoff() {
                Some(delay) => {
                    tracing::warn!(error = %msg, delay_ms = delay.as_millis() as u64, "retrying transient store error");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(MigrationError::TransientStore(msg)),
            },
            Err(other) => return Err(other),
        }
    }
}
