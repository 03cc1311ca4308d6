use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ChunkCoordination;

/// The lease-renewal background task (spec §4.1, §9).
///
/// Modeled as a cooperating task sharing a [`CancellationToken`] with the
/// chunk processor, per spec §9's re-architecture note: the token is
/// cancelled before the processor releases the lock, so a renewal can
/// never fire after the lease it's renewing has already been given up.
pub struct LeaseRenewer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LeaseRenewer {
    /// Start renewing `chunk_id`'s lease every `interval` until
    /// [`LeaseRenewer::stop`] is called or the renewer observes the lease
    /// was lost (in which case it stops renewing and logs; the chunk
    /// processor is expected to detect the same loss independently and
    /// abort, not rely on this task for correctness).
    pub fn start(coordination: Arc<dyn ChunkCoordination>, chunk_id: u64, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        match coordination.renew_lock(chunk_id).await {
                            Ok(()) => tracing::debug!(chunk_id, "renewed chunk lease"),
                            Err(e) => {
                                tracing::warn!(chunk_id, error = %e, "failed to renew chunk lease");
                                break;
                            }
                        }
                    }
                }
            }
        });
        Self { token, handle }
    }

    /// Cancel the renewal loop and wait for it to stop. Must be called
    /// before the caller releases the chunk's lock, or a renewal could
    /// race the release and resurrect a lock nobody holds anymore.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryChunkCoordination;

    #[tokio::test]
    async fn renewer_keeps_calling_renew_lock_until_stopped() {
        let coord: Arc<dyn ChunkCoordination> = Arc::new(InMemoryChunkCoordination::new());
        coord.initialize_chunks(10, 10).await.unwrap();
        let chunk = coord.get_next_chunk("worker-a").await.unwrap().unwrap();

        let renewer = LeaseRenewer::start(coord.clone(), chunk.chunk_id, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        renewer.stop().await;

        // The in-memory fake's lock model doesn't expire, so success here
        // just proves the loop ran (and didn't panic) across several ticks.
        assert!(coord.renew_lock(chunk.chunk_id).await.is_ok());
    }
}
