//! Historical sync: replays `[start, end]` into the event queue.
//!
//! # Normal
//! One height at a time. Events reach the queue in strictly increasing
//! height order; progress is reported at every height divisible by 10.
//!
//! # Fast
//! The range is cut into chunks of `pool × size` heights. Each chunk runs up
//! to `pool` workers on contiguous `size`-height sub-ranges; a worker is
//! sequential inside its sub-range but workers race each other. The chunk is
//! a barrier: every worker finishes before the next chunk starts and before
//! progress for the chunk is reported. Out-of-order delivery is therefore
//! bounded to one chunk.
//!
//! # Failures
//! Both modes skip a height whose body cannot be fetched, whose processor
//! returns an error, or whose processor panics; see
//! [`BlockFetcher`](crate::fetcher::BlockFetcher). The rest of the range is
//! still delivered. Only a closed dispatcher aborts the sync.

use std::sync::Arc;

use num_traits::Zero;
use tokio::task::JoinSet;

use chainingest_core::config::SyncMode;
use chainingest_core::error::IngestError;
use chainingest_core::range::{sync_percent, BlockRange};
use chainingest_core::status::StatusHandle;
use chainingest_core::types::Height;

use crate::fetcher::BlockFetcher;
use crate::queue::EventSender;

/// Drives a historical replay in either sync mode.
pub struct SyncController {
    fetcher: Arc<BlockFetcher>,
    queue: EventSender,
    status: StatusHandle,
    mode: SyncMode,
    pool: usize,
    size: usize,
}

impl SyncController {
    pub fn new(
        fetcher: Arc<BlockFetcher>,
        queue: EventSender,
        status: StatusHandle,
        mode: SyncMode,
        pool: usize,
        size: usize,
    ) -> Self {
        Self {
            fetcher,
            queue,
            status,
            mode,
            pool,
            size,
        }
    }

    /// Replay `range`. Only fails if the dispatcher has gone away.
    pub async fn sync(&self, range: &BlockRange) -> Result<(), IngestError> {
        tracing::info!(mode = %self.mode, start = %range.start, end = %range.end, "Syncing");
        if range.end.is_zero() {
            self.report(&range.end, &range.end);
            return Ok(());
        }
        match self.mode {
            SyncMode::Normal => self.normal_sync(range).await,
            SyncMode::Fast => self.fast_sync(range).await,
        }
    }

    async fn normal_sync(&self, range: &BlockRange) -> Result<(), IngestError> {
        for height in range.heights() {
            if let Some(event) = self.fetcher.fetch(&height).await {
                self.queue.push(event).await?;
            }
            if (&height % 10u32).is_zero() && height != range.end {
                self.report(&height, &range.end);
            }
        }
        self.report(&range.end, &range.end);
        Ok(())
    }

    async fn fast_sync(&self, range: &BlockRange) -> Result<(), IngestError> {
        for chunk in range.chunks(self.pool, self.size) {
            let mut workers = JoinSet::new();
            for sub_range in chunk.workers {
                let fetcher = Arc::clone(&self.fetcher);
                let queue = self.queue.clone();
                workers.spawn(async move {
                    for height in sub_range.heights() {
                        if let Some(event) = fetcher.fetch(&height).await {
                            queue.push(event).await?;
                        }
                    }
                    Ok::<_, IngestError>(())
                });
            }

            let mut failure = None;
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => failure = Some(e),
                    Err(e) => tracing::error!(chunk = %chunk.range, error = %e, "Sync worker aborted"),
                }
            }
            if let Some(e) = failure {
                return Err(e);
            }
            self.report(&chunk.range.end, &range.end);
        }
        self.report(&range.end, &range.end);
        Ok(())
    }

    /// Publish progress for having reached `current` out of `end`.
    fn report(&self, current: &Height, end: &Height) {
        let pct = sync_percent(current, end);
        self.status.set_synced(pct);
        tracing::info!(current = %current, "Synced {pct}%");
    }
}
