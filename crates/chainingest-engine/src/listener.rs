//! Live listener: follows new heads after historical sync.
//!
//! For every header the listener catches up one height at a time from the
//! current `end` through the header's height: fetch, fork check, enqueue,
//! record. Bursts of headers never make it skip a height, and the fork
//! window only ever sees blocks in fetch order.

use chainingest_core::error::IngestError;
use chainingest_core::fork::{ForkRecord, ForkWatcher};
use chainingest_core::range::BlockRange;
use chainingest_core::types::Height;
use chainingest_rpc::HeadSubscription;

use crate::fetcher::BlockFetcher;
use crate::queue::EventSender;

pub struct LiveListener<'a> {
    fetcher: &'a BlockFetcher,
    fork: &'a mut ForkWatcher,
    queue: &'a EventSender,
}

impl<'a> LiveListener<'a> {
    pub fn new(fetcher: &'a BlockFetcher, fork: &'a mut ForkWatcher, queue: &'a EventSender) -> Self {
        Self { fetcher, fork, queue }
    }

    /// Consume `heads` until the stream ends, advancing `end` (the next
    /// height to fetch) as headers arrive.
    ///
    /// Subscription errors are logged and skipped. The stream ending is
    /// returned as [`IngestError::SubscriptionClosed`].
    pub async fn listen(&mut self, end: &mut Height, mut heads: HeadSubscription) -> Result<(), IngestError> {
        loop {
            match heads.next().await {
                None => return Err(IngestError::SubscriptionClosed),
                Some(Err(e)) => tracing::warn!(error = %e, "New head subscription error"),
                Some(Ok(header)) => {
                    tracing::debug!(block = %header.number, "New head");
                    self.catch_up(end, &header.number).await?;
                }
            }
        }
    }

    /// Process every height in `[end, head]` in order, then move `end` to
    /// `head + 1`. `end` never moves backwards.
    pub async fn catch_up(&mut self, end: &mut Height, head: &Height) -> Result<(), IngestError> {
        for height in BlockRange::new(end.clone(), head.clone()).heights() {
            let Some(mut event) = self.fetcher.fetch(&height).await else {
                continue;
            };
            self.fork.check_fork(&mut event);
            let record = ForkRecord::from(&event);
            self.queue.push(event).await?;
            self.fork.apply(record);
        }
        let next = head + 1u32;
        if next > *end {
            *end = next;
        }
        Ok(())
    }
}
