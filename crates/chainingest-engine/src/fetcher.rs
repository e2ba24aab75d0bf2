//! Block fetcher: turns a height into a [`BlockEvent`].
//!
//! Fetch failures are swallowed: the height is logged and skipped so one bad
//! block cannot stall a sync. There is no retry at this layer.
//!
//! A processor that returns an error or panics is treated the same way. The
//! panic is caught here, so every caller (normal sync, fast-sync workers,
//! the live listener) sees a skipped height and carries on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use chainingest_core::handler::Processor;
use chainingest_core::types::{BlockEvent, Height};
use chainingest_rpc::NodeClient;

use crate::dispatcher::panic_message;

/// Fetches block bodies and canonical hashes and hands them to the processor.
pub struct BlockFetcher {
    client: Arc<dyn NodeClient>,
    processor: Option<Arc<dyn Processor>>,
}

impl BlockFetcher {
    pub fn new(client: Arc<dyn NodeClient>, processor: Option<Arc<dyn Processor>>) -> Self {
        Self { client, processor }
    }

    /// Fetch and process the block at `number`.
    ///
    /// Returns `None` if the body cannot be retrieved or the processor
    /// rejects it or panics. A failed canonical-hash lookup still yields an
    /// event, with an empty hash.
    pub async fn fetch(&self, number: &Height) -> Option<BlockEvent> {
        let block = match self.client.block_by_number(number).await {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(
                    block = %number,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Error fetching block, skipping"
                );
                return None;
            }
        };

        let hash = match self.client.block_hash(number).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(
                    block = %number,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Error fetching block hash"
                );
                String::new()
            }
        };

        tracing::info!(
            block = %block.number,
            time = %block.formatted_time(),
            hash = %hash,
            "Process block"
        );

        let Some(p) = &self.processor else {
            return Some(BlockEvent::new(block.number.clone(), block.parent_hash.clone(), hash));
        };

        let built = std::panic::catch_unwind(AssertUnwindSafe(|| {
            p.new_block_event(block.number.clone(), block.parent_hash.clone(), hash)
        }));
        let mut event = match built {
            Ok(event) => event,
            Err(panic) => {
                tracing::error!(block = %number, panic = %panic_message(panic.as_ref()), "Processor panicked, skipping");
                return None;
            }
        };
        event.set_fork(false);

        match AssertUnwindSafe(p.process(&block, &mut event)).catch_unwind().await {
            Ok(Ok(())) => Some(event),
            Ok(Err(e)) => {
                tracing::warn!(block = %number, error = %e, "Processor rejected block, skipping");
                None
            }
            Err(panic) => {
                tracing::error!(block = %number, panic = %panic_message(panic.as_ref()), "Processor panicked, skipping");
                None
            }
        }
    }
}
