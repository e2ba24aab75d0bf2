//! Connector and processor traits: the two places user code plugs in.

use async_trait::async_trait;

use crate::error::IngestError;
use crate::types::{BlockEvent, Height, RawBlock};

/// Sink for block events.
///
/// Called exactly once per dispatched event, in dispatcher order. The whole
/// pipeline waits on `apply`, so implementations must not block for long.
/// There is no error channel: a connector handles (logs, retries, drops)
/// its own failures.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn apply(&self, event: BlockEvent);
}

/// Domain logic that turns a raw block into a [`BlockEvent`].
#[async_trait]
pub trait Processor: Send + Sync {
    /// Build the event shell for a block. Override to pre-seed the payload.
    fn new_block_event(&self, number: Height, parent_hash: String, hash: String) -> BlockEvent {
        BlockEvent::new(number, parent_hash, hash)
    }

    /// Populate the event payload from the raw block.
    ///
    /// An error drops the block the same way a failed fetch does.
    async fn process(&self, block: &RawBlock, event: &mut BlockEvent) -> Result<(), IngestError>;
}
