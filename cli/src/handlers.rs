//! The connector and processor the `run` command wires into the engine.

use async_trait::async_trait;

use chainingest_core::error::IngestError;
use chainingest_core::handler::{Connector, Processor};
use chainingest_core::types::{BlockEvent, RawBlock};

/// Writes every event as one JSON log line.
pub struct LogConnector;

#[async_trait]
impl Connector for LogConnector {
    async fn apply(&self, event: BlockEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => tracing::info!(target: "chainingest::events", fork = event.is_fork(), "{line}"),
            Err(e) => tracing::warn!(block = %event.number(), error = %e, "Event not serializable"),
        }
    }
}

/// Records the transaction count and timestamp of each block. A body
/// without a `transactions` list is rejected.
pub struct TxCountProcessor;

#[async_trait]
impl Processor for TxCountProcessor {
    async fn process(&self, block: &RawBlock, event: &mut BlockEvent) -> Result<(), IngestError> {
        if !block.body["transactions"].is_array() {
            return Err(IngestError::Processor(format!(
                "block {} has no transactions list",
                block.number
            )));
        }
        event.insert("tx_count", block.tx_count());
        if let Some(ts) = block.timestamp {
            event.insert("timestamp", ts);
        }
        event.insert("time", block.formatted_time());
        Ok(())
    }
}
