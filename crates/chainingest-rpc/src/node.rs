//! The `NodeClient` trait: everything the engine needs from a chain node.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use chainingest_core::types::{BlockHeader, Height, RawBlock};

use crate::error::TransportError;

/// Access to a remote chain node.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the engine shares one client
/// between all fast-sync workers as `Arc<dyn NodeClient>`.
#[async_trait]
pub trait NodeClient: Send + Sync + 'static {
    /// Full block body at `number`, transactions included.
    async fn block_by_number(&self, number: &Height) -> Result<RawBlock, TransportError>;

    /// The node's canonical hash for the block at `number`, fetched with a
    /// direct `eth_getBlockByNumber(number, false)` call.
    async fn block_hash(&self, number: &Height) -> Result<String, TransportError>;

    /// Header of the current chain head.
    async fn latest_header(&self) -> Result<BlockHeader, TransportError>;

    /// Subscribe to new block headers.
    async fn subscribe_new_heads(&self) -> Result<HeadSubscription, TransportError>;

    /// The endpoint this client talks to.
    fn url(&self) -> &str;
}

/// Sending half of a [`HeadSubscription`]; one message per notification.
pub type HeadSender = mpsc::UnboundedSender<Result<Value, TransportError>>;

/// A stream of new-head notifications.
///
/// Each item is either a header or a subscription error. Errors do not end
/// the stream; `None` does.
pub struct HeadSubscription {
    rx: mpsc::UnboundedReceiver<Result<Value, TransportError>>,
}

impl HeadSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<Value, TransportError>>) -> Self {
        Self { rx }
    }

    /// A subscription fed by hand.
    pub fn channel() -> (HeadSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Wait for the next notification.
    pub async fn next(&mut self) -> Option<Result<BlockHeader, TransportError>> {
        let item = self.rx.recv().await?;
        Some(item.and_then(|raw| {
            BlockHeader::from_json(&raw).ok_or_else(|| TransportError::Malformed {
                what: "new head".into(),
            })
        }))
    }
}
