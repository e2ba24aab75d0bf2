//! Error types for the chainingest pipeline.

use thiserror::Error;

/// Errors that can occur while ingesting blocks.
///
/// Transient node failures never surface here: the fetcher logs them and
/// skips the height. What remains is mostly configuration problems and a
/// broken pipeline; [`is_fatal`](Self::is_fatal) separates those from the
/// few errors a reconnect recovers from.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Unknown sync mode '{0}' (expected \"normal\" or \"fast\")")]
    UnknownSyncMode(String),

    #[error("Invalid block height '{0}'")]
    InvalidHeight(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot read latest header: {0}")]
    LatestHeader(String),

    #[error("Cannot subscribe to new heads: {0}")]
    Subscription(String),

    #[error("New head subscription closed")]
    SubscriptionClosed,

    #[error("Engine is not connected")]
    NotConnected,

    #[error("Event dispatcher is gone")]
    DispatcherClosed,

    #[error("Processor rejected block: {0}")]
    Processor(String),
}

impl IngestError {
    /// Returns `true` if the engine cannot continue after this error.
    ///
    /// A failed RPC call or a closed head stream is recovered by
    /// reconnecting; a processor rejection only drops one block.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Rpc(_) | Self::SubscriptionClosed | Self::Processor(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(!IngestError::Rpc("timeout".into()).is_fatal());
        assert!(!IngestError::SubscriptionClosed.is_fatal());
        assert!(!IngestError::Processor("no transactions".into()).is_fatal());
        assert!(IngestError::UnknownSyncMode("turbo".into()).is_fatal());
        assert!(IngestError::Subscription("refused".into()).is_fatal());
        assert!(IngestError::DispatcherClosed.is_fatal());
    }

    #[test]
    fn unknown_mode_message_names_the_mode() {
        let msg = IngestError::UnknownSyncMode("turbo".into()).to_string();
        assert!(msg.contains("turbo"));
    }
}
