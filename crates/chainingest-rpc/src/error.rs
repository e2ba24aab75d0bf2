//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The node answered `null` where an object was expected.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The node answered with something we could not decode.
    #[error("Malformed {what} in response")]
    Malformed { what: String },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The connection task has shut down.
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Returns `true` if this error is transient (retrying later could succeed).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WebSocket(_) | Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(TransportError::WebSocket("reset".into()).is_retryable());
        assert!(!TransportError::Closed.is_retryable());
        let rpc = TransportError::Rpc(JsonRpcError {
            code: -32601,
            message: "method not found".into(),
            data: None,
        });
        assert!(!rpc.is_retryable());
        assert_eq!(rpc.to_string(), "RPC error -32601: method not found");
    }
}
