//! chainingest-rpc: node access for the ingestion engine.
//!
//! - [`NodeClient`]: the async trait the engine fetches blocks through
//! - [`HeadSubscription`]: new-head notification stream
//! - [`WsNodeClient`]: WebSocket JSON-RPC implementation
//! - [`TransportError`]: structured error type

pub mod error;
pub mod node;
pub mod request;
pub mod subscriptions;
pub mod ws;

pub use error::TransportError;
pub use node::{HeadSender, HeadSubscription, NodeClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use subscriptions::{SubscriptionId, SubscriptionManager};
pub use ws::WsNodeClient;
