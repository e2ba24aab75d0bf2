//! WebSocket JSON-RPC node client.
//!
//! A background task owns the socket: it writes requests, matches responses
//! to callers by ID and routes `eth_subscription` notifications. The client
//! does not reconnect. When the socket drops, pending calls fail, every
//! subscription receives an error followed by end of stream, and later calls
//! return [`TransportError::Closed`]; recovering is the supervisor's job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chainingest_core::types::{to_hex_quantity, BlockHeader, Height, RawBlock};

use crate::error::TransportError;
use crate::node::{HeadSubscription, NodeClient};
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId, SubscriptionNotification};
use crate::subscriptions::{SubscriptionId, SubscriptionManager};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: Reply },
    Close,
}

/// The `{ "hash": … }` slice of `eth_getBlockByNumber(n, false)`.
#[derive(Deserialize)]
struct RpcBlockHash {
    hash: String,
}

/// WebSocket JSON-RPC client for an Ethereum-style node.
pub struct WsNodeClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    next_id: AtomicU64,
}

impl WsNodeClient {
    /// Dial `url` and start the background task.
    ///
    /// Fails if the handshake fails; the caller decides whether to retry.
    pub async fn connect(url: impl Into<String>) -> Result<Self, TransportError> {
        let url = url.into();
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        tracing::info!(url = %url, "connected via WebSocket");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionManager::new();
        tokio::spawn(ws_task(url.clone(), socket, cmd_rx, subscriptions.clone()));

        Ok(Self {
            url,
            cmd_tx,
            subscriptions,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call a method and deserialize its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::Closed)?;
        let resp = rx.await.map_err(|_| TransportError::Closed)??;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        Ok(serde_json::from_value(result)?)
    }
}

impl Drop for WsNodeClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl NodeClient for WsNodeClient {
    async fn block_by_number(&self, number: &Height) -> Result<RawBlock, TransportError> {
        let body: Option<Value> = self
            .call("eth_getBlockByNumber", vec![json!(to_hex_quantity(number)), json!(true)])
            .await?;
        let body = body.ok_or_else(|| TransportError::NotFound {
            what: format!("block {number}"),
        })?;
        RawBlock::from_json(body).ok_or_else(|| TransportError::Malformed {
            what: format!("block {number}"),
        })
    }

    async fn block_hash(&self, number: &Height) -> Result<String, TransportError> {
        let head: Option<RpcBlockHash> = self
            .call("eth_getBlockByNumber", vec![json!(to_hex_quantity(number)), json!(false)])
            .await?;
        head.map(|h| h.hash).ok_or_else(|| TransportError::NotFound {
            what: format!("block {number}"),
        })
    }

    async fn latest_header(&self) -> Result<BlockHeader, TransportError> {
        let raw: Option<Value> = self
            .call("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
            .await?;
        let raw = raw.ok_or_else(|| TransportError::NotFound {
            what: "latest block".into(),
        })?;
        BlockHeader::from_json(&raw).ok_or_else(|| TransportError::Malformed {
            what: "latest header".into(),
        })
    }

    async fn subscribe_new_heads(&self) -> Result<HeadSubscription, TransportError> {
        let id: String = self.call("eth_subscribe", vec![json!("newHeads")]).await?;
        tracing::info!(subscription = %id, "subscribed to new heads");
        Ok(self.subscriptions.register(SubscriptionId(id)))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(
    url: String,
    socket: Socket,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    subscriptions: SubscriptionManager,
) {
    let mut pending: HashMap<u64, Reply> = HashMap::new();
    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = sink.close().await;
                        break "client dropped".to_string();
                    }
                    Some(WsCommand::Send { req, tx }) => {
                        let id = match &req.id { RpcId::Number(n) => *n, _ => 0 };
                        let msg = match serde_json::to_string(&req) {
                            Ok(msg) => msg,
                            Err(e) => {
                                let _ = tx.send(Err(e.into()));
                                continue;
                            }
                        };
                        pending.insert(id, tx);
                        if let Err(e) = sink.send(Message::Text(msg.into())).await {
                            break e.to_string();
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break "stream closed".to_string(),
                    Some(Err(e)) => break e.to_string(),
                    Some(Ok(Message::Text(text))) => {
                        handle_message(text.as_str(), &mut pending, &subscriptions);
                    }
                    Some(Ok(Message::Close(_))) => break "closed by node".to_string(),
                    _ => {}
                }
            }
        }
    };

    tracing::warn!(
        url = %url,
        reason = %reason,
        pending = pending.len(),
        subscriptions = subscriptions.len(),
        "WS connection ended"
    );
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(TransportError::WebSocket(reason.clone())));
    }
    subscriptions.fail_all(&reason);
}

fn handle_message(text: &str, pending: &mut HashMap<u64, Reply>, subscriptions: &SubscriptionManager) {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return;
    };

    if val.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        match serde_json::from_value::<SubscriptionNotification>(val) {
            Ok(n) => subscriptions.dispatch(&SubscriptionId(n.params.subscription), n.params.result),
            Err(e) => tracing::debug!(error = %e, "malformed subscription notification"),
        }
        return;
    }

    match serde_json::from_value::<JsonRpcResponse>(val) {
        Ok(resp) => {
            let RpcId::Number(id) = resp.id else {
                return;
            };
            if let Some(tx) = pending.remove(&id) {
                let _ = tx.send(Ok(resp));
            }
        }
        Err(e) => tracing::debug!(error = %e, "unrecognised WS message"),
    }
}
