//! Shared fixtures for the engine integration tests: an in-memory node and a
//! connector that records what it was handed.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::{json, Value};

use chainingest_core::handler::Connector;
use chainingest_core::types::{to_hex_quantity, BlockEvent, BlockHeader, Height, RawBlock};
use chainingest_rpc::{HeadSender, HeadSubscription, NodeClient, TransportError};

// ─── Helpers ──────────────────────────────────────────────────────────────────

pub fn h(n: u64) -> Height {
    BigUint::from(n)
}

pub fn to_u64(n: &Height) -> u64 {
    u64::try_from(n).expect("height fits in u64")
}

/// Canonical hash of block `n` on the mock chain.
pub fn hash_of(n: u64) -> String {
    format!("0x{n:064x}")
}

/// A `newHeads` notification payload.
pub fn head_json(n: u64) -> Value {
    json!({
        "number": to_hex_quantity(&h(n)),
        "hash": hash_of(n),
        "parentHash": hash_of(n.saturating_sub(1)),
    })
}

// ─── MockNode ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Chain {
    latest: u64,
    /// Blocks whose parent hash differs from the canonical chain.
    parents: HashMap<u64, String>,
    failing_bodies: HashSet<u64>,
    failing_hashes: HashSet<u64>,
    delays: HashMap<u64, Duration>,
    fetched: Vec<u64>,
    heads: Option<HeadSubscription>,
    head_calls: usize,
    latest_fails: bool,
}

/// In-memory node. Every height up to `u64::MAX` exists; block `n` has hash
/// [`hash_of(n)`](hash_of) and, unless overridden, parent `hash_of(n - 1)`.
#[derive(Clone, Default)]
pub struct MockNode {
    chain: Arc<Mutex<Chain>>,
}

impl MockNode {
    pub fn new(latest: u64) -> Self {
        let node = Self::default();
        node.set_latest(latest);
        node
    }

    pub fn set_latest(&self, latest: u64) {
        self.chain.lock().unwrap().latest = latest;
    }

    pub fn set_parent(&self, n: u64, parent_hash: &str) {
        self.chain.lock().unwrap().parents.insert(n, parent_hash.to_string());
    }

    pub fn fail_latest(&self) {
        self.chain.lock().unwrap().latest_fails = true;
    }

    pub fn fail_body(&self, n: u64) {
        self.chain.lock().unwrap().failing_bodies.insert(n);
    }

    pub fn fail_hash(&self, n: u64) {
        self.chain.lock().unwrap().failing_hashes.insert(n);
    }

    pub fn delay(&self, n: u64, d: Duration) {
        self.chain.lock().unwrap().delays.insert(n, d);
    }

    /// Heights requested through `block_by_number`, in call order.
    pub fn fetched(&self) -> Vec<u64> {
        self.chain.lock().unwrap().fetched.clone()
    }

    pub fn latest_header_calls(&self) -> usize {
        self.chain.lock().unwrap().head_calls
    }

    /// Prepare the stream handed out by the next `subscribe_new_heads`.
    pub fn heads(&self) -> HeadSender {
        let (tx, sub) = HeadSubscription::channel();
        self.chain.lock().unwrap().heads = Some(sub);
        tx
    }

    pub fn client(&self) -> Arc<dyn NodeClient> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn block_by_number(&self, number: &Height) -> Result<RawBlock, TransportError> {
        let n = to_u64(number);
        let (delay, parent, failing) = {
            let mut chain = self.chain.lock().unwrap();
            chain.fetched.push(n);
            (
                chain.delays.get(&n).copied(),
                chain.parents.get(&n).cloned(),
                chain.failing_bodies.contains(&n),
            )
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if failing {
            return Err(TransportError::NotFound {
                what: format!("block {n}"),
            });
        }
        let body = json!({
            "number": to_hex_quantity(number),
            "hash": hash_of(n),
            "parentHash": parent.unwrap_or_else(|| hash_of(n.saturating_sub(1))),
            "timestamp": "0x65a0b2c0",
            "transactions": [{"hash": "0x01"}, {"hash": "0x02"}],
        });
        RawBlock::from_json(body).ok_or(TransportError::Malformed { what: "block".into() })
    }

    async fn block_hash(&self, number: &Height) -> Result<String, TransportError> {
        let n = to_u64(number);
        if self.chain.lock().unwrap().failing_hashes.contains(&n) {
            return Err(TransportError::WebSocket("connection reset".into()));
        }
        Ok(hash_of(n))
    }

    async fn latest_header(&self) -> Result<BlockHeader, TransportError> {
        let latest = {
            let mut chain = self.chain.lock().unwrap();
            chain.head_calls += 1;
            if chain.latest_fails {
                return Err(TransportError::WebSocket("node unreachable".into()));
            }
            chain.latest
        };
        Ok(BlockHeader {
            number: h(latest),
            hash: hash_of(latest),
            parent_hash: hash_of(latest.saturating_sub(1)),
        })
    }

    async fn subscribe_new_heads(&self) -> Result<HeadSubscription, TransportError> {
        self.chain
            .lock()
            .unwrap()
            .heads
            .take()
            .ok_or(TransportError::Closed)
    }

    fn url(&self) -> &str {
        "mock://node"
    }
}

// ─── RecordingConnector ───────────────────────────────────────────────────────

/// Records every event it is handed, in arrival order.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    events: Arc<Mutex<Vec<BlockEvent>>>,
}

impl RecordingConnector {
    pub fn events(&self) -> Vec<BlockEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn heights(&self) -> Vec<u64> {
        self.events().iter().map(|e| to_u64(e.number())).collect()
    }

    pub fn forks(&self) -> Vec<u64> {
        self.events()
            .iter()
            .filter(|e| e.is_fork())
            .map(|e| to_u64(e.number()))
            .collect()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn apply(&self, event: BlockEvent) {
        self.events.lock().unwrap().push(event);
    }
}
