//! Shared types for the ingestion pipeline.

use num_bigint::BigUint;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::IngestError;

/// A block height. Heights are unbounded, so every piece of range
/// arithmetic in the workspace goes through `BigUint`.
pub type Height = BigUint;

// ─── Height helpers ───────────────────────────────────────────────────────────

/// Parse a decimal height as supplied by the caller (`"19000000"`).
pub fn parse_height(s: &str) -> Result<Height, IngestError> {
    let trimmed = s.trim();
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| IngestError::InvalidHeight(s.to_string()))
}

/// Parse a JSON-RPC hex quantity (`"0x12a05f200"`) into a height.
pub fn parse_hex_height(s: &str) -> Option<Height> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    BigUint::parse_bytes(digits.as_bytes(), 16)
}

/// Encode a height as a JSON-RPC hex quantity (no leading zeros).
pub fn to_hex_quantity(n: &Height) -> String {
    format!("0x{n:x}")
}

/// Parse a hex-encoded string (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// Serde helpers that carry a height as a decimal string.
pub mod height_string {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&n.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_height(&raw).map_err(serde::de::Error::custom)
    }
}

// ─── BlockHeader ──────────────────────────────────────────────────────────────

/// The fields of a block header the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: Height,
    pub hash: String,
    pub parent_hash: String,
}

impl BlockHeader {
    /// Convert a JSON header (as sent by `newHeads` or `eth_getBlockByNumber`).
    pub fn from_json(v: &Value) -> Option<Self> {
        Some(Self {
            number: parse_hex_height(v["number"].as_str()?)?,
            hash: v["hash"].as_str().unwrap_or_default().to_string(),
            parent_hash: v["parentHash"].as_str()?.to_string(),
        })
    }
}

// ─── RawBlock ─────────────────────────────────────────────────────────────────

/// A full block body as returned by the node.
///
/// The decoded header fields are lifted out; everything else stays in `body`
/// for the [`Processor`](crate::handler::Processor) to interpret.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub number: Height,
    /// Hash as reported inside the body; not necessarily the canonical one.
    pub hash: String,
    pub parent_hash: String,
    /// Unix timestamp (seconds); `None` if the node sent none or it did not
    /// parse.
    pub timestamp: Option<u64>,
    pub body: Value,
}

impl RawBlock {
    /// Convert a JSON block (`eth_getBlockByNumber(n, true)`).
    pub fn from_json(body: Value) -> Option<Self> {
        let header = BlockHeader::from_json(&body)?;
        let timestamp = body["timestamp"].as_str().and_then(parse_hex_u64);
        if timestamp.is_none() {
            tracing::debug!(block = %header.number, raw = %body["timestamp"], "Unreadable block timestamp");
        }
        Some(Self {
            number: header.number,
            hash: header.hash,
            parent_hash: header.parent_hash,
            timestamp,
            body,
        })
    }

    /// Number of transactions in the block.
    pub fn tx_count(&self) -> usize {
        self.body["transactions"].as_array().map(Vec::len).unwrap_or(0)
    }

    /// The block timestamp formatted for log lines, `"unknown"` without one.
    pub fn formatted_time(&self) -> String {
        let Some(ts) = self.timestamp else {
            return "unknown".to_string();
        };
        i64::try_from(ts)
            .ok()
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|t| t.format("%Y.%m.%d %H:%M:%S").to_string())
            .unwrap_or_else(|| ts.to_string())
    }
}

// ─── BlockEvent ───────────────────────────────────────────────────────────────

/// One block's worth of output, handed to the [`Connector`](crate::handler::Connector).
///
/// The metadata (height, hashes, fork flag) is owned by the engine; the
/// payload belongs to whatever `Processor` populated it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockEvent {
    #[serde(with = "height_string")]
    number: Height,
    parent_hash: String,
    hash: String,
    is_fork: bool,
    payload: Map<String, Value>,
}

impl BlockEvent {
    pub fn new(number: Height, parent_hash: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            number,
            parent_hash: parent_hash.into(),
            hash: hash.into(),
            is_fork: false,
            payload: Map::new(),
        }
    }

    pub fn number(&self) -> &Height {
        &self.number
    }

    pub fn parent_hash(&self) -> &str {
        &self.parent_hash
    }

    /// Canonical hash; empty if the node could not provide it.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `true` if this block does not extend the chain seen so far.
    pub fn is_fork(&self) -> bool {
        self.is_fork
    }

    pub fn set_fork(&mut self, fork: bool) {
        self.is_fork = fork;
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.payload
    }

    /// Set a single payload field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(key.into(), value.into());
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
