//! Engine configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::types::{height_string, Height};

/// Historical sync strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// One height at a time, strictly in order.
    #[default]
    Normal,
    /// Parallel workers per chunk, ordered only at chunk granularity.
    Fast,
}

impl FromStr for SyncMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "fast" => Ok(Self::Fast),
            other => Err(IngestError::UnknownSyncMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

/// Configuration for an engine instance. Set before connecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// WebSocket JSON-RPC endpoint of the node.
    pub url: String,
    pub sync_mode: SyncMode,
    /// Concurrent workers per fast-sync chunk.
    pub sync_thread_pool: usize,
    /// Heights per fast-sync worker.
    pub sync_thread_size: usize,
    /// Fork window length; also the deepest reorg that can be flagged.
    pub max_fork_size: usize,
    /// First height to replay (inclusive).
    #[serde(with = "height_string")]
    pub start: Height,
    /// Last height to replay (inclusive). Zero means "up to the chain head
    /// at init time".
    #[serde(with = "height_string")]
    pub end: Height,
    /// Fixed delay between connection attempts (milliseconds).
    pub connect_retry_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8546".into(),
            sync_mode: SyncMode::Normal,
            sync_thread_pool: 4,
            sync_thread_size: 25,
            max_fork_size: 128,
            start: Height::default(),
            end: Height::default(),
            connect_retry_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.url.is_empty() {
            return Err(IngestError::InvalidConfig("node url is empty".into()));
        }
        if self.sync_mode == SyncMode::Fast
            && (self.sync_thread_pool == 0 || self.sync_thread_size == 0)
        {
            return Err(IngestError::InvalidConfig(format!(
                "fast sync needs a non-zero pool and size (pool={}, size={})",
                self.sync_thread_pool, self.sync_thread_size
            )));
        }
        Ok(())
    }
}

/// Lifecycle of an engine. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Disconnected,
    Connecting,
    /// Connected and the dispatcher is running.
    Connected,
    HistoricalSync,
    /// Follows new heads. A lost stream drops back to `Connecting`.
    LiveListening,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::HistoricalSync => write!(f, "historical-sync"),
            Self::LiveListening => write!(f, "live"),
        }
    }
}
