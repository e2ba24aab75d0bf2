//! Fluent builder API for creating engines.
//!
//! # Example
//!
//! ```rust,no_run
//! use chainingest_engine::EngineBuilder;
//! use chainingest_core::SyncMode;
//!
//! # async fn run() -> Result<(), chainingest_core::IngestError> {
//! let mut engine = EngineBuilder::new()
//!     .url("wss://mainnet.example.org/ws")
//!     .sync_mode(SyncMode::Fast)
//!     .sync_thread_pool(8)
//!     .sync_thread_size(50)
//!     .start_after(19_000_000u64)
//!     .build()?;
//! engine.run().await
//! # }
//! ```

use std::sync::Arc;

use chainingest_core::config::{EngineConfig, SyncMode};
use chainingest_core::error::IngestError;
use chainingest_core::handler::{Connector, Processor};
use chainingest_core::types::Height;

use crate::engine::Engine;

/// Fluent builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    connector: Option<Arc<dyn Connector>>,
    processor: Option<Arc<dyn Processor>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set the node WebSocket URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    /// Set the number of concurrent fast-sync workers per chunk.
    pub fn sync_thread_pool(mut self, pool: usize) -> Self {
        self.config.sync_thread_pool = pool;
        self
    }

    /// Set the number of heights each fast-sync worker fetches per chunk.
    pub fn sync_thread_size(mut self, size: usize) -> Self {
        self.config.sync_thread_size = size;
        self
    }

    /// Set the fork window length.
    pub fn max_fork_size(mut self, size: usize) -> Self {
        self.config.max_fork_size = size;
        self
    }

    /// Set the first height to replay.
    pub fn start(mut self, height: impl Into<Height>) -> Self {
        self.config.start = height.into();
        self
    }

    /// Resume right after `height`, the last height already processed.
    pub fn start_after(mut self, height: impl Into<Height>) -> Self {
        self.config.start = height.into() + 1u32;
        self
    }

    /// Set the last height to replay (0 = chain head at init time).
    pub fn end(mut self, height: impl Into<Height>) -> Self {
        self.config.end = height.into();
        self
    }

    /// Set the fixed delay between connection attempts.
    pub fn connect_retry_ms(mut self, ms: u64) -> Self {
        self.config.connect_retry_ms = ms;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Build the `EngineConfig` only.
    pub fn build_config(self) -> EngineConfig {
        self.config
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Engine, IngestError> {
        let mut engine = Engine::new(self.config)?;
        if let Some(connector) = self.connector {
            engine.set_connector(connector);
        }
        if let Some(processor) = self.processor {
            engine.set_processor(processor);
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn builder_defaults() {
        let cfg = EngineBuilder::new().build_config();
        assert_eq!(cfg.sync_mode, SyncMode::Normal);
        assert_eq!(cfg.max_fork_size, 128);
        assert_eq!(cfg.connect_retry_ms, 5_000);
        assert_eq!(cfg.end, BigUint::from(0u32));
    }

    #[test]
    fn builder_custom() {
        let cfg = EngineBuilder::new()
            .url("ws://node:8546")
            .sync_mode(SyncMode::Fast)
            .sync_thread_pool(8)
            .sync_thread_size(50)
            .max_fork_size(64)
            .start_after(19_000_000u64)
            .end(19_500_000u64)
            .build_config();

        assert_eq!(cfg.url, "ws://node:8546");
        assert_eq!(cfg.sync_mode, SyncMode::Fast);
        assert_eq!(cfg.sync_thread_pool, 8);
        assert_eq!(cfg.sync_thread_size, 50);
        assert_eq!(cfg.max_fork_size, 64);
        assert_eq!(cfg.start, BigUint::from(19_000_001u64));
        assert_eq!(cfg.end, BigUint::from(19_500_000u64));
    }

    #[test]
    fn build_rejects_empty_fast_pool() {
        let res = EngineBuilder::new()
            .sync_mode(SyncMode::Fast)
            .sync_thread_size(0)
            .build();
        assert!(matches!(res, Err(IngestError::InvalidConfig(_))));
    }
}
