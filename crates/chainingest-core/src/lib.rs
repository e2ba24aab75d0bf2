//! chainingest-core: foundation for the block-ingestion engine.
//!
//! # Architecture
//!
//! ```text
//! Engine ─┬─ SyncController  (historical replay: normal | fast)
//!         ├─ LiveListener    (new heads → catch-up)
//!         │     └─ ForkWatcher   (bounded window, parent-hash check)
//!         ├─ BlockFetcher    (node → Processor → BlockEvent)
//!         └─ EventDispatcher (queue → Connector, status)
//! ```
//!
//! This crate holds the pieces with no I/O: event and block types, height
//! ranges and chunk planning, the fork window, shared status, configuration
//! and the user-facing [`Connector`] / [`Processor`] traits.

pub mod config;
pub mod error;
pub mod fork;
pub mod handler;
pub mod range;
pub mod status;
pub mod types;

pub use config::{EngineConfig, EngineState, SyncMode};
pub use error::IngestError;
pub use fork::{ForkRecord, ForkWatcher, ForkWindow};
pub use handler::{Connector, Processor};
pub use range::{sync_percent, BlockRange, Chunk};
pub use status::{StatusHandle, SyncStatus};
pub use types::{BlockEvent, BlockHeader, Height, RawBlock};
