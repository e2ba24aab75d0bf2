//! chainingest-engine: historical sync, live head tracking and event
//! dispatch on top of a [`NodeClient`](chainingest_rpc::NodeClient).

pub mod builder;
pub mod dispatcher;
pub mod engine;
pub mod fetcher;
pub mod listener;
pub mod queue;
pub mod sync;

pub use builder::EngineBuilder;
pub use dispatcher::EventDispatcher;
pub use engine::Engine;
pub use fetcher::BlockFetcher;
pub use listener::LiveListener;
pub use queue::{event_queue, EventReceiver, EventSender};
pub use sync::SyncController;
