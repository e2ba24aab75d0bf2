//! The engine: composition root owning boundaries, status, queue and
//! collaborators.
//!
//! Lifecycle: [`connect`](Engine::connect) (dials until it succeeds, starts
//! the dispatcher once) → [`init`](Engine::init) (historical sync up to the
//! head seen at init time) → [`listen`](Engine::listen) (follows new heads
//! forever).
//!
//! [`run`](Engine::run) drives the whole lifecycle. When the head stream is
//! lost it redials and resumes listening from the saved `end`; history is
//! not replayed again. Any fatal error ends the run.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use num_traits::Zero;
use tokio::task::JoinHandle;

use chainingest_core::config::{EngineConfig, EngineState};
use chainingest_core::error::IngestError;
use chainingest_core::fork::ForkWatcher;
use chainingest_core::handler::{Connector, Processor};
use chainingest_core::range::BlockRange;
use chainingest_core::status::{StatusHandle, SyncStatus};
use chainingest_core::types::{parse_height, Height};
use chainingest_rpc::{NodeClient, TransportError, WsNodeClient};

use crate::dispatcher::EventDispatcher;
use crate::fetcher::BlockFetcher;
use crate::listener::LiveListener;
use crate::queue::{event_queue, EventReceiver, EventSender};
use crate::sync::SyncController;

pub struct Engine {
    config: EngineConfig,
    start: Height,
    /// Last height to replay before `init`; next height to fetch after it.
    /// Zero before `init` means "the head at init time".
    end: Height,
    state: EngineState,
    status: StatusHandle,
    queue: EventSender,
    /// Taken exactly once, when the dispatcher starts.
    pending_rx: Option<EventReceiver>,
    dispatcher: Option<JoinHandle<()>>,
    connector: Option<Arc<dyn Connector>>,
    processor: Option<Arc<dyn Processor>>,
    fork: ForkWatcher,
    client: Option<Arc<dyn NodeClient>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, IngestError> {
        config.validate()?;
        let (queue, rx) = event_queue();
        Ok(Self {
            start: config.start.clone(),
            end: config.end.clone(),
            state: EngineState::Disconnected,
            status: StatusHandle::new(),
            queue,
            pending_rx: Some(rx),
            dispatcher: None,
            connector: None,
            processor: None,
            fork: ForkWatcher::new(config.max_fork_size),
            client: None,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The connected node client, if any.
    pub fn client(&self) -> Option<Arc<dyn NodeClient>> {
        self.client.clone()
    }

    /// Snapshot of the shared status.
    pub fn status(&self) -> SyncStatus {
        self.status.snapshot()
    }

    /// Handle for polling the status from other tasks.
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Current `[start, end]` boundaries.
    pub fn range(&self) -> BlockRange {
        BlockRange::new(self.start.clone(), self.end.clone())
    }

    /// Set the first height to replay from a decimal string. With
    /// `plus_one`, `val` is the last height already processed and replay
    /// resumes right after it.
    pub fn set_start(&mut self, val: &str, plus_one: bool) -> Result<(), IngestError> {
        let start = parse_height(val)?;
        self.start = if plus_one { start + 1u32 } else { start };
        Ok(())
    }

    /// Set the last height to replay from a decimal string; `"0"` means the
    /// chain head at init time.
    pub fn set_end(&mut self, val: &str) -> Result<(), IngestError> {
        self.end = parse_height(val)?;
        Ok(())
    }

    /// Install the connector. Must happen before `connect`.
    pub fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        if self.dispatcher.is_some() {
            tracing::warn!("Connector set after the dispatcher started; it will not be used");
        }
        self.connector = Some(connector);
    }

    pub fn set_processor(&mut self, processor: Arc<dyn Processor>) {
        self.processor = Some(processor);
    }

    /// Current chain head height.
    pub async fn latest(&self) -> Result<Height, IngestError> {
        let header = self
            .require_client()?
            .latest_header()
            .await
            .map_err(|e| IngestError::Rpc(e.to_string()))?;
        Ok(header.number)
    }

    /// Dial the configured node over WebSocket, retrying forever with the
    /// configured fixed delay, then start the dispatcher.
    pub async fn connect(&mut self) -> Arc<dyn NodeClient> {
        let dial = Self::ws_dialer(self.config.url.clone());
        self.connect_with(dial).await
    }

    fn ws_dialer(url: String) -> impl FnMut() -> BoxFuture<'static, Result<Arc<dyn NodeClient>, TransportError>> {
        move || {
            let url = url.clone();
            async move {
                let client = WsNodeClient::connect(url).await?;
                Ok::<_, TransportError>(Arc::new(client) as Arc<dyn NodeClient>)
            }
            .boxed()
        }
    }

    /// Like [`connect`](Self::connect) with a caller-supplied dialer.
    pub async fn connect_with<F, Fut>(&mut self, mut dial: F) -> Arc<dyn NodeClient>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Arc<dyn NodeClient>, TransportError>>,
    {
        self.state = EngineState::Connecting;
        let delay = self.config.connect_retry();
        let client = loop {
            match dial().await {
                Ok(client) => break client,
                Err(e) => {
                    tracing::warn!(
                        url = %self.config.url,
                        error = %e,
                        retryable = e.is_retryable(),
                        retry_in = ?delay,
                        "Node connection failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };
        self.attach(Arc::clone(&client));
        client
    }

    /// Use an already connected client and start the dispatcher.
    pub fn attach(&mut self, client: Arc<dyn NodeClient>) {
        tracing::info!(url = %client.url(), "Node connected");
        self.client = Some(client);
        self.status.set_connected(true);
        if matches!(self.state, EngineState::Disconnected | EngineState::Connecting) {
            self.state = EngineState::Connected;
        }
        self.initialize();
    }

    /// Start the dispatcher. Later calls are no-ops.
    fn initialize(&mut self) {
        let Some(rx) = self.pending_rx.take() else {
            return;
        };
        let dispatcher = EventDispatcher::new(self.connector.clone(), self.status.clone());
        self.dispatcher = Some(dispatcher.spawn(rx));
    }

    fn require_client(&self) -> Result<Arc<dyn NodeClient>, IngestError> {
        self.client.clone().ok_or(IngestError::NotConnected)
    }

    fn fetcher(&self) -> Result<BlockFetcher, IngestError> {
        Ok(BlockFetcher::new(self.require_client()?, self.processor.clone()))
    }

    /// Replay `[start, end]` (or `[start, head]` if no end was set), then
    /// position `end` right after the head seen at the start of this call.
    ///
    /// An unreachable head is fatal.
    pub async fn init(&mut self) -> Result<(), IngestError> {
        let last = self
            .require_client()?
            .latest_header()
            .await
            .map_err(|e| IngestError::LatestHeader(e.to_string()))?
            .number;
        if self.end.is_zero() {
            self.end = last.clone();
        }

        self.state = EngineState::HistoricalSync;
        let controller = SyncController::new(
            Arc::new(self.fetcher()?),
            self.queue.clone(),
            self.status.clone(),
            self.config.sync_mode,
            self.config.sync_thread_pool,
            self.config.sync_thread_size,
        );
        controller.sync(&self.range()).await?;

        self.end = last + 1u32;
        Ok(())
    }

    /// Follow new heads. Returns only when following stops: the
    /// subscription could not be opened, it closed, or the dispatcher is
    /// gone. A closed subscription is not fatal; `end` still points at the
    /// next height to fetch, so calling `listen` again on a fresh client
    /// picks up where this one stopped.
    pub async fn listen(&mut self) -> Result<(), IngestError> {
        let heads = self
            .require_client()?
            .subscribe_new_heads()
            .await
            .map_err(|e| IngestError::Subscription(e.to_string()))?;
        let fetcher = self.fetcher()?;

        self.state = EngineState::LiveListening;
        tracing::info!(from = %self.end, "Listening for new heads");
        let mut listener = LiveListener::new(&fetcher, &mut self.fork, &self.queue);
        listener.listen(&mut self.end, heads).await
    }

    /// `connect`, `init`, then `listen`, redialing whenever listening
    /// stops on a non-fatal error. Returns the first fatal error.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        let dial = Self::ws_dialer(self.config.url.clone());
        self.run_with(dial).await
    }

    /// Like [`run`](Self::run) with a caller-supplied dialer.
    pub async fn run_with<F, Fut>(&mut self, mut dial: F) -> Result<(), IngestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Arc<dyn NodeClient>, TransportError>>,
    {
        self.connect_with(&mut dial).await;
        self.init().await?;
        loop {
            match self.listen().await {
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(error = %e, resume_from = %self.end, "Lost new heads, reconnecting");
                    self.client = None;
                    self.status.set_connected(false);
                    self.connect_with(&mut dial).await;
                }
                other => return other,
            }
        }
    }
}
