//! Event dispatcher: the single consumer of the event queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;

use chainingest_core::handler::Connector;
use chainingest_core::status::StatusHandle;

use crate::queue::EventReceiver;

/// Applies the connector to each event in arrival order and records the
/// consumed height in the shared status.
pub struct EventDispatcher {
    connector: Option<Arc<dyn Connector>>,
    status: StatusHandle,
}

impl EventDispatcher {
    pub fn new(connector: Option<Arc<dyn Connector>>, status: StatusHandle) -> Self {
        Self { connector, status }
    }

    /// Run on its own task.
    pub fn spawn(self, rx: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Drain `rx` until every producer is gone.
    ///
    /// A panicking connector is logged and the loop carries on with the
    /// next event.
    pub async fn run(self, mut rx: EventReceiver) {
        while let Some(delivery) = rx.recv().await {
            let (event, done) = delivery.into_parts();
            let number = event.number().clone();
            if let Some(connector) = &self.connector {
                if let Err(panic) = AssertUnwindSafe(connector.apply(event)).catch_unwind().await {
                    tracing::error!(
                        block = %number,
                        panic = %panic_message(panic.as_ref()),
                        "Connector panicked"
                    );
                }
            }
            self.status.set_current(&number);
            done.complete();
        }
        tracing::debug!("Event queue closed, dispatcher stopping");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::event_queue;
    use async_trait::async_trait;
    use chainingest_core::types::BlockEvent;
    use num_bigint::BigUint;
    use std::sync::Mutex;

    struct Record(Arc<Mutex<Vec<u32>>>);

    #[async_trait]
    impl Connector for Record {
        async fn apply(&self, event: BlockEvent) {
            let n: u32 = event.number().try_into().unwrap();
            if n == 13 {
                panic!("unlucky block");
            }
            self.0.lock().unwrap().push(n);
        }
    }

    fn ev(n: u32) -> BlockEvent {
        BlockEvent::new(BigUint::from(n), "0x0", "0x1")
    }

    #[tokio::test]
    async fn applies_in_order_and_tracks_current() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let status = StatusHandle::new();
        let (tx, rx) = event_queue();
        let handle = EventDispatcher::new(Some(Arc::new(Record(seen.clone()))), status.clone()).spawn(rx);

        for n in [3, 1, 2] {
            tx.push(ev(n)).await.unwrap();
            assert_eq!(status.snapshot().current, BigUint::from(n));
        }
        drop(tx);
        handle.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn survives_connector_panic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let status = StatusHandle::new();
        let (tx, rx) = event_queue();
        EventDispatcher::new(Some(Arc::new(Record(seen.clone()))), status.clone()).spawn(rx);

        tx.push(ev(12)).await.unwrap();
        tx.push(ev(13)).await.unwrap();
        tx.push(ev(14)).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![12, 14]);
        assert_eq!(status.snapshot().current, BigUint::from(14u32));
    }

    #[tokio::test]
    async fn no_connector_still_updates_status() {
        let status = StatusHandle::new();
        let (tx, rx) = event_queue();
        EventDispatcher::new(None, status.clone()).spawn(rx);
        tx.push(ev(99)).await.unwrap();
        assert_eq!(status.snapshot().current, BigUint::from(99u32));
    }
}
