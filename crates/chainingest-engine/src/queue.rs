//! Rendezvous queue between block producers and the single dispatcher.
//!
//! `push` returns only after the dispatcher has consumed the event (applied
//! the connector and recorded the height in the status). Producers therefore
//! run at the pace of the connector, and `current` in the status always
//! reflects what was actually consumed.

use tokio::sync::{mpsc, oneshot};

use chainingest_core::error::IngestError;
use chainingest_core::types::BlockEvent;

/// One event in flight plus the signal that releases its producer.
pub struct Delivery {
    pub event: BlockEvent,
    done: oneshot::Sender<()>,
}

impl Delivery {
    /// Release the producer waiting on this delivery.
    pub fn complete(self) {
        let _ = self.done.send(());
    }

    /// Split into the event and a completion token.
    pub fn into_parts(self) -> (BlockEvent, Completion) {
        (self.event, Completion(self.done))
    }
}

/// Releases the producer of a consumed event. Dropping it without
/// completing makes the producer's `push` fail.
pub struct Completion(oneshot::Sender<()>);

impl Completion {
    pub fn complete(self) {
        let _ = self.0.send(());
    }
}

/// Producer side. Cheap to clone; every fast-sync worker holds one.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Delivery>,
}

/// Consumer side. Exactly one exists per queue.
pub struct EventReceiver {
    rx: mpsc::Receiver<Delivery>,
}

/// Create a queue.
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (EventSender { tx }, EventReceiver { rx })
}

impl EventSender {
    /// Hand `event` to the dispatcher and wait until it has been consumed.
    pub async fn push(&self, event: BlockEvent) -> Result<(), IngestError> {
        let (done, consumed) = oneshot::channel();
        self.tx
            .send(Delivery { event, done })
            .await
            .map_err(|_| IngestError::DispatcherClosed)?;
        consumed.await.map_err(|_| IngestError::DispatcherClosed)
    }
}

impl EventReceiver {
    /// Next delivery in arrival order; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use std::time::Duration;

    fn ev(n: u32) -> BlockEvent {
        BlockEvent::new(BigUint::from(n), "0x0", "0x1")
    }

    #[tokio::test]
    async fn push_waits_for_consumption() {
        let (tx, mut rx) = event_queue();
        let producer = tokio::spawn(async move { tx.push(ev(1)).await });

        let delivery = rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished(), "producer released before consumption");

        assert_eq!(delivery.event.number(), &BigUint::from(1u32));
        delivery.complete();
        producer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn push_fails_when_dispatcher_gone() {
        let (tx, rx) = event_queue();
        drop(rx);
        assert!(matches!(tx.push(ev(1)).await, Err(IngestError::DispatcherClosed)));
    }

    #[tokio::test]
    async fn dropped_delivery_releases_producer_with_error() {
        let (tx, mut rx) = event_queue();
        let producer = tokio::spawn(async move { tx.push(ev(2)).await });
        drop(rx.recv().await.unwrap());
        assert!(producer.await.unwrap().is_err());
    }
}
