//! WebSocket subscription management.
//!
//! Routes `eth_subscription` notifications to the [`HeadSubscription`]
//! registered under their subscription ID, and fans a connection failure
//! out to every open subscription.
//!
//! [`HeadSubscription`]: crate::node::HeadSubscription

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::node::{HeadSender, HeadSubscription};

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Active subscriptions, shared between callers and the connection task.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<SubscriptionId, HeadSender>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriptionId, HeadSender>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscription and return its notification stream.
    pub fn register(&self, id: SubscriptionId) -> HeadSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries().insert(id, tx);
        HeadSubscription::new(rx)
    }

    /// Forward an incoming notification to the matching subscription.
    /// Subscriptions whose receiver is gone are dropped.
    pub fn dispatch(&self, id: &SubscriptionId, message: Value) {
        let mut entries = self.entries();
        let closed = match entries.get(id) {
            Some(sender) => sender.send(Ok(message)).is_err(),
            None => {
                tracing::debug!(subscription = %id, "notification for unknown subscription");
                false
            }
        };
        if closed {
            entries.remove(id);
        }
    }

    /// Tell every subscriber the connection failed, then forget them all.
    /// Receivers see the error followed by end of stream.
    pub fn fail_all(&self, reason: &str) {
        for (_, sender) in self.entries().drain() {
            let _ = sender.send(Err(TransportError::WebSocket(reason.to_string())));
        }
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
