//! Generic publish/subscribe fan-out.
//!
//! Subscribers get a bounded channel; publish never blocks and drops events
//! for subscribers whose buffer is full. A [`Subscription`] is a drop-guard:
//! dropping it unregisters the subscriber and closes its channel, so binding
//! a subscription to a task or request scope is enough for cleanup.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_BUFFER_SIZE: usize = 16;

struct Registry<T> {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<T>>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

/// A generic message broker. Cloning is cheap; clones share the subscriber set.
pub struct Broker<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Clone> Default for Broker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Broker<T> {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a broker whose subscriber channels hold `buffer_size` events.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                buffer_size: buffer_size.max(1),
            }),
        }
    }

    /// Register a new subscriber. The subscription unregisters itself when
    /// dropped, so the subscriber's lifetime is bounded by whatever scope
    /// owns the returned value.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.registry.buffer_size);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers.write().insert(id, tx);
        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Deliver `event` to every current subscriber without blocking. A
    /// subscriber whose buffer is full misses this event; nobody else does.
    pub fn publish(&self, event: T) {
        let subscribers = self.registry.subscribers.read();
        for tx in subscribers.values() {
            let _ = tx.try_send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.read().len()
    }
}

/// A registered subscriber. Receive with [`Subscription::recv`]; drop to
/// unsubscribe.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    registry: Arc<Registry<T>>,
}

impl<T> Subscription<T> {
    /// Receive the next event. Returns `None` once the channel is closed and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<T, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.registry.subscribers.write().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let broker = Broker::new();
        let mut sub = broker.subscribe();

        broker.publish(1u32);
        broker.publish(2);
        broker.publish(3);

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
        assert_eq!(sub.recv().await, Some(3));
    }

    #[tokio::test]
    async fn slow_subscriber_drops_past_buffer() {
        let broker = Broker::with_buffer_size(2);
        let mut sub = broker.subscribe();

        broker.publish(1u32);
        broker.publish(2);
        broker.publish(3); // dropped: buffer holds two

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
        let third = timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(third.is_err(), "third event should have been dropped");
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_affect_others() {
        let broker = Broker::with_buffer_size(1);
        let mut slow = broker.subscribe();
        let mut fast = broker.subscribe();

        broker.publish(1u32);
        assert_eq!(fast.recv().await, Some(1));

        // slow still holds event 1; its buffer is full
        broker.publish(2);
        assert_eq!(fast.recv().await, Some(2));
        assert_eq!(slow.recv().await, Some(1));
    }

    #[tokio::test]
    async fn drop_unregisters_subscriber() {
        let broker = Broker::<u32>::new();
        let sub = broker.subscribe();
        let other = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 2);

        drop(sub);
        assert_eq!(broker.subscriber_count(), 1);
        drop(other);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn no_delivery_after_drop() {
        let broker = Broker::new();
        let sub = broker.subscribe();
        drop(sub);

        // Must not panic or deliver anywhere
        broker.publish(42u32);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let broker = Broker::new();
        broker.publish("hello");
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn buffered_events_survive_until_read() {
        let broker = Broker::<u32>::new();
        let mut sub = broker.subscribe();
        broker.publish(9);
        drop(broker);

        assert_eq!(sub.recv().await, Some(9));
    }
}
