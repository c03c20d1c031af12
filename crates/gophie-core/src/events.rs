// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Event delivery
//
// Listeners are called synchronously, in subscription order, on whatever
// thread emits the event. Hosts that need events on their own loop can use
// ChannelListener instead.

use crate::address::Address;
use crate::transport::{Loaded, TransportListener};
use crate::types::GopherError;
use async_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Handle returned by `ListenerRegistry::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered set of callbacks for one event type
pub struct ListenerRegistry<E> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns false when it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap();
        let original_len = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != original_len
    }

    /// Deliver an event to every callback, oldest subscription first
    pub fn emit(&self, event: &E) {
        // Snapshot so callbacks may subscribe or unsubscribe re-entrantly
        let callbacks: Vec<Callback<E>> = self
            .listeners
            .read()
            .unwrap()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.listeners.write().unwrap().clear();
    }
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport callbacks as values
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Progress { address: Address, bytes: u64 },
    Loaded(Loaded),
    Failed { error: GopherError, address: Address },
}

impl TransportEvent {
    /// Loaded and Failed end an operation
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransportEvent::Progress { .. })
    }
}

/// Forwards transport callbacks into an unbounded channel
pub struct ChannelListener {
    event_tx: Sender<TransportEvent>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, Receiver<TransportEvent>) {
        let (event_tx, event_rx) = async_channel::unbounded();
        (Arc::new(Self { event_tx }), event_rx)
    }

    fn forward(&self, event: TransportEvent) {
        if self.event_tx.try_send(event).is_err() {
            tracing::debug!("Transport event dropped, receiver closed");
        }
    }
}

impl TransportListener for ChannelListener {
    fn on_progress(&self, address: &Address, bytes: u64) {
        self.forward(TransportEvent::Progress {
            address: address.clone(),
            bytes,
        });
    }

    fn on_loaded(&self, result: Loaded) {
        self.forward(TransportEvent::Loaded(result));
    }

    fn on_failed(&self, error: GopherError, address: &Address) {
        self.forward(TransportEvent::Failed {
            error,
            address: address.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_fifo_delivery() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            registry.subscribe(move |value: &u32| seen.lock().unwrap().push((tag, *value)));
        }
        registry.emit(&7);

        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = ListenerRegistry::<()>::new();
        let count = Arc::new(AtomicU64::new(0));

        let counter = count.clone();
        let id = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.emit(&());
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_channel_listener_forwards_events() {
        let (listener, events) = ChannelListener::new();
        let address = Address::parse("gopher://example.org/");

        listener.on_progress(&address, 10);
        listener.on_failed(GopherError::Timeout("slow".to_string()), &address);

        match events.try_recv().unwrap() {
            TransportEvent::Progress { bytes, .. } => assert_eq!(bytes, 10),
            other => panic!("unexpected event: {:?}", other),
        }
        let last = events.try_recv().unwrap();
        assert!(last.is_terminal());
        assert!(matches!(last, TransportEvent::Failed { .. }));
    }
}
