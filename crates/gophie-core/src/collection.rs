// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Download collection
//
// Records are kept in insertion order. Structural changes fire a single
// `Changed` event each; record progress is forwarded as `RecordUpdated`.

use crate::download::{DownloadRecord, DownloadStatus};
use crate::events::{ListenerRegistry, SubscriptionId};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Notification emitted by a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionEvent {
    /// Records were added or removed
    Changed,
    /// A record's status or progress changed
    RecordUpdated(Uuid),
}

struct Tracked {
    record: Arc<DownloadRecord>,
    subscription: SubscriptionId,
}

/// Ordered set of download records
pub struct DownloadCollection {
    records: RwLock<Vec<Tracked>>,
    events: Arc<ListenerRegistry<CollectionEvent>>,
}

impl DownloadCollection {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            events: Arc::new(ListenerRegistry::new()),
        }
    }

    /// Append a record and start forwarding its notifications
    pub fn add(&self, record: Arc<DownloadRecord>) {
        let id = record.id();
        let events = Arc::downgrade(&self.events);
        let subscription = record.subscribe(move |_| {
            if let Some(events) = events.upgrade() {
                events.emit(&CollectionEvent::RecordUpdated(id));
            }
        });

        self.records.write().unwrap().push(Tracked {
            record,
            subscription,
        });
        tracing::debug!("Download {} added to collection", id);
        self.events.emit(&CollectionEvent::Changed);
    }

    /// Remove one record; it no longer reports through the collection
    pub fn remove(&self, id: Uuid) -> Option<Arc<DownloadRecord>> {
        let removed = {
            let mut records = self.records.write().unwrap();
            let index = records.iter().position(|t| t.record.id() == id)?;
            records.remove(index)
        };

        removed.record.unsubscribe(removed.subscription);
        self.events.emit(&CollectionEvent::Changed);
        Some(removed.record)
    }

    /// Remove every record that is not active. Fires one `Changed` event
    /// no matter how many records go.
    pub fn clear_non_active(&self) -> Vec<Arc<DownloadRecord>> {
        let removed: Vec<Tracked> = {
            let mut records = self.records.write().unwrap();
            let (active, rest): (Vec<Tracked>, Vec<Tracked>) = records
                .drain(..)
                .partition(|t| t.record.status() == DownloadStatus::Active);
            *records = active;
            rest
        };

        tracing::debug!("Cleared {} finished downloads", removed.len());
        let removed = removed
            .into_iter()
            .map(|tracked| {
                tracked.record.unsubscribe(tracked.subscription);
                tracked.record
            })
            .collect();
        self.events.emit(&CollectionEvent::Changed);
        removed
    }

    /// Remove all records regardless of state
    pub fn clear(&self) -> Vec<Arc<DownloadRecord>> {
        let removed: Vec<Tracked> = self.records.write().unwrap().drain(..).collect();
        let removed = removed
            .into_iter()
            .map(|tracked| {
                tracked.record.unsubscribe(tracked.subscription);
                tracked.record
            })
            .collect();
        self.events.emit(&CollectionEvent::Changed);
        removed
    }

    /// Records in reverse insertion order
    pub fn newest_first(&self) -> Vec<Arc<DownloadRecord>> {
        self.records
            .read()
            .unwrap()
            .iter()
            .rev()
            .map(|t| t.record.clone())
            .collect()
    }

    /// Records in insertion order
    pub fn list(&self) -> Vec<Arc<DownloadRecord>> {
        self.records
            .read()
            .unwrap()
            .iter()
            .map(|t| t.record.clone())
            .collect()
    }

    pub fn has_non_active(&self) -> bool {
        self.records
            .read()
            .unwrap()
            .iter()
            .any(|t| t.record.status() != DownloadStatus::Active)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<DownloadRecord>> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|t| t.record.id() == id)
            .map(|t| t.record.clone())
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CollectionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl Default for DownloadCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::tests::{record_with_fake, FakeTransport};
    use crate::types::GopherError;
    use crate::Address;
    use std::sync::Mutex;

    fn event_log(collection: &DownloadCollection) -> Arc<Mutex<Vec<CollectionEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        collection.subscribe(move |event| sink.lock().unwrap().push(*event));
        log
    }

    fn changed_count(log: &Mutex<Vec<CollectionEvent>>) -> usize {
        log.lock()
            .unwrap()
            .iter()
            .filter(|e| **e == CollectionEvent::Changed)
            .count()
    }

    fn fail(transport: &FakeTransport, index: usize) {
        transport.listener(index).on_failed(
            GopherError::Other("reset".to_string()),
            &Address::default(),
        );
    }

    #[test]
    fn test_add_fires_changed() {
        let collection = DownloadCollection::new();
        let log = event_log(&collection);
        let (record, _) = record_with_fake();

        collection.add(record.clone());
        assert_eq!(collection.len(), 1);
        assert_eq!(*log.lock().unwrap(), vec![CollectionEvent::Changed]);
        assert!(collection.get(record.id()).is_some());
    }

    #[test]
    fn test_newest_first() {
        let collection = DownloadCollection::new();
        let records: Vec<_> = (0..3).map(|_| record_with_fake().0).collect();
        for record in &records {
            collection.add(record.clone());
        }

        let ids: Vec<Uuid> = collection.newest_first().iter().map(|r| r.id()).collect();
        let expected: Vec<Uuid> = records.iter().rev().map(|r| r.id()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_clear_non_active_fires_once() {
        let collection = DownloadCollection::new();

        let (idle, _) = record_with_fake();
        let (active, _active_transport) = record_with_fake();
        let (failed, failed_transport) = record_with_fake();
        let (completed, completed_transport) = record_with_fake();

        active.start();
        failed.start();
        fail(&failed_transport, 0);
        completed.start();
        completed_transport
            .listener(0)
            .on_loaded(crate::transport::Loaded::File {
                path: completed.target().to_path_buf(),
                bytes: 1,
            });

        for record in [&idle, &active, &failed, &completed] {
            collection.add(record.clone());
        }
        assert!(collection.has_non_active());

        let log = event_log(&collection);
        let removed = collection.clear_non_active();

        assert_eq!(removed.len(), 3);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.list()[0].id(), active.id());
        assert_eq!(changed_count(&log), 1);
        assert!(!collection.has_non_active());
    }

    #[test]
    fn test_clear_non_active_with_nothing_to_remove() {
        let collection = DownloadCollection::new();
        let log = event_log(&collection);
        assert!(collection.clear_non_active().is_empty());
        assert_eq!(changed_count(&log), 1);
    }

    #[test]
    fn test_record_updates_forwarded_until_removed() {
        let collection = DownloadCollection::new();
        let (record, transport) = record_with_fake();
        collection.add(record.clone());
        let log = event_log(&collection);

        record.start();
        assert_eq!(
            *log.lock().unwrap(),
            vec![CollectionEvent::RecordUpdated(record.id())]
        );

        assert!(collection.remove(record.id()).is_some());
        fail(&transport, 0);
        assert_eq!(record.status(), DownloadStatus::Failed);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                CollectionEvent::RecordUpdated(record.id()),
                CollectionEvent::Changed,
            ]
        );
        assert!(collection.remove(record.id()).is_none());
    }
}
