//! In-process remote store.
//!
//! Behaves like the real document service (server-assigned timestamps, live
//! listeners with an initial snapshot) and adds switches to simulate outages
//! and slow listener attachment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CollectionPath, RemoteNotificationStore, RemoteResult, RemoteStoreError, SnapshotReceiver,
};
use crate::notifications::{normalize_list, now_millis, NotificationRecord, RecordPatch};

type ServerClock = Box<dyn Fn() -> i64 + Send + Sync>;

struct Listener {
    collection: CollectionPath,
    limit: usize,
    sender: mpsc::UnboundedSender<Vec<NotificationRecord>>,
}

pub struct MemoryRemoteStore {
    collections: Mutex<HashMap<CollectionPath, HashMap<String, NotificationRecord>>>,
    listeners: Mutex<Vec<Listener>>,
    clock: ServerClock,
    last_server_time: AtomicI64,
    listen_delay: Option<Duration>,
    unavailable: AtomicBool,
    write_calls: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            clock: Box::new(now_millis),
            last_server_time: AtomicI64::new(i64::MIN),
            listen_delay: None,
            unavailable: AtomicBool::new(false),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the server clock. Assigned timestamps stay strictly increasing.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Delay every listener attachment by `delay`.
    pub fn with_listen_delay(mut self, delay: Duration) -> Self {
        self.listen_delay = Some(delay);
        self
    }

    /// Make every subsequent call fail with `Unavailable` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of write calls received (put, update, delete and batches).
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Number of attached listeners whose receiver is still alive.
    pub fn active_listeners(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|listener| !listener.sender.is_closed());
        listeners.len()
    }

    /// Store a record as-is, keeping its timestamp, as another writer would.
    pub fn insert_raw(&self, collection: &CollectionPath, record: NotificationRecord) {
        {
            let mut collections = self.collections.lock().unwrap();
            collections
                .entry(collection.clone())
                .or_default()
                .insert(record.id.clone(), record);
        }
        self.broadcast(collection);
    }

    /// Every record in a collection, newest first, ignoring any limit.
    pub fn records(&self, collection: &CollectionPath) -> Vec<NotificationRecord> {
        self.snapshot(collection, usize::MAX)
    }

    fn snapshot(&self, collection: &CollectionPath, limit: usize) -> Vec<NotificationRecord> {
        let collections = self.collections.lock().unwrap();
        let records = collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        normalize_list(records, limit)
    }

    fn broadcast(&self, collection: &CollectionPath) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|listener| {
            if listener.collection != *collection {
                return true;
            }
            let snapshot = self.snapshot(collection, listener.limit);
            listener.sender.send(snapshot).is_ok()
        });
    }

    fn next_server_time(&self) -> i64 {
        let now = (self.clock)();
        let mut previous = self.last_server_time.load(Ordering::SeqCst);
        loop {
            let next = now.max(previous.saturating_add(1));
            match self.last_server_time.compare_exchange(
                previous,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Unavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(())
    }

    fn record_write(&self) -> RemoteResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }
}

#[async_trait]
impl RemoteNotificationStore for MemoryRemoteStore {
    async fn fetch(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> RemoteResult<Vec<NotificationRecord>> {
        self.check_available()?;
        Ok(self.snapshot(collection, limit))
    }

    async fn exists(&self, collection: &CollectionPath, id: &str) -> RemoteResult<bool> {
        self.check_available()?;
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id)))
    }

    async fn put(
        &self,
        collection: &CollectionPath,
        record: &NotificationRecord,
    ) -> RemoteResult<()> {
        self.record_write()?;
        let mut stored = record.clone();
        stored.timestamp = self.next_server_time();
        {
            let mut collections = self.collections.lock().unwrap();
            let docs = collections.entry(collection.clone()).or_default();
            if let Some(existing) = docs.get(&stored.id) {
                stored.read |= existing.read;
            }
            docs.insert(stored.id.clone(), stored);
        }
        self.broadcast(collection);
        Ok(())
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        patch: &RecordPatch,
    ) -> RemoteResult<()> {
        self.record_write()?;
        {
            let mut collections = self.collections.lock().unwrap();
            let record = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| RemoteStoreError::NotFound(collection.document_path(id)))?;
            patch.apply(record);
        }
        self.broadcast(collection);
        Ok(())
    }

    async fn batch_update(
        &self,
        collection: &CollectionPath,
        ids: &[String],
        patch: &RecordPatch,
    ) -> RemoteResult<()> {
        self.record_write()?;
        {
            let mut collections = self.collections.lock().unwrap();
            if let Some(docs) = collections.get_mut(collection) {
                for id in ids {
                    match docs.get_mut(id) {
                        Some(record) => patch.apply(record),
                        None => debug!("Skipping update of missing document {}", id),
                    }
                }
            }
        }
        self.broadcast(collection);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> RemoteResult<()> {
        self.record_write()?;
        {
            let mut collections = self.collections.lock().unwrap();
            if let Some(docs) = collections.get_mut(collection) {
                docs.remove(id);
            }
        }
        self.broadcast(collection);
        Ok(())
    }

    async fn batch_delete(&self, collection: &CollectionPath, ids: &[String]) -> RemoteResult<()> {
        self.record_write()?;
        {
            let mut collections = self.collections.lock().unwrap();
            if let Some(docs) = collections.get_mut(collection) {
                for id in ids {
                    docs.remove(id);
                }
            }
        }
        self.broadcast(collection);
        Ok(())
    }

    async fn listen(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> RemoteResult<SnapshotReceiver> {
        if let Some(delay) = self.listen_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut listeners = self.listeners.lock().unwrap();
        // Initial snapshot goes out before any later change can
        let _ = sender.send(self.snapshot(collection, limit));
        listeners.push(Listener {
            collection: collection.clone(),
            limit,
            sender,
        });
        Ok(receiver)
    }
}
