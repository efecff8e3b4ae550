//! Local notification persistence.
//!
//! The whole list lives in a single serialized slot of a key-value store.
//! Every mutation fires a process-local change event so that same-process
//! subscribers can re-read the list.

mod schema;
mod sqlite_kv;

pub use schema::KEY_VALUE_VERSIONED_SCHEMAS;
pub use sqlite_kv::SqliteKeyValueStore;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::notifications::{normalize_list, NotificationRecord, RecordPatch};

/// Well-known slot holding the serialized notification list.
pub const STORAGE_KEY: &str = "notifications";

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Trait for the key-value storage backing the local notification list.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Returns Ok(None) if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Notification list persisted in a local key-value slot.
pub struct LocalNotificationStore {
    kv: Arc<dyn KeyValueStore>,
    retention_cap: usize,
    changes: broadcast::Sender<()>,
    /// Serializes read-modify-write cycles on the slot.
    write_lock: Mutex<()>,
}

impl LocalNotificationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, retention_cap: usize) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            kv,
            retention_cap,
            changes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn retention_cap(&self) -> usize {
        self.retention_cap
    }

    /// Receiver that fires after every mutation of the list.
    pub fn watch(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    /// Current list, newest first. A missing or unreadable slot reads as empty.
    pub fn load(&self) -> Vec<NotificationRecord> {
        match self.read_slot() {
            Ok(records) => records,
            Err(e) => {
                warn!("Error loading notifications from local storage: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Insert a record, replacing any record with the same id, and evict past the cap.
    /// A replaced record that was already read stays read.
    pub fn save(&self, mut record: NotificationRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut records = self.load();
        if let Some(existing) = records.iter().find(|existing| existing.id == record.id) {
            record.read |= existing.read;
        }
        records.retain(|existing| existing.id != record.id);
        records.insert(0, record);
        self.write_slot(records)?;
        self.notify_changed();
        Ok(())
    }

    /// Apply `patch` to the record with the given id.
    /// Returns false, without touching storage, if no such record exists.
    pub fn update(&self, id: &str, patch: &RecordPatch) -> Result<bool> {
        let updated = self.update_many(&[id.to_string()], patch)?;
        Ok(updated > 0)
    }

    /// Apply `patch` to every listed id that exists. Returns how many matched.
    pub fn update_many(&self, ids: &[String], patch: &RecordPatch) -> Result<usize> {
        if patch.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().unwrap();
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut records = self.load();

        let mut matched = 0;
        for record in records.iter_mut() {
            if targets.contains(record.id.as_str()) {
                patch.apply(record);
                matched += 1;
            }
        }

        if matched == 0 {
            debug!("No local notifications matched update of {} ids", ids.len());
            return Ok(0);
        }

        self.write_slot(records)?;
        self.notify_changed();
        Ok(matched)
    }

    /// Remove every listed id. Returns how many records were removed.
    pub fn delete(&self, ids: &[String]) -> Result<usize> {
        let _guard = self.write_lock.lock().unwrap();
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut records = self.load();
        let before = records.len();
        records.retain(|record| !targets.contains(record.id.as_str()));
        let removed = before - records.len();

        if removed == 0 {
            return Ok(0);
        }

        self.write_slot(records)?;
        self.notify_changed();
        Ok(removed)
    }

    fn read_slot(&self) -> Result<Vec<NotificationRecord>> {
        let Some(raw) = self.kv.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        let records: Vec<NotificationRecord> =
            serde_json::from_str(&raw).context("Malformed notification slot")?;
        Ok(normalize_list(records, self.retention_cap))
    }

    fn write_slot(&self, records: Vec<NotificationRecord>) -> Result<()> {
        if records.is_empty() {
            return self
                .kv
                .remove(STORAGE_KEY)
                .context("Failed to clear local notifications");
        }
        let records = normalize_list(records, self.retention_cap);
        let serialized = serde_json::to_string(&records)?;
        self.kv
            .set(STORAGE_KEY, &serialized)
            .context("Failed to persist notifications locally")
    }

    fn notify_changed(&self) {
        // No receivers is fine, nobody is subscribed yet
        let _ = self.changes.send(());
    }
}
