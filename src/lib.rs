//! Notification Center Library
//!
//! Client-side synchronization core for user notifications: a local key-value
//! backed store, a remote authoritative document store, a facade that unifies
//! them, push delivery normalization and snapshot-driven toast alerts.

pub mod alerts;
pub mod center;
pub mod config;
pub mod delivery;
pub mod local_store;
pub mod notifications;
pub mod panel;
pub mod remote_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use alerts::{AlertSink, ChangeDetector, Toast, ToastDriver, TracingAlertSink};
pub use center::{BackendMode, CenterSettings, NotificationCenter, Subscription};
pub use delivery::{DeliveryListener, InboundMessage, PushPayload, RelayMessage};
pub use local_store::{KeyValueStore, LocalNotificationStore, SqliteKeyValueStore};
pub use notifications::{NotificationRecord, RecordPatch, Severity, UserId};
pub use panel::NotificationPanel;
pub use remote_store::{
    CollectionPath, HttpRemoteStore, MemoryRemoteStore, RemoteNotificationStore, RemoteStoreError,
};
