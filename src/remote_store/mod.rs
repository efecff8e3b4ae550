//! Remote authoritative notification storage.
//!
//! Records live in a per-user collection of a remote document store. The
//! [`RemoteNotificationStore`] trait is the seam between the facade and a
//! concrete binding: [`HttpRemoteStore`] talks to a REST + WebSocket document
//! service, [`MemoryRemoteStore`] keeps everything in process.

mod http;
mod memory;
pub mod wire;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::notifications::{NotificationRecord, RecordPatch, UserId};

/// Base name of the per-user notification collection.
pub const COLLECTION_NAME: &str = "notifications";

/// Errors that can occur talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode remote payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteStoreError>;

/// Stream of full-list snapshots pushed by a live listener.
///
/// Dropping the receiver detaches the listener.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Vec<NotificationRecord>>;

/// Location of a user's notification collection.
///
/// `users/<user>/notifications`, with an optional `_<environment>` suffix so
/// that staging and production can share one backend project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    user: UserId,
    environment: Option<String>,
}

impl CollectionPath {
    pub fn new(user: &UserId, environment: Option<&str>) -> Self {
        Self {
            user: user.clone(),
            environment: environment
                .map(str::trim)
                .filter(|env| !env.is_empty())
                .map(str::to_string),
        }
    }

    /// Rebuild a path from its user and collection segments.
    /// Returns None if `collection` is not a notification collection.
    pub fn from_segments(user: &str, collection: &str) -> Option<Self> {
        let environment = match collection.strip_prefix(COLLECTION_NAME)? {
            "" => None,
            suffix => Some(suffix.strip_prefix('_')?.to_string()),
        };
        Some(Self {
            user: UserId::new(user),
            environment,
        })
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn collection_name(&self) -> String {
        match &self.environment {
            Some(env) => format!("{}_{}", COLLECTION_NAME, env),
            None => COLLECTION_NAME.to_string(),
        }
    }

    pub fn as_path(&self) -> String {
        format!("users/{}/{}", self.user, self.collection_name())
    }

    pub fn document_path(&self, id: &str) -> String {
        format!("{}/{}", self.as_path(), id)
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_path())
    }
}

/// Trait for remote notification storage operations.
///
/// Timestamps are assigned by the remote side on `put`; reads return the
/// newest `limit` records, newest first.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait RemoteNotificationStore: Send + Sync {
    /// One-shot fetch of the newest `limit` records.
    async fn fetch(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> RemoteResult<Vec<NotificationRecord>>;

    /// Whether a document with this id currently exists.
    async fn exists(&self, collection: &CollectionPath, id: &str) -> RemoteResult<bool>;

    /// Create or overwrite the document keyed by `record.id`. Overwriting
    /// never clears the stored `read` flag.
    async fn put(&self, collection: &CollectionPath, record: &NotificationRecord)
        -> RemoteResult<()>;

    /// Update one document. Fails with `NotFound` if it does not exist.
    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        patch: &RecordPatch,
    ) -> RemoteResult<()>;

    /// Update several documents at once. Ids that no longer exist are skipped.
    async fn batch_update(
        &self,
        collection: &CollectionPath,
        ids: &[String],
        patch: &RecordPatch,
    ) -> RemoteResult<()>;

    /// Delete one document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &CollectionPath, id: &str) -> RemoteResult<()>;

    /// Delete several documents at once.
    async fn batch_delete(&self, collection: &CollectionPath, ids: &[String]) -> RemoteResult<()>;

    /// Attach a live listener. The first snapshot is the current list; one
    /// more follows every change to the collection.
    async fn listen(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> RemoteResult<SnapshotReceiver>;
}
