//! Notification store facade.
//!
//! [`NotificationCenter`] hides whether the list lives in local storage or in
//! the remote per-user collection. Every remote write has a local fallback and
//! no operation surfaces an error to its caller: failures are logged and the
//! equivalent local mutation (or a no-op) takes their place.

mod subscription;

pub use subscription::Subscription;

use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::local_store::LocalNotificationStore;
use crate::notifications::{
    normalize_list, NotificationRecord, RecordPatch, UserId, DEFAULT_RETENTION_CAP,
};
use crate::remote_store::{
    CollectionPath, RemoteNotificationStore, RemoteResult, RemoteStoreError,
};

/// Which storage holds the authoritative list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct CenterSettings {
    pub mode: BackendMode,
    /// Deployment tag appended to the remote collection name.
    pub environment: Option<String>,
    pub retention_cap: usize,
}

impl Default for CenterSettings {
    fn default() -> Self {
        Self {
            mode: BackendMode::Local,
            environment: None,
            retention_cap: DEFAULT_RETENTION_CAP,
        }
    }
}

enum Backend {
    Local,
    Remote {
        remote: Arc<dyn RemoteNotificationStore>,
        collection: CollectionPath,
    },
}

struct UserScope {
    user: Option<UserId>,
    /// Parent of every subscription made while this scope is bound.
    token: CancellationToken,
}

pub struct NotificationCenter {
    settings: CenterSettings,
    local: Arc<LocalNotificationStore>,
    remote: Option<Arc<dyn RemoteNotificationStore>>,
    scope: Mutex<UserScope>,
}

fn select_ids(
    records: &[NotificationRecord],
    predicate: impl Fn(&NotificationRecord) -> bool,
) -> Vec<String> {
    records
        .iter()
        .filter(|record| predicate(record))
        .map(|record| record.id.clone())
        .collect()
}

impl NotificationCenter {
    pub fn new(
        settings: CenterSettings,
        local: Arc<LocalNotificationStore>,
        remote: Option<Arc<dyn RemoteNotificationStore>>,
    ) -> Self {
        if settings.mode == BackendMode::Remote && remote.is_none() {
            warn!("Remote backend requested but no remote store configured, using local storage");
        }
        Self {
            settings,
            local,
            remote,
            scope: Mutex::new(UserScope {
                user: None,
                token: CancellationToken::new(),
            }),
        }
    }

    pub fn settings(&self) -> &CenterSettings {
        &self.settings
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.scope.lock().unwrap().user.clone()
    }

    /// Rebind the user scope.
    ///
    /// Binding the same user again does nothing. Any other change, including
    /// clearing the user, detaches every subscription made under the old scope.
    pub fn set_user(&self, user: Option<UserId>) {
        let mut scope = self.scope.lock().unwrap();
        if user.is_some() && scope.user == user {
            return;
        }

        match &user {
            Some(id) => info!("Binding notifications to user {}", id),
            None => info!("Clearing notification user scope"),
        }
        scope.token.cancel();
        scope.token = CancellationToken::new();
        scope.user = user;
    }

    /// The backend operations currently go to.
    pub fn active_backend(&self) -> BackendMode {
        match self.backend() {
            Backend::Local => BackendMode::Local,
            Backend::Remote { .. } => BackendMode::Remote,
        }
    }

    fn backend(&self) -> Backend {
        if self.settings.mode == BackendMode::Local {
            return Backend::Local;
        }
        let Some(remote) = &self.remote else {
            return Backend::Local;
        };
        let scope = self.scope.lock().unwrap();
        let Some(user) = &scope.user else {
            return Backend::Local;
        };
        Backend::Remote {
            remote: remote.clone(),
            collection: CollectionPath::new(user, self.settings.environment.as_deref()),
        }
    }

    fn scope_token(&self) -> CancellationToken {
        self.scope.lock().unwrap().token.child_token()
    }

    /// Persist a record.
    pub async fn save(&self, record: NotificationRecord) {
        if let Backend::Remote { remote, collection } = self.backend() {
            match remote.put(&collection, &record).await {
                Ok(()) => {
                    debug!("Saved notification {} to {}", record.id, collection);
                    return;
                }
                Err(e) => warn!(
                    "Error saving notification {} remotely, falling back to local storage: {}",
                    record.id, e
                ),
            }
        }

        if let Err(e) = self.local.save(record) {
            error!("Error saving notification locally: {:#}", e);
        }
    }

    /// Full list, newest first, at most the retention cap.
    pub async fn get_all(&self) -> Vec<NotificationRecord> {
        if let Backend::Remote { remote, collection } = self.backend() {
            match remote.fetch(&collection, self.settings.retention_cap).await {
                Ok(records) => return normalize_list(records, self.settings.retention_cap),
                Err(e) => warn!(
                    "Error fetching notifications from {}, reading local storage: {}",
                    collection, e
                ),
            }
        }
        self.local.load()
    }

    /// Mark one record read. A missing id is a silent no-op.
    pub async fn mark_as_read(&self, id: &str) {
        if let Backend::Remote { remote, collection } = self.backend() {
            match Self::remote_mark_as_read(remote.as_ref(), &collection, id).await {
                Ok(true) => return,
                Ok(false) => {
                    debug!("Notification {} no longer exists, nothing to mark", id);
                    return;
                }
                Err(e) => warn!(
                    "Error marking notification {} as read remotely, falling back to local storage: {}",
                    id, e
                ),
            }
        }

        match self.local.update(id, &RecordPatch::mark_read()) {
            Ok(true) => {}
            Ok(false) => debug!("Notification {} not found locally", id),
            Err(e) => error!("Error marking notification {} as read locally: {:#}", id, e),
        }
    }

    async fn remote_mark_as_read(
        remote: &dyn RemoteNotificationStore,
        collection: &CollectionPath,
        id: &str,
    ) -> RemoteResult<bool> {
        if !remote.exists(collection, id).await? {
            return Ok(false);
        }
        match remote.update(collection, id, &RecordPatch::mark_read()).await {
            Ok(()) => Ok(true),
            // Deleted between the check and the write
            Err(RemoteStoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Mark every currently unread record read with a single batched write.
    pub async fn mark_all_as_read(&self) {
        if let Backend::Remote { remote, collection } = self.backend() {
            let result = async {
                let records = remote
                    .fetch(&collection, self.settings.retention_cap)
                    .await?;
                let ids = select_ids(&records, |record| !record.read);
                if !ids.is_empty() {
                    remote
                        .batch_update(&collection, &ids, &RecordPatch::mark_read())
                        .await?;
                }
                Ok::<usize, RemoteStoreError>(ids.len())
            }
            .await;
            match result {
                Ok(count) => {
                    debug!("Marked {} notifications as read in {}", count, collection);
                    return;
                }
                Err(e) => warn!(
                    "Error marking all notifications as read remotely, falling back to local storage: {}",
                    e
                ),
            }
        }

        let ids = select_ids(&self.local.load(), |record| !record.read);
        if ids.is_empty() {
            return;
        }
        if let Err(e) = self.local.update_many(&ids, &RecordPatch::mark_read()) {
            error!("Error marking all notifications as read locally: {:#}", e);
        }
    }

    /// Delete one record. A missing id is a silent no-op.
    pub async fn delete_notification(&self, id: &str) {
        if let Backend::Remote { remote, collection } = self.backend() {
            let result = async {
                if !remote.exists(&collection, id).await? {
                    return Ok(false);
                }
                remote.delete(&collection, id).await?;
                Ok::<bool, RemoteStoreError>(true)
            }
            .await;
            match result {
                Ok(deleted) => {
                    if !deleted {
                        debug!("Notification {} no longer exists, nothing to delete", id);
                    }
                    return;
                }
                Err(e) => warn!(
                    "Error deleting notification {} remotely, falling back to local storage: {}",
                    id, e
                ),
            }
        }

        if let Err(e) = self.local.delete(&[id.to_string()]) {
            error!("Error deleting notification {} locally: {:#}", id, e);
        }
    }

    /// Delete every record already read.
    pub async fn delete_all_read(&self) {
        self.delete_matching(|record| record.read).await;
    }

    /// Delete every record.
    pub async fn delete_all(&self) {
        self.delete_matching(|_| true).await;
    }

    async fn delete_matching(&self, predicate: impl Fn(&NotificationRecord) -> bool) {
        if let Backend::Remote { remote, collection } = self.backend() {
            let result = async {
                let records = remote
                    .fetch(&collection, self.settings.retention_cap)
                    .await?;
                let ids = select_ids(&records, &predicate);
                if !ids.is_empty() {
                    remote.batch_delete(&collection, &ids).await?;
                }
                Ok::<usize, RemoteStoreError>(ids.len())
            }
            .await;
            match result {
                Ok(count) => {
                    debug!("Deleted {} notifications from {}", count, collection);
                    return;
                }
                Err(e) => warn!(
                    "Error deleting notifications remotely, falling back to local storage: {}",
                    e
                ),
            }
        }

        let ids = select_ids(&self.local.load(), &predicate);
        if ids.is_empty() {
            return;
        }
        if let Err(e) = self.local.delete(&ids) {
            error!("Error deleting notifications locally: {:#}", e);
        }
    }

    /// Watch the list.
    ///
    /// Remote: `callback` receives the full list on every server change,
    /// starting with the current one once the listener attaches. Local:
    /// `callback` runs right away with the current list, then after every
    /// local mutation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Vec<NotificationRecord>) + Send + Sync + 'static,
    {
        let token = self.scope_token();
        match self.backend() {
            Backend::Local => self.subscribe_local(callback, token.clone()),
            Backend::Remote { remote, collection } => {
                self.subscribe_remote(remote, collection, callback, token.clone())
            }
        }
        Subscription::new(token)
    }

    fn subscribe_local<F>(&self, callback: F, token: CancellationToken)
    where
        F: Fn(Vec<NotificationRecord>) + Send + Sync + 'static,
    {
        // Watch before the first read so no mutation slips in between
        let mut changes = self.local.watch();
        callback(self.local.load());

        let local = self.local.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = changes.recv() => match event {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            if token.is_cancelled() {
                                break;
                            }
                            callback(local.load());
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("Local notification subscription ended");
        });
    }

    fn subscribe_remote<F>(
        &self,
        remote: Arc<dyn RemoteNotificationStore>,
        collection: CollectionPath,
        callback: F,
        token: CancellationToken,
    ) where
        F: Fn(Vec<NotificationRecord>) + Send + Sync + 'static,
    {
        let cap = self.settings.retention_cap;
        tokio::spawn(async move {
            let attached = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Subscription to {} cancelled before the listener attached", collection);
                    return;
                }
                result = remote.listen(&collection, cap) => result,
            };
            let mut snapshots = match attached {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    warn!("Error attaching notification listener to {}: {}", collection, e);
                    return;
                }
            };

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    snapshot = snapshots.recv() => match snapshot {
                        Some(records) => {
                            if token.is_cancelled() {
                                break;
                            }
                            callback(normalize_list(records, cap));
                        }
                        None => {
                            info!("Notification listener on {} closed", collection);
                            break;
                        }
                    }
                }
            }
            debug!("Detached notification listener from {}", collection);
        });
    }

    /// Number of unread records in a list.
    pub fn unread_count(records: &[NotificationRecord]) -> usize {
        crate::notifications::unread_count(records)
    }
}
