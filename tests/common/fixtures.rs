//! Store and center builders, plus a recording alert sink.

use notification_center::{
    AlertSink, BackendMode, CenterSettings, LocalNotificationStore, NotificationCenter,
    RemoteNotificationStore, SqliteKeyValueStore, Toast, UserId,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::constants::{TEST_ENVIRONMENT, TEST_RETENTION_CAP, TEST_USER};

pub fn local_store() -> Arc<LocalNotificationStore> {
    let kv = Arc::new(SqliteKeyValueStore::in_memory().expect("Failed to open in-memory store"));
    Arc::new(LocalNotificationStore::new(kv, TEST_RETENTION_CAP))
}

/// Center in local mode, no remote configured.
pub fn local_center(local: Arc<LocalNotificationStore>) -> NotificationCenter {
    let settings = CenterSettings {
        mode: BackendMode::Local,
        environment: None,
        retention_cap: TEST_RETENTION_CAP,
    };
    NotificationCenter::new(settings, local, None)
}

/// Center in remote mode, already bound to the test user.
pub fn remote_center(
    local: Arc<LocalNotificationStore>,
    remote: Arc<dyn RemoteNotificationStore>,
) -> NotificationCenter {
    let settings = CenterSettings {
        mode: BackendMode::Remote,
        environment: Some(TEST_ENVIRONMENT.to_string()),
        retention_cap: TEST_RETENTION_CAP,
    };
    let center = NotificationCenter::new(settings, local, Some(remote));
    center.set_user(Some(UserId::new(TEST_USER)));
    center
}

/// Alert sink remembering every toast and chime.
#[derive(Default)]
pub struct RecordingSink {
    toasts: Mutex<Vec<Toast>>,
    chimes: Mutex<usize>,
}

impl RecordingSink {
    pub fn toast_ids(&self) -> Vec<String> {
        self.toasts
            .lock()
            .unwrap()
            .iter()
            .map(|toast| toast.notification_id.clone())
            .collect()
    }

    pub fn chimes(&self) -> usize {
        *self.chimes.lock().unwrap()
    }
}

impl AlertSink for RecordingSink {
    fn show_toast(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }

    fn play_chime(&self) {
        *self.chimes.lock().unwrap() += 1;
    }
}

/// Poll `condition` until it holds, panicking after a few seconds.
pub async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    let start = std::time::Instant::now();
    while !condition() {
        if start.elapsed() > Duration::from_secs(5) {
            panic!("Timed out waiting for {}", description);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Give spawned tasks a moment to run when asserting that nothing happens.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
