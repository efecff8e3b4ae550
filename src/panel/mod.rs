//! Notification panel view model.
//!
//! Holds the latest snapshot and the open/closed state of the panel. The
//! panel never edits records itself: every action goes through the
//! [`NotificationCenter`] and the result comes back as a new snapshot.

mod time_ago;

pub use time_ago::time_ago;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::alerts::{AlertSink, ToastDriver};
use crate::center::{NotificationCenter, Subscription};
use crate::notifications::{now_millis, unread_count, NotificationRecord, UserId};

/// How long the bell keeps ringing after an arrival.
pub const BELL_RING_DURATION: Duration = Duration::from_secs(1);

const BADGE_MAX: usize = 9;

#[derive(Debug, Default)]
struct PanelState {
    notifications: Vec<NotificationRecord>,
    is_open: bool,
    ringing_until: Option<Instant>,
}

pub struct NotificationPanel {
    center: Arc<NotificationCenter>,
    state: Arc<Mutex<PanelState>>,
    /// Subscription owned by the panel, set through `switch_user`.
    subscription: Mutex<Option<Subscription>>,
    toast_auto_close: Duration,
}

impl NotificationPanel {
    pub fn new(center: Arc<NotificationCenter>, toast_auto_close: Duration) -> Self {
        Self {
            center,
            state: Arc::new(Mutex::new(PanelState::default())),
            subscription: Mutex::new(None),
            toast_auto_close,
        }
    }

    /// Subscribe to the center. Each snapshot replaces the panel list and
    /// goes through a fresh toast driver bound to `sink`.
    pub fn attach(&self, sink: Arc<dyn AlertSink>) -> Subscription {
        let driver = ToastDriver::new(sink, self.toast_auto_close);
        let state = self.state.clone();
        self.center.subscribe(move |records| {
            let fired = driver.handle_snapshot(&records);
            let mut state = state.lock().unwrap();
            state.notifications = records;
            if fired > 0 {
                state.ringing_until = Some(Instant::now() + BELL_RING_DURATION);
            }
        })
    }

    /// Bind the center to another user and resubscribe the panel.
    ///
    /// Switching to the user already bound keeps the live subscription.
    /// Clearing the user leaves the panel empty and detached.
    pub fn switch_user(&self, user: Option<UserId>, sink: Arc<dyn AlertSink>) {
        let mut subscription = self.subscription.lock().unwrap();
        let attached = subscription.as_ref().is_some_and(Subscription::is_active);
        if attached && user.is_some() && self.center.current_user() == user {
            debug!("Panel already attached for this user");
            return;
        }

        // Dropping the old handle detaches it
        subscription.take();
        self.center.set_user(user.clone());
        self.state.lock().unwrap().notifications.clear();
        if user.is_some() {
            *subscription = Some(self.attach(sink));
        }
    }

    /// Whether the panel holds a live subscription of its own.
    pub fn is_attached(&self) -> bool {
        self.subscription
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        unread_count(&self.state.lock().unwrap().notifications)
    }

    /// Bell badge text; None hides the badge.
    pub fn badge_label(&self) -> Option<String> {
        match self.unread_count() {
            0 => None,
            n if n > BADGE_MAX => Some(format!("{}+", BADGE_MAX)),
            n => Some(n.to_string()),
        }
    }

    /// Header text next to the panel title; None when nothing is unread.
    pub fn header_label(&self) -> Option<String> {
        match self.unread_count() {
            0 => None,
            n => Some(format!("{} new", n)),
        }
    }

    pub fn time_label(&self, record: &NotificationRecord) -> String {
        time_ago(record.timestamp, now_millis())
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().is_open
    }

    pub fn toggle(&self) {
        let mut state = self.state.lock().unwrap();
        state.is_open = !state.is_open;
    }

    pub fn close(&self) {
        self.state.lock().unwrap().is_open = false;
    }

    pub fn is_ringing(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .ringing_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Replace the list with a fresh read from the center.
    pub async fn reload(&self) {
        let records = self.center.get_all().await;
        self.state.lock().unwrap().notifications = records;
    }

    /// Open a notification: mark it read if needed and close the panel.
    /// Returns the url to navigate to.
    pub async fn open_notification(&self, id: &str) -> Option<String> {
        let record = self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .find(|record| record.id == id)
            .cloned();
        self.close();

        let Some(record) = record else {
            debug!("Opened notification {} is no longer listed", id);
            return None;
        };
        if !record.read {
            self.center.mark_as_read(&record.id).await;
        }
        record.url
    }

    pub async fn mark_as_read(&self, id: &str) {
        self.center.mark_as_read(id).await;
    }

    pub async fn mark_all_as_read(&self) {
        self.center.mark_all_as_read().await;
    }

    pub async fn delete(&self, id: &str) {
        self.center.delete_notification(id).await;
        self.reload().await;
    }

    pub async fn clear_all(&self) {
        self.center.delete_all().await;
        self.reload().await;
    }
}
