use std::time::Duration;

use tracing::debug;

use crate::center::NotificationCenter;
use crate::notifications::{NotificationRecord, Severity};

pub const DEFAULT_TOAST_AUTO_CLOSE: Duration = Duration::from_millis(2000);

/// A transient alert for one newly arrived notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub notification_id: String,
    /// Body, or the title when the body is empty.
    pub message: String,
    pub url: Option<String>,
    pub severity: Severity,
    pub auto_close: Duration,
}

impl Toast {
    pub fn for_record(record: &NotificationRecord, auto_close: Duration) -> Self {
        let message = if record.body.is_empty() {
            record.title.clone()
        } else {
            record.body.clone()
        };
        Self {
            notification_id: record.id.clone(),
            message,
            url: record.url.clone(),
            severity: record.severity,
            auto_close,
        }
    }
}

/// What the user did with a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastAction {
    MarkAsRead,
    Dismiss,
    /// Clicked the toast body.
    Open,
}

/// Carry out a toast action. Returns the url to navigate to, if any.
pub async fn apply_toast_action(
    center: &NotificationCenter,
    toast: &Toast,
    action: ToastAction,
) -> Option<String> {
    debug!("Toast action {:?} on {}", action, toast.notification_id);
    match action {
        ToastAction::MarkAsRead => {
            center.mark_as_read(&toast.notification_id).await;
            None
        }
        ToastAction::Dismiss => None,
        ToastAction::Open => toast.url.clone(),
    }
}
