//! New-arrival alerts.
//!
//! The [`ToastDriver`] runs every subscription snapshot through a
//! [`ChangeDetector`] and raises one toast plus one chime per genuinely new
//! unread notification.

mod change_detector;
mod toast;

pub use change_detector::ChangeDetector;
pub use toast::{apply_toast_action, Toast, ToastAction, DEFAULT_TOAST_AUTO_CLOSE};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::notifications::NotificationRecord;

/// Where alerts end up.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait AlertSink: Send + Sync {
    fn show_toast(&self, toast: Toast);

    fn play_chime(&self);
}

/// Alert sink that writes alerts to the log.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn show_toast(&self, toast: Toast) {
        match &toast.url {
            Some(url) => info!(
                "[{}] {} -> {}",
                toast.severity.as_str(),
                toast.message,
                url
            ),
            None => info!("[{}] {}", toast.severity.as_str(), toast.message),
        }
    }

    fn play_chime(&self) {
        info!("*chime*");
    }
}

pub struct ToastDriver {
    detector: Mutex<ChangeDetector>,
    sink: Arc<dyn AlertSink>,
    auto_close: Duration,
}

impl ToastDriver {
    pub fn new(sink: Arc<dyn AlertSink>, auto_close: Duration) -> Self {
        Self {
            detector: Mutex::new(ChangeDetector::new()),
            sink,
            auto_close,
        }
    }

    /// Process one snapshot. Returns how many alerts were raised.
    pub fn handle_snapshot(&self, snapshot: &[NotificationRecord]) -> usize {
        let mut detector = self.detector.lock().unwrap();
        if !detector.is_armed() {
            debug!("Priming toast baseline with {} notifications", snapshot.len());
        }
        let fresh = detector.observe(snapshot);
        drop(detector);
        for record in &fresh {
            self.sink.show_toast(Toast::for_record(record, self.auto_close));
            self.sink.play_chime();
        }
        fresh.len()
    }

    /// Forget the baseline; the next snapshot primes again.
    pub fn reset(&self) {
        self.detector.lock().unwrap().reset();
    }
}
