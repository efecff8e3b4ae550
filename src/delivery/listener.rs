use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::payload::{InboundMessage, PushPayload, RelayMessage};
use crate::center::NotificationCenter;
use crate::notifications::now_millis;

/// Feeds deliveries from both channels into the notification center.
///
/// Each normalized record is saved exactly once. Alerts are not raised here:
/// they follow from the subscription snapshot the save produces.
pub struct DeliveryListener {
    center: Arc<NotificationCenter>,
}

impl DeliveryListener {
    pub fn new(center: Arc<NotificationCenter>) -> Self {
        Self { center }
    }

    /// Normalize and save one delivery. Returns the id of the saved record,
    /// or None if the message carried no notification.
    pub async fn deliver(&self, message: InboundMessage) -> Option<String> {
        let Some(record) = message.normalize(now_millis()) else {
            debug!("Ignoring relay message without a notification");
            return None;
        };

        let id = record.id.clone();
        info!("Received notification {} ({})", id, record.title);
        self.center.save(record).await;
        Some(id)
    }

    /// Parse and deliver a raw JSON message. Malformed input is logged and dropped.
    pub async fn deliver_json(&self, raw: &str) -> Option<String> {
        match InboundMessage::from_json(raw) {
            Ok(message) => self.deliver(message).await,
            Err(e) => {
                warn!("Dropping malformed delivery: {:#}", e);
                None
            }
        }
    }

    /// Drain both channels until they close or `shutdown` fires.
    pub async fn run(
        &self,
        mut foreground: mpsc::Receiver<PushPayload>,
        mut background: mpsc::Receiver<RelayMessage>,
        shutdown: CancellationToken,
    ) {
        let mut foreground_open = true;
        let mut background_open = true;

        while foreground_open || background_open {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Delivery listener shutting down");
                    break;
                }
                payload = foreground.recv(), if foreground_open => match payload {
                    Some(payload) => {
                        self.deliver(InboundMessage::Foreground(payload)).await;
                    }
                    None => foreground_open = false,
                },
                message = background.recv(), if background_open => match message {
                    Some(message) => {
                        self.deliver(InboundMessage::Background(message)).await;
                    }
                    None => background_open = false,
                },
            }
        }
        debug!("Delivery listener stopped");
    }
}
