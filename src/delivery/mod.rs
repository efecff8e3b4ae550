//! Push delivery intake.
//!
//! Foreground push payloads and background relay messages are normalized into
//! [`crate::notifications::NotificationRecord`]s and saved through the
//! notification center.

mod listener;
mod payload;

pub use listener::DeliveryListener;
pub use payload::{
    FcmOptions, InboundMessage, PushNotificationBlock, PushPayload, RelayMessage,
    RelayedNotification, BACKGROUND_NOTIFICATION,
};
