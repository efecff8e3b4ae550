//! Inbound delivery payloads and their normalization into records.
//!
//! Payloads come from outside the process and are read leniently: a field of
//! the wrong type is treated as absent instead of rejecting the whole message.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::notifications::{generate_id, NotificationRecord, Severity, DEFAULT_TITLE};

/// Relay message type carrying a notification received in the background.
pub const BACKGROUND_NOTIFICATION: &str = "BACKGROUND_NOTIFICATION";

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushNotificationBlock {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub click_action: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcmOptions {
    #[serde(default, deserialize_with = "lenient")]
    pub link: Option<String>,
}

/// A push message received while the client is in the foreground.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub notification: Option<PushNotificationBlock>,
    /// Free-form data block, carried through onto the record.
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient")]
    pub fcm_options: Option<FcmOptions>,
}

impl PushPayload {
    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }

    /// Build the canonical record, stamped with the local receipt time.
    pub fn normalize(&self, received_at: i64) -> NotificationRecord {
        let block = self.notification.as_ref();

        let id = match first_non_empty([self.message_id.as_deref()]) {
            Some(id) => id.to_string(),
            None => generate_id(received_at),
        };
        let title = first_non_empty([
            block.and_then(|b| b.title.as_deref()),
            self.data_str("title"),
        ])
        .unwrap_or(DEFAULT_TITLE);
        let body = first_non_empty([
            block.and_then(|b| b.body.as_deref()),
            self.data_str("body"),
        ])
        .unwrap_or_default();
        let url = first_non_empty([
            self.fcm_options.as_ref().and_then(|o| o.link.as_deref()),
            block.and_then(|b| b.click_action.as_deref()),
            self.data_str("url"),
        ]);
        let severity = self
            .data_str("severity")
            .and_then(Severity::parse)
            .unwrap_or_default();

        NotificationRecord {
            id,
            title: title.to_string(),
            body: body.to_string(),
            url: url.map(str::to_string),
            data: self.data.clone().map(Value::Object),
            timestamp: received_at,
            read: false,
            severity,
        }
    }
}

/// Notification fields forwarded by the background relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayedNotification {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<String>,
}

/// A message posted by the background relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayMessage {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub notification: Option<RelayedNotification>,
}

impl RelayMessage {
    pub fn is_background_notification(&self) -> bool {
        self.kind.as_deref() == Some(BACKGROUND_NOTIFICATION)
    }

    /// Build the canonical record. Returns None for relay messages that do
    /// not carry a notification.
    pub fn normalize(&self, received_at: i64) -> Option<NotificationRecord> {
        if !self.is_background_notification() {
            return None;
        }
        let relayed = self.notification.as_ref()?;

        let id = match first_non_empty([relayed.id.as_deref()]) {
            Some(id) => id.to_string(),
            None => generate_id(received_at),
        };
        Some(NotificationRecord {
            id,
            title: first_non_empty([relayed.title.as_deref()])
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            body: relayed.body.clone().unwrap_or_default(),
            url: first_non_empty([relayed.url.as_deref()]).map(str::to_string),
            data: relayed.data.clone().filter(|data| !data.is_null()),
            timestamp: received_at,
            read: false,
            severity: relayed
                .severity
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_default(),
        })
    }
}

/// A delivery from either channel.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Foreground(PushPayload),
    Background(RelayMessage),
}

impl InboundMessage {
    /// Parse a raw JSON message. Objects with a `type` field are relay
    /// messages, anything else is a foreground push payload.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("Delivery is not valid JSON")?;
        let Value::Object(object) = &value else {
            bail!("Delivery is not a JSON object");
        };

        if object.contains_key("type") {
            Ok(InboundMessage::Background(serde_json::from_value(value)?))
        } else {
            Ok(InboundMessage::Foreground(serde_json::from_value(value)?))
        }
    }

    pub fn normalize(&self, received_at: i64) -> Option<NotificationRecord> {
        match self {
            InboundMessage::Foreground(payload) => Some(payload.normalize(received_at)),
            InboundMessage::Background(message) => message.normalize(received_at),
        }
    }
}
