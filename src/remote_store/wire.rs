//! Wire format of the remote document service.

use serde::{Deserialize, Serialize};

use crate::notifications::{NotificationRecord, RecordPatch, Severity, DEFAULT_TITLE};

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// A notification document as stored remotely.
///
/// `timestamp` is assigned by the server; clients send it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub severity: Severity,
}

impl RemoteDocument {
    /// Outgoing document for `record`, leaving the timestamp to the server.
    pub fn for_upload(record: &NotificationRecord) -> Self {
        Self {
            timestamp: None,
            ..Self::from_record(record)
        }
    }

    pub fn from_record(record: &NotificationRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            body: record.body.clone(),
            url: record.url.clone(),
            data: record.data.clone(),
            timestamp: Some(record.timestamp),
            read: record.read,
            severity: record.severity,
        }
    }

    /// Convert to a record; documents whose server time is not resolved yet
    /// take `fallback_timestamp`.
    pub fn into_record(self, fallback_timestamp: i64) -> NotificationRecord {
        NotificationRecord {
            id: self.id,
            title: self.title,
            body: self.body,
            url: self.url,
            data: self.data,
            timestamp: self.timestamp.unwrap_or(fallback_timestamp),
            read: self.read,
            severity: self.severity,
        }
    }
}

/// Body of a batch update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    pub ids: Vec<String>,
    pub patch: RecordPatch,
}

/// Body of a batch delete request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<String>,
}

/// Messages pushed over the listener socket.
///
/// Serialized adjacently tagged: `{"type": "snapshot", "payload": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ListenerMessage {
    Snapshot(Vec<RemoteDocument>),
    Error { code: String, message: String },
}
