//! Notification data models

use std::collections::HashSet;
use std::fmt;

use rand::{distr::Alphanumeric, rng, Rng};
use serde::{Deserialize, Serialize};

/// Title used when a delivery carries none.
pub const DEFAULT_TITLE: &str = "Notification";

/// Maximum number of notifications kept per user.
pub const DEFAULT_RETENTION_CAP: usize = 100;

const ID_SUFFIX_LEN: usize = 9;

/// Identifier of the user a notification list belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Notification severity.
///
/// Unknown values coming from the wire fall back to `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Severity::Success),
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Severity::parse(&s).unwrap_or_default()
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// A user notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Opaque payload carried through from delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub severity: Severity,
}

impl NotificationRecord {
    /// Create an unread `Info` notification with an empty body.
    pub fn new(id: impl Into<String>, title: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: String::new(),
            url: None,
            data: None,
            timestamp,
            read: false,
            severity: Severity::Info,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn mark_read(mut self) -> Self {
        self.read = true;
        self
    }
}

/// Partial update applied to a stored notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

impl RecordPatch {
    pub fn mark_read() -> Self {
        Self { read: Some(true) }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_none()
    }

    pub fn apply(&self, record: &mut NotificationRecord) {
        if let Some(read) = self.read {
            record.read = read;
        }
    }
}

/// Current wall clock time in milliseconds since epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a locally unique notification id, `<millis>-<random suffix>`.
pub fn generate_id(now_millis: i64) -> String {
    let suffix: String = rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{}-{}", now_millis, suffix)
}

/// Bring a list into read order: newest first, unique ids, at most `cap` entries.
///
/// When an id appears more than once, the newest copy wins.
pub fn normalize_list(
    mut records: Vec<NotificationRecord>,
    cap: usize,
) -> Vec<NotificationRecord> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let mut seen = HashSet::with_capacity(records.len());
    records.retain(|record| seen.insert(record.id.clone()));
    records.truncate(cap);
    records
}

/// Number of unread records in a list.
pub fn unread_count(records: &[NotificationRecord]) -> usize {
    records.iter().filter(|record| !record.read).count()
}
