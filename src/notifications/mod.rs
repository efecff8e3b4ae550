//! User notifications module

mod models;

pub use models::{
    generate_id, normalize_list, now_millis, unread_count, NotificationRecord, RecordPatch,
    Severity, UserId, DEFAULT_RETENTION_CAP, DEFAULT_TITLE,
};
