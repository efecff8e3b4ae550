//! SQLite schema definitions for the local key-value database.

use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Key-value slots
// =============================================================================

const KEY_VALUE_TABLE_V1: Table = Table {
    name: "key_value",
    columns: &[
        Column {
            name: "key",
            sql_type: SqlType::Text,
            is_primary_key: true,
            non_null: false,
            default_value: None,
        },
        Column {
            name: "value",
            sql_type: SqlType::Text,
            is_primary_key: false,
            non_null: true,
            default_value: None,
        },
        Column {
            name: "updated_at",
            sql_type: SqlType::Integer,
            is_primary_key: false,
            non_null: true,
            default_value: Some("0"),
        },
    ],
};

pub const KEY_VALUE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[KEY_VALUE_TABLE_V1],
    migration: None,
}];
