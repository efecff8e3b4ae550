use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use tracing::info;

/// Offset added to schema versions when stored in `PRAGMA user_version`,
/// so that databases not created by us are rejected instead of migrated.
pub const BASE_DB_VERSION: usize = 41000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            _ => None,
        }
    }
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    def.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    def.push_str(" NOT NULL");
                }
                if let Some(default_value) = column.default_value {
                    def.push_str(&format!(" DEFAULT {}", default_value));
                }
                def
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])?;
        Ok(())
    }

    /// Check that the live table has exactly the expected columns, in order.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? > 0,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}",
                self.name,
                actual.len(),
                self.columns.len()
            );
        }

        for ((name, sql_type, non_null, is_primary_key), expected) in
            actual.iter().zip(self.columns.iter())
        {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::parse(sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    sql_type
                );
            }
            // SQLite reports primary keys as nullable unless declared otherwise
            if !expected.is_primary_key && *non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    non_null
                );
            }
            if *is_primary_key != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.is_primary_key,
                    is_primary_key
                );
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    /// Migration from the previous version to this one.
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Bring `conn` to the latest schema in `schemas`.
///
/// Fresh databases are created at the latest version. Existing ones are
/// validated against their recorded version and migrated forward inside a
/// single transaction.
pub fn open_versioned(
    conn: &mut Connection,
    is_new_db: bool,
    schemas: &[VersionedSchema],
    label: &str,
) -> Result<()> {
    let latest = schemas
        .last()
        .with_context(|| format!("No schema versions defined for {} database", label))?;

    if is_new_db {
        info!("Creating new {} database at version {}", label, latest.version);
        return latest.create(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        bail!(
            "{} database version {} is invalid (expected >= 1)",
            label,
            db_version
        );
    }
    let db_version = db_version as usize;

    let version_index = schemas
        .iter()
        .position(|s| s.version == db_version)
        .with_context(|| format!("Unknown {} database version {}", label, db_version))?;
    schemas[version_index].validate(conn).with_context(|| {
        format!(
            "{} database schema validation failed for version {}",
            label, db_version
        )
    })?;

    if db_version < latest.version {
        let tx = conn.transaction()?;
        for schema in &schemas[version_index + 1..] {
            info!(
                "Running {} database migration to version {}",
                label, schema.version
            );
            if let Some(migration) = schema.migration {
                migration(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest.version),
            [],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_V1: Table = Table {
        name: "notes",
        columns: &[
            Column {
                name: "id",
                sql_type: SqlType::Text,
                is_primary_key: true,
                non_null: false,
                default_value: None,
            },
            Column {
                name: "body",
                sql_type: SqlType::Text,
                is_primary_key: false,
                non_null: true,
                default_value: None,
            },
        ],
    };

    const NOTES_V2: Table = Table {
        name: "notes",
        columns: &[
            Column {
                name: "id",
                sql_type: SqlType::Text,
                is_primary_key: true,
                non_null: false,
                default_value: None,
            },
            Column {
                name: "body",
                sql_type: SqlType::Text,
                is_primary_key: false,
                non_null: true,
                default_value: None,
            },
            Column {
                name: "pinned",
                sql_type: SqlType::Integer,
                is_primary_key: false,
                non_null: true,
                default_value: Some("0"),
            },
        ],
    };

    fn migrate_add_pinned(conn: &Connection) -> Result<()> {
        conn.execute(
            "ALTER TABLE notes ADD COLUMN pinned INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        Ok(())
    }

    const SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 1,
            tables: &[NOTES_V1],
            migration: None,
        },
        VersionedSchema {
            version: 2,
            tables: &[NOTES_V2],
            migration: Some(migrate_add_pinned),
        },
    ];

    fn user_version(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_gets_latest_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_versioned(&mut conn, true, SCHEMAS, "test").unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 2) as i64);
        SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn test_existing_database_is_migrated() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.db");

        {
            let conn = Connection::open(&path).unwrap();
            SCHEMAS[0].create(&conn).unwrap();
            conn.execute("INSERT INTO notes (id, body) VALUES ('a', 'hello')", [])
                .unwrap();
        }

        let mut conn = Connection::open(&path).unwrap();
        open_versioned(&mut conn, false, SCHEMAS, "test").unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 2) as i64);
        let pinned: i64 = conn
            .query_row("SELECT pinned FROM notes WHERE id = 'a'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(pinned, 0);
    }

    #[test]
    fn test_foreign_database_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE other (x INTEGER)", []).unwrap();

        let result = open_versioned(&mut conn, false, SCHEMAS, "test");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid"));
    }

    #[test]
    fn test_validation_detects_column_drift() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();

        assert!(SCHEMAS[1].validate(&conn).is_err());
    }
}
