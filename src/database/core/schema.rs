//! Database schema management
//!
//! This module provides the schema definitions for the lab database and the
//! manager that applies them. The schema is a plain value handed to whoever
//! opens a connection; there is no process-wide registry of tables.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Schema definitions for all tables in the lab database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and the metric schema)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS labstore_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    pub const ANALYSES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS analyses (
            analysis_id INTEGER PRIMARY KEY AUTOINCREMENT,
            analysis_name TEXT NOT NULL,
            date TEXT NOT NULL DEFAULT (datetime('now')),
            department TEXT,
            analyst TEXT
        );
    "#;

    pub const SAMPLES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS samples (
            sample_id INTEGER PRIMARY KEY AUTOINCREMENT,
            sample_name TEXT NOT NULL,
            sample_type TEXT,
            sample_description TEXT,
            analysis_id INTEGER NOT NULL REFERENCES analyses(analysis_id)
        );
    "#;

    /// Results keep their metrics as a JSON object so the metric set can vary
    pub const RESULTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS results (
            result_id INTEGER PRIMARY KEY AUTOINCREMENT,
            sample_id INTEGER NOT NULL REFERENCES samples(sample_id),
            metrics TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(metrics))
        );
    "#;

    /// Data tables in creation order, parents before children
    pub const TABLES: &'static [TableDefinition] = &[
        TableDefinition {
            name: "analyses",
            ddl: Self::ANALYSES_TABLE,
            columns: &["analysis_id", "analysis_name", "date", "department", "analyst"],
        },
        TableDefinition {
            name: "samples",
            ddl: Self::SAMPLES_TABLE,
            columns: &[
                "sample_id",
                "sample_name",
                "sample_type",
                "sample_description",
                "analysis_id",
            ],
        },
        TableDefinition {
            name: "results",
            ddl: Self::RESULTS_TABLE,
            columns: &["result_id", "sample_id", "metrics"],
        },
    ];

    /// Constraint that keeps `results.metrics` a JSON document
    pub const METRICS_CHECK: &'static str = "json_valid(metrics)";

    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_samples_analysis_id ON samples(analysis_id)",
        "CREATE INDEX IF NOT EXISTS idx_samples_sample_name ON samples(sample_name)",
        "CREATE INDEX IF NOT EXISTS idx_results_sample_id ON results(sample_id)",
        "CREATE INDEX IF NOT EXISTS idx_analyses_analyst ON analyses(analyst)",
        "CREATE INDEX IF NOT EXISTS idx_analyses_department ON analyses(department)",
    ];
}

/// One data table: its DDL and the columns the repositories read
pub struct TableDefinition {
    pub name: &'static str,
    pub ddl: &'static str,
    pub columns: &'static [&'static str],
}

/// Schema manager for the lab database
///
/// Handles schema initialization and version checking.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Creates all tables and indexes if they don't exist and records the
    /// schema version. Safe to call on an already initialized database.
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        for table in SchemaDefinitions::TABLES {
            self.conn
                .execute(table.ddl, [])
                .map_err(|e| anyhow!("Failed to create {} table: {}", table.name, e))?;
        }

        for index_sql in SchemaDefinitions::INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create index: {}", e))?;
        }

        Ok(())
    }

    /// Check the current schema status
    ///
    /// A database without the meta table was never created by labstore. One
    /// written by another schema version is not inspected further.
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if self.table_sql("labstore_meta")?.is_none() {
            return Ok(SchemaStatus::NotInitialized);
        }

        let database_version = self.get_schema_version()?;
        if database_version != SCHEMA_VERSION {
            return Ok(SchemaStatus::Incompatible {
                database_version,
                required_version: SCHEMA_VERSION,
            });
        }

        let problems = self.find_problems()?;
        if problems.is_empty() {
            Ok(SchemaStatus::Current)
        } else {
            Ok(SchemaStatus::Damaged(problems))
        }
    }

    /// Get the current schema version from the database
    fn get_schema_version(&self) -> Result<u32> {
        let version = self
            .get_meta("schema_version")?
            .unwrap_or_else(|| "0".to_string());

        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    /// Describe every way the data tables differ from their definitions
    ///
    /// Each data table must exist with the columns the repositories read,
    /// and `results.metrics` must still carry its JSON check.
    fn find_problems(&self) -> Result<Vec<String>> {
        let mut problems = Vec::new();

        for table in SchemaDefinitions::TABLES {
            let Some(sql) = self.table_sql(table.name)? else {
                problems.push(format!("table {} is missing", table.name));
                continue;
            };

            let present = self.column_names(table.name)?;
            for column in table.columns {
                if !present.iter().any(|c| c == column) {
                    problems.push(format!("column {}.{} is missing", table.name, column));
                }
            }

            if table.name == "results" && !sql.contains(SchemaDefinitions::METRICS_CHECK) {
                problems.push("column results.metrics has no JSON check".to_string());
            }
        }

        Ok(problems)
    }

    /// The `CREATE TABLE` statement of `table`, if the table exists
    fn table_sql(&self, table: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        );

        match result {
            Ok(sql) => Ok(Some(sql)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to read definition of {}: {}", table, e)),
        }
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(|e| anyhow!("Failed to prepare column query: {}", e))?;
        let names = stmt
            .query_map([table], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to list columns of {}: {}", table, e))?;

        names
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| anyhow!("Failed to read column of {}: {}", table, e))
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO labstore_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM labstore_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// No labstore tables yet
    NotInitialized,

    Current,

    /// Database was written by a different schema version
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Right version, but tables, columns or the metrics check are missing
    Damaged(Vec<String>),
}

impl SchemaStatus {
    /// True when every problem can be fixed by creating the missing tables
    pub fn is_repairable(&self) -> bool {
        match self {
            SchemaStatus::Damaged(problems) => problems
                .iter()
                .all(|p| p.starts_with("table ") && p.ends_with(" is missing")),
            _ => false,
        }
    }
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current => write!(f, "current (v{})", SCHEMA_VERSION),
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => write!(
                f,
                "incompatible (database v{}, required v{})",
                database_version, required_version
            ),
            SchemaStatus::Damaged(problems) => write!(f, "damaged ({})", problems.join("; ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys=ON", []).unwrap();
        conn
    }

    #[test]
    fn test_schema_not_initialized() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }

    #[test]
    fn test_schema_initialize_is_idempotent() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        manager.initialize().unwrap();

        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        assert_eq!(manager.get_schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_missing_table_is_repairable() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        conn.execute("DROP TABLE results", []).unwrap();

        let status = manager.check_status().unwrap();
        assert_eq!(
            status,
            SchemaStatus::Damaged(vec!["table results is missing".to_string()])
        );
        assert!(status.is_repairable());

        manager.initialize().unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_results_without_json_check_is_damaged() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        conn.execute("DROP TABLE results", []).unwrap();
        conn.execute(
            "CREATE TABLE results (result_id INTEGER PRIMARY KEY, sample_id INTEGER, metrics TEXT)",
            [],
        )
        .unwrap();

        let status = manager.check_status().unwrap();
        assert_eq!(
            status,
            SchemaStatus::Damaged(vec!["column results.metrics has no JSON check".to_string()])
        );
        assert!(!status.is_repairable());
        assert!(status.to_string().starts_with("damaged ("));
    }

    #[test]
    fn test_missing_column_is_damaged() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        conn.execute("DROP INDEX idx_analyses_analyst", []).unwrap();
        conn.execute("ALTER TABLE analyses DROP COLUMN analyst", [])
            .unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Damaged(vec!["column analyses.analyst is missing".to_string()])
        );
    }

    #[test]
    fn test_schema_incompatible() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        manager.set_meta("schema_version", "99").unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Incompatible {
                database_version: 99,
                required_version: SCHEMA_VERSION
            }
        );
    }

    #[test]
    fn test_meta_operations() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();

        manager.set_meta("test_key", "test_value").unwrap();
        let value = manager.get_meta("test_key").unwrap();
        assert_eq!(value, Some("test_value".to_string()));

        let missing = manager.get_meta("nonexistent").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = create_test_db();
        SchemaManager::new(&conn).initialize().unwrap();

        let orphan = conn.execute(
            "INSERT INTO samples (sample_name, analysis_id) VALUES ('S1', 42)",
            [],
        );
        assert!(orphan.is_err());

        conn.execute("INSERT INTO analyses (analysis_name) VALUES ('A1')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO samples (sample_name, analysis_id) VALUES ('S1', 1)",
            [],
        )
        .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO results (sample_id, metrics) VALUES (1, 'not json')",
                [],
            )
            .is_err());
    }
}
