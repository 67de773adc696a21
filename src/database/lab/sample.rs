//! Sample repository
//!
//! Data access for the `samples` table.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::records::Sample;

/// Repository for sample rows
pub struct SampleRepository<'a> {
    conn: &'a Connection,
}

/// A row of the `samples` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_id: i64,
    pub sample_name: String,
    pub sample_type: Option<String>,
    pub sample_description: Option<String>,
    pub analysis_id: i64,
}

impl<'a> SampleRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a sample under `analysis_id` and return its generated id
    pub fn insert(&self, sample: &Sample, analysis_id: i64) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO samples (sample_name, sample_type, sample_description, analysis_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    sample.sample_name,
                    sample.sample_type,
                    sample.sample_description,
                    analysis_id,
                ],
            )
            .map_err(|e| anyhow!("Failed to insert sample '{}': {}", sample.sample_name, e))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get sample count: {}", e))?;
        Ok(count)
    }

    /// All samples belonging to one analysis, ordered by id
    pub fn by_analysis(&self, analysis_id: i64) -> Result<Vec<SampleRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT sample_id, sample_name, sample_type, sample_description, analysis_id
                 FROM samples WHERE analysis_id = ?1 ORDER BY sample_id",
            )
            .map_err(|e| anyhow!("Failed to prepare sample query: {}", e))?;
        let rows = stmt
            .query_map([analysis_id], Self::map_row)
            .map_err(|e| anyhow!("Failed to list samples: {}", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| anyhow!("Failed to read sample row: {}", e))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SampleRecord> {
        Ok(SampleRecord {
            sample_id: row.get(0)?,
            sample_name: row.get(1)?,
            sample_type: row.get(2)?,
            sample_description: row.get(3)?,
            analysis_id: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, SchemaManager};
    use crate::records::{parse_date, Analysis};
    use std::rc::Rc;

    #[test]
    fn test_insert_requires_analysis() {
        let db = DatabaseConn::open_in_memory().unwrap();
        SchemaManager::new(&db.conn).initialize().unwrap();
        let repo = SampleRepository::new(&db.conn);

        let analysis = Rc::new(Analysis {
            analysis_name: "A1".to_string(),
            date: parse_date("2020-01-01").unwrap(),
            department: None,
            analyst: None,
        });
        let sample = Sample {
            sample_name: "S1".to_string(),
            sample_type: Some("Test".to_string()),
            sample_description: None,
            analysis,
        };

        assert!(repo.insert(&sample, 1).is_err());

        db.execute("INSERT INTO analyses (analysis_name) VALUES ('A1')")
            .unwrap();
        let id = repo.insert(&sample, 1).unwrap();

        let samples = repo.by_analysis(1).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sample_id, id);
        assert_eq!(samples[0].sample_type.as_deref(), Some("Test"));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_by_analysis_reports_missing_table() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let repo = SampleRepository::new(&db.conn);

        let err = repo.by_analysis(1).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Failed to prepare sample query:"));
    }
}
