//! Analysis repository
//!
//! Data access for the `analyses` table.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::records::Analysis;

/// Storage format of `analyses.date`
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Repository for analysis rows
pub struct AnalysisRepository<'a> {
    conn: &'a Connection,
}

/// A row of the `analyses` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_id: i64,
    pub analysis_name: String,
    pub date: String,
    pub department: Option<String>,
    pub analyst: Option<String>,
}

/// Filters for listing analyses; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFilter {
    pub analyst: Option<String>,
    pub department: Option<String>,
    /// Keep analyses dated on or before this day
    pub on_or_before: Option<NaiveDate>,
    /// Keep analyses dated on or after this day
    pub on_or_after: Option<NaiveDate>,
}

impl<'a> AnalysisRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an analysis and return its generated id
    pub fn insert(&self, analysis: &Analysis) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO analyses (analysis_name, date, department, analyst)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    analysis.analysis_name,
                    analysis.date.format(DATE_FORMAT).to_string(),
                    analysis.department,
                    analysis.analyst,
                ],
            )
            .map_err(|e| {
                anyhow!(
                    "Failed to insert analysis '{}': {}",
                    analysis.analysis_name,
                    e
                )
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get analysis count: {}", e))?;
        Ok(count)
    }

    pub fn get(&self, analysis_id: i64) -> Result<Option<AnalysisRecord>> {
        let result = self.conn.query_row(
            "SELECT analysis_id, analysis_name, date, department, analyst
             FROM analyses WHERE analysis_id = ?1",
            [analysis_id],
            Self::map_row,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get analysis {}: {}", analysis_id, e)),
        }
    }

    /// List analyses matching `filter`, ordered by id
    pub fn list(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(analyst) = &filter.analyst {
            clauses.push("analyst = ?");
            values.push(Box::new(analyst.clone()));
        }
        if let Some(department) = &filter.department {
            clauses.push("department = ?");
            values.push(Box::new(department.clone()));
        }
        if let Some(day) = filter.on_or_before {
            clauses.push("date(date) <= date(?)");
            values.push(Box::new(day.format("%Y-%m-%d").to_string()));
        }
        if let Some(day) = filter.on_or_after {
            clauses.push("date(date) >= date(?)");
            values.push(Box::new(day.format("%Y-%m-%d").to_string()));
        }

        let mut query =
            "SELECT analysis_id, analysis_name, date, department, analyst FROM analyses"
                .to_string();
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY analysis_id");

        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| anyhow!("Failed to prepare analysis query: {}", e))?;
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt
            .query_map(params.as_slice(), Self::map_row)
            .map_err(|e| anyhow!("Failed to list analyses: {}", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| anyhow!("Failed to read analysis row: {}", e))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
        Ok(AnalysisRecord {
            analysis_id: row.get(0)?,
            analysis_name: row.get(1)?,
            date: row.get(2)?,
            department: row.get(3)?,
            analyst: row.get(4)?,
        })
    }
}
