//! Result repository
//!
//! Data access for the `results` table and its join onto `samples`.

use anyhow::{anyhow, Result};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::sample::SampleRecord;

/// Repository for result rows
pub struct ResultRepository<'a> {
    conn: &'a Connection,
}

/// A row of the `results` table with its metrics decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub result_id: i64,
    pub sample_id: i64,
    pub metrics: Map<String, Value>,
}

/// A result joined to the sample it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedResult {
    pub result: ResultRecord,
    pub sample: SampleRecord,
}

/// Which joined rows to return
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResultFilter {
    #[default]
    All,
    AnalysisIds(Vec<i64>),
    SampleNames(Vec<String>),
}

const JOIN_SELECT: &str = "SELECT r.result_id, r.sample_id, r.metrics,
        s.sample_id, s.sample_name, s.sample_type, s.sample_description, s.analysis_id
    FROM results AS r
    JOIN samples AS s ON r.sample_id = s.sample_id";

impl<'a> ResultRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert the metrics of one sample and return the generated id
    pub fn insert(&self, sample_id: i64, metrics: &Map<String, Value>) -> Result<i64> {
        let metrics_json = serde_json::to_string(metrics)
            .map_err(|e| anyhow!("Failed to encode metrics: {}", e))?;
        self.conn
            .execute(
                "INSERT INTO results (sample_id, metrics) VALUES (?1, ?2)",
                params![sample_id, metrics_json],
            )
            .map_err(|e| anyhow!("Failed to insert result for sample {}: {}", sample_id, e))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get result count: {}", e))?;
        Ok(count)
    }

    /// Results joined to their samples
    ///
    /// An empty id or name list behaves like [`ResultFilter::All`]. Row order
    /// is whatever SQLite produces for the join and is not guaranteed.
    pub fn joined(&self, filter: &ResultFilter) -> Result<Vec<JoinedResult>> {
        match filter {
            ResultFilter::AnalysisIds(ids) if !ids.is_empty() => {
                let query = format!(
                    "{} WHERE s.analysis_id IN ({})",
                    JOIN_SELECT,
                    placeholders(ids.len())
                );
                self.query_joined(&query, params_from_iter(ids.iter()))
            }
            ResultFilter::SampleNames(names) if !names.is_empty() => {
                let query = format!(
                    "{} WHERE s.sample_name IN ({})",
                    JOIN_SELECT,
                    placeholders(names.len())
                );
                self.query_joined(&query, params_from_iter(names.iter()))
            }
            _ => self.query_joined(JOIN_SELECT, params![]),
        }
    }

    fn query_joined<P: rusqlite::Params>(
        &self,
        query: &str,
        params: P,
    ) -> Result<Vec<JoinedResult>> {
        let mut stmt = self
            .conn
            .prepare(query)
            .map_err(|e| anyhow!("Failed to prepare results query: {}", e))?;

        let rows = stmt
            .query_map(params, |row| {
                let metrics: String = row.get(2)?;
                Ok((metrics, Self::map_joined(row)?))
            })
            .map_err(|e| anyhow!("Failed to query results: {}", e))?;

        let mut joined = Vec::new();
        for row in rows {
            let (metrics, mut item) = row.map_err(|e| anyhow!("Failed to read result row: {}", e))?;
            item.result.metrics = serde_json::from_str(&metrics).map_err(|e| {
                anyhow!(
                    "Result {} has malformed metrics: {}",
                    item.result.result_id,
                    e
                )
            })?;
            joined.push(item);
        }
        Ok(joined)
    }

    fn map_joined(row: &Row<'_>) -> rusqlite::Result<JoinedResult> {
        Ok(JoinedResult {
            result: ResultRecord {
                result_id: row.get(0)?,
                sample_id: row.get(1)?,
                metrics: Map::new(),
            },
            sample: SampleRecord {
                sample_id: row.get(3)?,
                sample_name: row.get(4)?,
                sample_type: row.get(5)?,
                sample_description: row.get(6)?,
                analysis_id: row.get(7)?,
            },
        })
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
