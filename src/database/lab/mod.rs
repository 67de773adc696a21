//! Lab database storage
//!
//! This module provides the persistent database holding analyses, their
//! samples and the results measured for each sample:
//!
//! ```text
//! analyses 1───n samples 1───n results (metrics as JSON)
//! ```

mod analysis;
mod result;
mod sample;

pub use analysis::{AnalysisFilter, AnalysisRecord, AnalysisRepository, DATE_FORMAT};
pub use result::{JoinedResult, ResultFilter, ResultRecord, ResultRepository};
pub use sample::{SampleRecord, SampleRepository};

use std::rc::Rc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::database::core::{DatabaseConn, RetryPolicy, SchemaManager, SchemaStatus};
use crate::metrics::MetricSchema;
use crate::records::Batch;

/// Meta key under which the registered metric schema is stored
pub const METRIC_SCHEMA_KEY: &str = "metric_schema";

/// Row counts of the lab tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub analyses: u64,
    pub samples: u64,
    pub results: u64,
}

/// Ids generated by one committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub analysis_id: i64,
    pub sample_ids: Vec<i64>,
    pub result_ids: Vec<i64>,
}

/// Lab database (SQLite backend)
///
/// `LabDatabase` provides a unified interface to the lab tables. It handles:
/// - Schema initialization on creation
/// - Metric schema registration
/// - Atomic insertion of record batches
/// - Access to the table repositories
pub struct LabDatabase {
    db: DatabaseConn,
}

impl LabDatabase {
    /// Create (or re-open) the database at `path` and apply the schema
    ///
    /// Creating an already initialized database is a no-op apart from
    /// replacing the registered metric schema when one is given.
    pub fn create(path: &str, metric_schema: Option<&MetricSchema>) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {
                info!("Lab database schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing lab database schema at {}", path);
                schema.initialize()?;
            }
            status @ SchemaStatus::Damaged(_) if status.is_repairable() => {
                warn!("Lab database schema is {}, recreating missing tables", status);
                schema.initialize()?;
            }
            status @ SchemaStatus::Damaged(_) => {
                return Err(anyhow!("Database '{}' schema is {}", path, status));
            }
            status @ SchemaStatus::Incompatible { .. } => {
                return Err(anyhow!("Database '{}' schema is {}", path, status));
            }
        }

        let lab = Self { db };
        if let Some(metrics) = metric_schema {
            lab.set_metric_schema(metrics)?;
        }
        Ok(lab)
    }

    /// Open an existing, initialized database
    pub fn open(path: &str, retry: &RetryPolicy) -> Result<Self> {
        let db = DatabaseConn::open_existing(path, retry)?;

        match SchemaManager::new(&db.conn).check_status()? {
            SchemaStatus::Current => Ok(Self { db }),
            status => Err(anyhow!(
                "Database '{}' schema is {}; run `create-database` first",
                path,
                status
            )),
        }
    }

    /// Create an in-memory lab database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    pub fn analyses(&self) -> AnalysisRepository<'_> {
        AnalysisRepository::new(&self.db.conn)
    }

    pub fn samples(&self) -> SampleRepository<'_> {
        SampleRepository::new(&self.db.conn)
    }

    pub fn results(&self) -> ResultRepository<'_> {
        ResultRepository::new(&self.db.conn)
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    pub fn schema_status(&self) -> Result<SchemaStatus> {
        SchemaManager::new(&self.db.conn).check_status()
    }

    pub fn counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            analyses: self.analyses().count()?,
            samples: self.samples().count()?,
            results: self.results().count()?,
        })
    }

    /// Register the metric schema used to validate inserted results
    pub fn set_metric_schema(&self, metrics: &MetricSchema) -> Result<()> {
        let json = serde_json::to_string(metrics)
            .map_err(|e| anyhow!("Failed to encode metric schema: {}", e))?;
        SchemaManager::new(&self.db.conn).set_meta(METRIC_SCHEMA_KEY, &json)?;
        info!("Registered metric schema with {} metrics", metrics.len());
        Ok(())
    }

    /// The registered metric schema, if any
    pub fn metric_schema(&self) -> Result<Option<MetricSchema>> {
        match SchemaManager::new(&self.db.conn).get_meta(METRIC_SCHEMA_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| anyhow!("Stored metric schema is malformed: {}", e)),
            None => Ok(None),
        }
    }

    /// Persist a batch in one transaction
    ///
    /// Either every row of the batch is committed or none is: any failure
    /// drops the transaction before commit, which rolls it back.
    pub fn insert_batch(&self, batch: &Batch) -> Result<BatchSummary> {
        let tx = self.db.transaction()?;

        let analysis_id = AnalysisRepository::new(&tx).insert(&batch.analysis)?;

        let samples = SampleRepository::new(&tx);
        let mut sample_ids = Vec::with_capacity(batch.samples.len());
        for sample in &batch.samples {
            if !Rc::ptr_eq(&sample.analysis, &batch.analysis) {
                return Err(anyhow!(
                    "Sample '{}' belongs to a different analysis than the batch",
                    sample.sample_name
                ));
            }
            sample_ids.push(samples.insert(sample, analysis_id)?);
        }

        let results = ResultRepository::new(&tx);
        let mut result_ids = Vec::with_capacity(batch.results.len());
        for result in &batch.results {
            let index = batch
                .samples
                .iter()
                .position(|s| Rc::ptr_eq(s, &result.sample))
                .ok_or_else(|| {
                    anyhow!(
                        "Result for sample '{}' references a sample outside the batch",
                        result.sample.sample_name
                    )
                })?;
            result_ids.push(results.insert(sample_ids[index], &result.metrics)?);
        }

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit transaction: {}", e))?;

        info!(
            "Inserted analysis {} with {} samples and {} results",
            analysis_id,
            sample_ids.len(),
            result_ids.len()
        );

        Ok(BatchSummary {
            analysis_id,
            sample_ids,
            result_ids,
        })
    }
}
