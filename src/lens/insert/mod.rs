//! Insert lens
//!
//! Loads a metadata document and a results file, builds the complete batch
//! of records and commits it in one transaction.

pub mod args;
pub mod types;

pub use args::InsertArgs;
pub use types::InsertSummary;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use crate::database::LabDatabase;
use crate::lens::utils::{format_psv, format_table, OutputFormat};
use crate::records::{build_batch, Batch, MetadataDocument, RecordError, ResultsTable};

/// Insert lens over a lab database
pub struct InsertLens<'a> {
    db: &'a LabDatabase,
}

impl<'a> InsertLens<'a> {
    pub fn new(db: &'a LabDatabase) -> Self {
        Self { db }
    }

    /// Read both input files and build the batch without writing anything
    ///
    /// Results are validated against the registered metric schema when the
    /// database has one.
    pub fn prepare(&self, args: &InsertArgs) -> Result<Batch> {
        let metadata = MetadataDocument::from_path(&args.metadata).map_err(record_error)?;
        let table = ResultsTable::from_path(&args.results).map_err(record_error)?;
        debug!(
            "Loaded {} samples and {} results rows",
            metadata.samples.len(),
            table.rows.len()
        );

        let schema = self.db.metric_schema()?;
        build_batch(&metadata, &table, schema.as_ref()).map_err(record_error)
    }

    /// Build and commit the records described by `args`
    pub fn insert(&self, args: &InsertArgs) -> Result<InsertSummary> {
        let batch = self.prepare(args)?;
        self.insert_batch(&batch)
    }

    /// Commit an already built batch
    pub fn insert_batch(&self, batch: &Batch) -> Result<InsertSummary> {
        let committed = self.db.insert_batch(batch)?;

        let samples_without_results = batch.samples_without_rows.clone();
        if !samples_without_results.is_empty() {
            info!(
                "{} samples have no results: {}",
                samples_without_results.len(),
                samples_without_results.join(", ")
            );
        }

        Ok(InsertSummary {
            analysis_id: committed.analysis_id,
            analysis_name: batch.analysis.analysis_name.clone(),
            samples: committed.sample_ids.len(),
            results: committed.result_ids.len(),
            samples_without_results,
        })
    }

    /// Format an insert summary for output
    pub fn format_summary(&self, summary: &InsertSummary, format: &OutputFormat) -> Result<String> {
        let header: Vec<String> = ["analysis_id", "analysis_name", "samples", "results"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = vec![vec![
            summary.analysis_id.to_string(),
            summary.analysis_name.clone(),
            summary.samples.to_string(),
            summary.results.to_string(),
        ]];

        match format {
            OutputFormat::Table | OutputFormat::Markdown => {
                Ok(format_table(&header, &rows, format))
            }
            OutputFormat::Psv => Ok(format_psv(&header, &rows)),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary)
                .map_err(|e| anyhow!("Failed to encode summary: {}", e)),
            OutputFormat::Json | OutputFormat::JsonLine => serde_json::to_string(summary)
                .map_err(|e| anyhow!("Failed to encode summary: {}", e)),
        }
    }
}

fn record_error(e: RecordError) -> anyhow::Error {
    anyhow!("{}: {}", e.kind(), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TableCounts;
    use crate::metrics::MetricSchema;
    use std::fs;
    use std::path::Path;

    fn write_inputs(dir: &Path, metadata: &str, results: &str) -> InsertArgs {
        let metadata_path = dir.join("metadata.json");
        let results_path = dir.join("results.csv");
        fs::write(&metadata_path, metadata).unwrap();
        fs::write(&results_path, results).unwrap();
        InsertArgs::new(
            metadata_path.to_str().unwrap(),
            results_path.to_str().unwrap(),
        )
    }

    #[test]
    fn test_insert_single_sample() {
        let db = LabDatabase::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(
            dir.path(),
            r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"}]}"#,
            "sample_name,metric1\nS1,0.5\n",
        );

        let summary = InsertLens::new(&db).insert(&args).unwrap();
        assert_eq!(summary.analysis_name, "A1");
        assert_eq!(summary.samples, 1);
        assert_eq!(summary.results, 1);
        assert!(summary.samples_without_results.is_empty());

        let joined = db.results().joined(&Default::default()).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].result.metrics["metric1"], serde_json::json!(0.5));
    }

    #[test]
    fn test_missing_analysis_name_writes_nothing() {
        let db = LabDatabase::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(
            dir.path(),
            r#"{"Analysis":{"analyst":"DMT"},"Samples":[{"sample_name":"S1"}]}"#,
            "sample_name,metric1\nS1,0.5\n",
        );

        let err = InsertLens::new(&db).insert(&args).unwrap_err();
        assert!(err.to_string().starts_with("validation error"));
        assert_eq!(db.counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn test_unknown_sample_is_referential() {
        let db = LabDatabase::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(
            dir.path(),
            r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"}]}"#,
            "sample_name,metric1\nS1,0.5\nS9,0.1\n",
        );

        let err = InsertLens::new(&db).insert(&args).unwrap_err();
        assert!(err.to_string().starts_with("referential error"));
        assert_eq!(db.counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn test_registered_schema_is_applied() {
        let db = LabDatabase::open_in_memory().unwrap();
        db.set_metric_schema(&MetricSchema::from_pairs(&[("metric1", "Integer")]).unwrap())
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let bad = write_inputs(
            dir.path(),
            r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"}]}"#,
            "sample_name,metric1\nS1,0.5\n",
        );
        assert!(InsertLens::new(&db).insert(&bad).is_err());
        assert_eq!(db.counts().unwrap(), TableCounts::default());

        let good = write_inputs(
            dir.path(),
            r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"},{"sample_name":"S2"}]}"#,
            "sample_name,metric1\nS1,7\n",
        );
        let summary = InsertLens::new(&db).insert(&good).unwrap();
        assert_eq!(summary.samples_without_results, vec!["S2"]);
        assert_eq!(summary.results, 2);
    }

    #[test]
    fn test_blank_results_row_is_not_missing() {
        let db = LabDatabase::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(
            dir.path(),
            r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"},{"sample_name":"S2"},{"sample_name":"S3"}]}"#,
            "sample_name,metric1,metric2\nS1,0.5,1\nS2,,\n",
        );

        let summary = InsertLens::new(&db).insert(&args).unwrap();
        assert_eq!(summary.results, 3);
        assert_eq!(summary.samples_without_results, vec!["S3"]);
    }

    #[test]
    fn test_format_summary() {
        let db = LabDatabase::open_in_memory().unwrap();
        let lens = InsertLens::new(&db);
        let summary = InsertSummary {
            analysis_id: 3,
            analysis_name: "A1".to_string(),
            samples: 2,
            results: 2,
            samples_without_results: vec![],
        };

        let psv = lens.format_summary(&summary, &OutputFormat::Psv).unwrap();
        assert_eq!(psv, "analysis_id|analysis_name|samples|results\n3|A1|2|2");

        let json = lens.format_summary(&summary, &OutputFormat::Json).unwrap();
        let parsed: InsertSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
