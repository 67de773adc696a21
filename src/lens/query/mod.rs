//! Query lens
//!
//! This module provides the query lens for reading stored results back as
//! flat tables. It combines the result join from the database with
//! flattening and output formatting.

pub mod args;
pub mod types;

pub use args::QueryArgs;
pub use types::{flatten, FlatTable, JoinedRow, ANALYSIS_ID_COLUMN, SAMPLE_NAME_COLUMN};

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::database::{AnalysisFilter, AnalysisRecord, LabDatabase, ResultFilter};
use crate::lens::utils::{format_psv, format_table, OutputFormat};

/// Query lens over a lab database
///
/// This lens provides high-level operations for:
/// - Fetching results joined to their samples, filtered by analysis or sample
/// - Listing analyses
/// - Formatting and exporting the resulting tables
pub struct QueryLens<'a> {
    db: &'a LabDatabase,
}

impl<'a> QueryLens<'a> {
    pub fn new(db: &'a LabDatabase) -> Self {
        Self { db }
    }

    /// Results of the given analyses as a flat table
    ///
    /// An empty list returns the results of every analysis.
    pub fn results_by_analysis(&self, analysis_ids: &[i64]) -> Result<FlatTable> {
        self.results(&ResultFilter::AnalysisIds(analysis_ids.to_vec()))
    }

    /// Results of the named samples as a flat table
    ///
    /// An empty list returns the results of every sample.
    pub fn results_by_sample(&self, sample_names: &[String]) -> Result<FlatTable> {
        self.results(&ResultFilter::SampleNames(sample_names.to_vec()))
    }

    /// Results matching `filter` as a flat table
    pub fn results(&self, filter: &ResultFilter) -> Result<FlatTable> {
        let joined = self.db.results().joined(filter)?;
        let rows: Vec<JoinedRow> = joined.iter().map(JoinedRow::from).collect();
        let table = flatten(&rows);
        info!(
            "Query returned {} rows with {} metric columns",
            table.len(),
            table.metric_columns().len()
        );
        Ok(table)
    }

    /// Results selected by `args`
    pub fn query(&self, args: &QueryArgs) -> Result<FlatTable> {
        args.validate().map_err(|e| anyhow!(e))?;
        self.results(&args.result_filter())
    }

    pub fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRecord>> {
        self.db.analyses().list(filter)
    }

    /// Format a result table for output
    pub fn format_table(&self, table: &FlatTable, format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Table | OutputFormat::Markdown => {
                Ok(format_table(&table.columns, &table.cell_rows(), format))
            }
            OutputFormat::Psv => Ok(format_psv(&table.columns, &table.cell_rows())),
            OutputFormat::Json => serde_json::to_string(&table.to_records())
                .map_err(|e| anyhow!("Failed to encode results: {}", e)),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&table.to_records())
                .map_err(|e| anyhow!("Failed to encode results: {}", e)),
            OutputFormat::JsonLine => json_lines(&table.to_records()),
        }
    }

    /// Format an analysis listing for output
    pub fn format_analyses(
        &self,
        analyses: &[AnalysisRecord],
        format: &OutputFormat,
    ) -> Result<String> {
        let header: Vec<String> = ["analysis_id", "analysis_name", "date", "department", "analyst"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<String>> = analyses
            .iter()
            .map(|a| {
                vec![
                    a.analysis_id.to_string(),
                    a.analysis_name.clone(),
                    a.date.clone(),
                    a.department.clone().unwrap_or_default(),
                    a.analyst.clone().unwrap_or_default(),
                ]
            })
            .collect();

        match format {
            OutputFormat::Table | OutputFormat::Markdown => {
                Ok(format_table(&header, &rows, format))
            }
            OutputFormat::Psv => Ok(format_psv(&header, &rows)),
            OutputFormat::Json => serde_json::to_string(analyses)
                .map_err(|e| anyhow!("Failed to encode analyses: {}", e)),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(analyses)
                .map_err(|e| anyhow!("Failed to encode analyses: {}", e)),
            OutputFormat::JsonLine => json_lines(analyses),
        }
    }

    /// Deliver a result table either as a CSV file or as formatted text
    ///
    /// With an `output` path the table is exported and nothing is returned
    /// for printing; otherwise the table is formatted with `format`.
    pub fn render(
        &self,
        table: &FlatTable,
        output: Option<&str>,
        format: &OutputFormat,
    ) -> Result<Option<String>> {
        match output {
            Some(path) => {
                self.export_csv(table, path)?;
                Ok(None)
            }
            None => self.format_table(table, format).map(Some),
        }
    }

    /// Write a result table to a CSV file
    pub fn export_csv<P: AsRef<Path>>(&self, table: &FlatTable, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| anyhow!("Failed to create '{}': {}", path.display(), e))?;
        table.write_csv(file)?;
        info!("Exported {} rows to {}", table.len(), path.display());
        Ok(())
    }
}

fn json_lines<T: serde::Serialize>(items: &[T]) -> Result<String> {
    let lines = items
        .iter()
        .map(|item| serde_json::to_string(item))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Failed to encode JSON line: {}", e))?;
    Ok(lines.join("\n"))
}
