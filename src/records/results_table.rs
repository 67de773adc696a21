//! Tabular results input
//!
//! The first column holds the sample name used to join a row onto a sample,
//! every other column is a metric.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::RecordError;

/// One data row of a results file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsRow {
    pub sample_name: String,
    /// Raw metric cells, aligned with [`ResultsTable::metric_columns`]
    pub values: Vec<String>,
    /// Line number in the source file (1-based, header is line 1)
    pub line: u64,
}

/// An in-memory results file
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    pub key_column: String,
    pub metric_columns: Vec<String>,
    pub rows: Vec<ResultsRow>,
}

impl ResultsTable {
    /// Read a results file, picking the delimiter from the file extension
    ///
    /// `.tsv` and `.tab` files are tab separated, everything else is read as CSV.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let delimiter = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("tsv") | Some("tab") => b'\t',
            _ => b',',
        };

        let file = File::open(path).map_err(|e| RecordError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file, delimiter)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, RecordError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut columns = headers.iter().map(|h| h.to_string());

        let key_column = match columns.next() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(RecordError::MissingResultsHeader),
        };

        let metric_columns: Vec<String> = columns.collect();
        let mut seen = HashSet::new();
        for column in &metric_columns {
            if column == &key_column || !seen.insert(column.as_str()) {
                return Err(RecordError::DuplicateColumn(column.clone()));
            }
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let mut cells = record.iter();
            let sample_name = cells.next().unwrap_or("").to_string();
            if sample_name.is_empty() {
                return Err(RecordError::EmptySampleKey { line });
            }

            rows.push(ResultsRow {
                sample_name,
                values: cells.map(|c| c.to_string()).collect(),
                line,
            });
        }

        Ok(ResultsTable {
            key_column,
            metric_columns,
            rows,
        })
    }

    /// Rows whose sample-name column equals `sample_name`
    pub fn rows_for<'a>(&'a self, sample_name: &'a str) -> impl Iterator<Item = &'a ResultsRow> {
        self.rows.iter().filter(move |r| r.sample_name == sample_name)
    }
}
