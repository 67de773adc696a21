use std::fmt;

use thiserror::Error;

use crate::metrics::MetricValueError;

/// Broad class of a record error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordErrorKind {
    /// Malformed or incomplete metadata / results input
    Validation,
    /// A results row that does not map onto exactly one sample
    Referential,
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordErrorKind::Validation => write!(f, "validation error"),
            RecordErrorKind::Referential => write!(f, "referential error"),
        }
    }
}

/// Errors raised while turning metadata and results files into records
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata is not valid JSON: {0}")]
    MalformedMetadata(#[from] serde_json::Error),

    #[error("metadata is missing the '{0}' section")]
    MissingSection(&'static str),

    #[error("metadata section '{section}' must be {expected}")]
    InvalidSection {
        section: &'static str,
        expected: &'static str,
    },

    #[error("{entity} is missing required field '{field}'")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} field '{field}' is invalid: {reason}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("sample '{0}' is listed more than once in the metadata")]
    DuplicateSample(String),

    #[error("results file has no header row")]
    MissingResultsHeader,

    #[error("results file declares column '{0}' more than once")]
    DuplicateColumn(String),

    #[error("results row on line {line} has an empty sample name")]
    EmptySampleKey { line: u64 },

    #[error("failed to read results file: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Metric(#[from] MetricValueError),

    #[error("results row for sample '{0}' does not match any sample in the metadata")]
    UnknownSample(String),

    #[error("sample '{sample}' matches {rows} results rows, expected at most one")]
    AmbiguousSample { sample: String, rows: usize },
}

impl RecordError {
    pub fn kind(&self) -> RecordErrorKind {
        match self {
            RecordError::UnknownSample(_) | RecordError::AmbiguousSample { .. } => {
                RecordErrorKind::Referential
            }
            _ => RecordErrorKind::Validation,
        }
    }
}
