//! Record building
//!
//! This module maps flat input files onto related, not yet persisted records:
//!
//! - **metadata**: the JSON document describing one analysis and its samples
//! - **results_table**: the CSV file with one row of metrics per sample
//! - **builders**: allow-list extraction, validation and linking
//!
//! Builders only read their input; persistence is left to
//! [`LabDatabase::insert_batch`](crate::database::LabDatabase::insert_batch).
//! Because a [`Batch`] is complete before the database is touched, a
//! validation failure never leaves partial rows behind.

mod builders;
mod error;
mod metadata;
mod results_table;

pub use builders::{
    build_analysis, build_batch, build_result, build_samples, parse_date, Analysis, Batch, Sample,
    SampleResult, ANALYSIS_FIELDS, SAMPLE_FIELDS,
};
pub use error::{RecordError, RecordErrorKind};
pub use metadata::{MetadataDocument, ANALYSIS_SECTION, SAMPLES_SECTION};
pub use results_table::{ResultsRow, ResultsTable};
