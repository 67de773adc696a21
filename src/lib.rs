#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Labstore - analysis, sample and result storage
//!
//! Labstore keeps laboratory analyses, the samples measured in them and the
//! metrics measured for each sample in a small relational database, and
//! queries them back as flat tables. It can be used as both a command-line
//! application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Metric typing and record builders | `csv`, `serde_json`, `chrono` |
//! | `database` | SQLite storage, lenses and configuration | `rusqlite`, `config` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | Full CLI binary | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Builders only
//! labstore = { version = "0.1", default-features = false }
//!
//! # Storage and queries without CLI overhead
//! labstore = { version = "0.1", default-features = false, features = ["database"] }
//!
//! # Default (CLI binary)
//! labstore = "0.1"
//! ```
//!
//! # Architecture
//!
//! - **[`metrics`]**: Metric type tags, declaration files and value coercion
//! - **[`records`]**: Builders turning a metadata JSON document and a results
//!   CSV file into a linked, not yet persisted [`records::Batch`]
//! - **`database`**: SQLite connection, schema and repositories
//!   (`analyses 1───n samples 1───n results`) with atomic batch commit
//! - **`lens`**: Insert and query operations with output formatting
//! - **`config`**: Configuration file, environment and target resolution
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use labstore::database::LabDatabase;
//! use labstore::lens::insert::{InsertArgs, InsertLens};
//! use labstore::lens::query::QueryLens;
//! use labstore::metrics::MetricSchema;
//!
//! // Register the expected metrics while creating the database
//! let schema = MetricSchema::from_path("metrics.csv")?;
//! let db = LabDatabase::create("/tmp/lab.sqlite3", Some(&schema))?;
//!
//! // Insert one analysis with its samples and results
//! let summary = InsertLens::new(&db).insert(&InsertArgs::new("metadata.json", "results.csv"))?;
//!
//! // Read the results back as a flat table
//! let table = QueryLens::new(&db).results_by_analysis(&[summary.analysis_id])?;
//! table.write_csv(std::io::stdout())?;
//! ```

pub mod metrics;
pub mod records;

#[cfg(feature = "database")]
pub mod config;
#[cfg(feature = "database")]
pub mod database;
#[cfg(feature = "database")]
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

#[cfg(feature = "database")]
pub use config::{DatabaseTarget, LabstoreConfig};

// =============================================================================
// Metric typing and record builders (always available)
// =============================================================================

pub use metrics::{MetricDeclarationError, MetricField, MetricSchema, MetricType, MetricValueError};

pub use records::{
    build_analysis, build_batch, build_result, build_samples, Analysis, Batch, MetadataDocument,
    RecordError, RecordErrorKind, ResultsTable, Sample, SampleResult,
};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

// Primary database type (SQLite)
#[cfg(feature = "database")]
pub use database::LabDatabase;

// Core database types
#[cfg(feature = "database")]
pub use database::{
    DatabaseConn, RetryPolicy, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION,
};

// Repositories
#[cfg(feature = "database")]
pub use database::{
    AnalysisFilter, AnalysisRecord, JoinedResult, ResultFilter, ResultRecord, SampleRecord,
};

// =============================================================================
// Lens Module
// =============================================================================

#[cfg(feature = "database")]
pub use lens::insert::{InsertArgs, InsertLens, InsertSummary};
#[cfg(feature = "database")]
pub use lens::query::{flatten, FlatTable, JoinedRow, QueryArgs, QueryLens};
#[cfg(feature = "database")]
pub use lens::utils::OutputFormat;
