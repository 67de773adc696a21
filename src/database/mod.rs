//! Database module
//!
//! This module provides all database functionality for labstore, organized into:
//!
//! - **core**: Core database infrastructure (SQLite connections, schema management)
//! - **lab**: The lab database holding analyses, samples and results
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper, open retries
//! │   └── schema      # SQLite schema definitions and management
//! │
//! └── lab/            # Persistent storage
//!     ├── analysis    # analyses table
//!     ├── sample      # samples table
//!     └── result      # results table and the result/sample join
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use labstore::database::{LabDatabase, ResultFilter, RetryPolicy};
//!
//! // Create the database once
//! LabDatabase::create("/tmp/lab.sqlite3", None)?;
//!
//! // Open it for later work
//! let db = LabDatabase::open("/tmp/lab.sqlite3", &RetryPolicy::default())?;
//! let rows = db.results().joined(&ResultFilter::AnalysisIds(vec![1]))?;
//! ```

pub mod core;
pub mod lab;

// SQLite connection and schema management
pub use core::{
    DatabaseConn, RetryPolicy, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION,
};

// Lab database (main entry point)
pub use lab::{BatchSummary, LabDatabase, TableCounts, METRIC_SCHEMA_KEY};

// Repositories and their rows
pub use lab::{
    AnalysisFilter, AnalysisRecord, AnalysisRepository, JoinedResult, ResultFilter, ResultRecord,
    ResultRepository, SampleRecord, SampleRepository, DATE_FORMAT,
};
