//! Lens module
//!
//! This module provides high-level "lens" abstractions that combine business logic
//! with output formatting. Lenses are reusable from the CLI and from library code.
//!
//! # Architecture
//!
//! Each lens module exports:
//! - A **Lens struct** (e.g., `InsertLens`, `QueryLens`) - the main entry point for all operations
//! - **Args structs** - input arguments for lens methods
//! - **Output types** - return types such as [`query::FlatTable`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use labstore::database::LabDatabase;
//! use labstore::lens::insert::{InsertArgs, InsertLens};
//! use labstore::lens::query::QueryLens;
//!
//! let db = LabDatabase::open_in_memory()?;
//! InsertLens::new(&db).insert(&InsertArgs::new("metadata.json", "results.csv"))?;
//!
//! let table = QueryLens::new(&db).results_by_sample(&["S1".to_string()])?;
//! println!("{:?}", table.columns);
//! ```

pub mod utils;

// InsertLens - build and commit one analysis with its samples and results
pub mod insert;

// QueryLens - joined and flattened result tables, analysis listings
pub mod query;
