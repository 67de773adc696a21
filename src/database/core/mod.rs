//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout labstore:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `RetryPolicy`: Backoff settings for opening existing databases
//! - `SchemaManager`: Schema initialization and management
//! - `SchemaStatus`: Schema state enumeration

mod connection;
mod schema;

pub use connection::{DatabaseConn, RetryPolicy};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
