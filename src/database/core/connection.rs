//! Database connection management
//!
//! This module provides the core database connection wrapper used throughout labstore.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::warn;

/// Retry behavior for opening a database
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one)
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry
    pub base_delay: Duration,
    /// Upper bound for the delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Build a policy from a retry count and an initial backoff in milliseconds
    pub fn with_retries(retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            base_delay: Duration::from_millis(backoff_ms),
            ..Default::default()
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path, creating the file if needed
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()
            .map_err(|e| anyhow!("Failed to configure database: {}", e))?;
        Ok(db)
    }

    /// Open a database at the specified path (convenience method)
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    /// Open an existing database file, retrying transient failures
    ///
    /// The file is never created. Busy, locked and cannot-open failures are
    /// retried with exponential backoff; anything else fails immediately.
    pub fn open_existing(path: &str, retry: &RetryPolicy) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(anyhow!(
                "Database '{}' does not exist; create it with `create-database` first",
                path
            ));
        }

        let attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_open_existing(path) {
                Ok(db) => return Ok(db),
                Err(e) if attempt < attempts && is_transient(&e) => {
                    let delay = retry.delay_for(attempt - 1);
                    warn!(
                        "opening database '{}' failed (attempt {}/{}): {}; retrying in {:?}",
                        path, attempt, attempts, e, delay
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    return Err(anyhow!(
                        "Failed to open database at '{}' after {} attempt(s): {}",
                        path,
                        attempt,
                        e
                    ))
                }
            }
        }
    }

    fn try_open_existing(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Configure the database
    fn configure(&self) -> rusqlite::Result<()> {
        // WAL for file databases; in-memory databases report "memory"
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        self.conn.execute("PRAGMA synchronous=NORMAL", [])?;

        // Store temp tables in memory
        self.conn.execute("PRAGMA temp_store=MEMORY", [])?;

        // Samples and results rely on foreign keys, which SQLite leaves off by default
        self.conn.execute("PRAGMA foreign_keys=ON", [])?;

        Ok(())
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL: {}", e))
    }

    /// Begin an unchecked transaction
    ///
    /// Dropping the transaction without committing rolls it back.
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }
}

fn is_transient(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) | Some(ErrorCode::CannotOpen)
    )
}
