//! Insert lens types

use serde::{Deserialize, Serialize};

/// Outcome of a committed insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertSummary {
    pub analysis_id: i64,
    pub analysis_name: String,
    pub samples: usize,
    pub results: usize,
    /// Samples that had no row in the results file
    pub samples_without_results: Vec<String>,
}
