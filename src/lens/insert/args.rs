//! Insert lens arguments

use serde::{Deserialize, Serialize};

/// Arguments for inserting one analysis with its samples and results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct InsertArgs {
    /// JSON file with an `Analysis` object and a `Samples` array
    #[cfg_attr(feature = "cli", clap(value_name = "METADATA_JSON"))]
    pub metadata: String,

    /// CSV file with one row per sample, keyed by sample name in the first column
    #[cfg_attr(feature = "cli", clap(value_name = "RESULTS_CSV"))]
    pub results: String,
}

impl InsertArgs {
    pub fn new(metadata: impl Into<String>, results: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
            results: results.into(),
        }
    }
}
