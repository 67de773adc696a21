//! Metadata documents
//!
//! The metadata file describes one analysis and its samples:
//!
//! ```json
//! {
//!   "Analysis": {
//!     "analysis_name": "Troubleshoot drop out rates",
//!     "date": "2017-09-20",
//!     "department": "IT",
//!     "analyst": "Guido van Rossum"
//!   },
//!   "Samples": [
//!     { "sample_name": "sample01", "sample_type": "Reference", "sample_description": "NA" },
//!     { "sample_name": "sample02", "sample_type": "Test" }
//!   ]
//! }
//! ```

use std::path::Path;

use serde_json::{Map, Value};

use super::RecordError;

pub const ANALYSIS_SECTION: &str = "Analysis";
pub const SAMPLES_SECTION: &str = "Samples";

/// Parsed but not yet validated metadata document
///
/// Field extraction and validation happen in the builders; this type only
/// checks the two top-level sections have the right shape.
#[derive(Debug, Clone, Default)]
pub struct MetadataDocument {
    pub analysis: Map<String, Value>,
    pub samples: Vec<Map<String, Value>>,
}

impl MetadataDocument {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let Value::Object(mut root) = value else {
            return Err(RecordError::InvalidSection {
                section: "document root",
                expected: "a JSON object",
            });
        };

        let analysis = match root.remove(ANALYSIS_SECTION) {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(RecordError::InvalidSection {
                    section: ANALYSIS_SECTION,
                    expected: "a JSON object",
                })
            }
            None => return Err(RecordError::MissingSection(ANALYSIS_SECTION)),
        };

        // an absent Samples section means an analysis without samples
        let samples = match root.remove(SAMPLES_SECTION) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    _ => Err(RecordError::InvalidSection {
                        section: SAMPLES_SECTION,
                        expected: "an array of JSON objects",
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(RecordError::InvalidSection {
                    section: SAMPLES_SECTION,
                    expected: "an array of JSON objects",
                })
            }
        };

        Ok(MetadataDocument { analysis, samples })
    }
}
