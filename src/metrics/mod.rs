//! Metric declarations
//!
//! A metric declaration is a two-row CSV file: a header row of metric names and
//! one row of type tags drawn from `Boolean`, `Float`, `Integer` and `String`.
//!
//! ```text
//! purity,yield,passed,operator
//! Float,Integer,Boolean,String
//! ```
//!
//! The declaration is turned into a [`MetricSchema`], an ordered list of
//! `(name, type)` pairs. Results are stored as a semi-structured map, so the
//! schema is not used to generate columns. Once registered in a database it
//! validates metric names and coerces raw cell values to their declared type.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Semantic type of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    Boolean,
    Float,
    Integer,
    String,
}

impl MetricType {
    /// Map a human-readable type tag to a metric type.
    ///
    /// Matching is case-insensitive. Returns `None` for unrecognized tags,
    /// which [`MetricSchema::from_pairs`] records and degrades to `String`.
    pub fn from_tag(tag: &str) -> Option<MetricType> {
        match tag.trim().to_lowercase().as_str() {
            "boolean" => Some(MetricType::Boolean),
            "float" => Some(MetricType::Float),
            "integer" => Some(MetricType::Integer),
            "string" => Some(MetricType::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricType::Boolean => "Boolean",
            MetricType::Float => "Float",
            MetricType::Integer => "Integer",
            MetricType::String => "String",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::from_tag(s).ok_or_else(|| {
            format!(
                "Unknown metric type '{}'. Valid types: Boolean, Float, Integer, String",
                s
            )
        })
    }
}

/// A single declared metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricField {
    pub name: String,
    pub metric_type: MetricType,
}

/// Errors raised while reading a metric declaration
#[derive(Debug, Error)]
pub enum MetricDeclarationError {
    #[error("metric declaration is empty: expected a header row of metric names")]
    MissingHeader,

    #[error("metric declaration has no type row below the header")]
    MissingTypeRow,

    #[error("metric declaration has {names} metric names but {tags} type tags")]
    ColumnMismatch { names: usize, tags: usize },

    #[error("metric declaration column {column} has an empty name")]
    EmptyName { column: usize },

    #[error("metric '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("failed to read metric declaration: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open metric declaration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while coercing a raw value against a schema
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricValueError {
    #[error("metric '{0}' is not declared in the metric schema")]
    Undeclared(String),

    #[error("metric '{name}' expects a {expected} value, got '{raw}'")]
    InvalidValue {
        name: String,
        expected: MetricType,
        raw: String,
    },
}

/// Ordered set of declared metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSchema {
    pub fields: Vec<MetricField>,

    /// Metric names whose type tag was not recognized and fell back to `String`
    #[serde(default)]
    pub defaulted: Vec<String>,
}

impl MetricSchema {
    /// Read a metric declaration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MetricDeclarationError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MetricDeclarationError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    /// Read a metric declaration from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, MetricDeclarationError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = rdr.records();

        let names = match records.next() {
            Some(record) => record?,
            None => return Err(MetricDeclarationError::MissingHeader),
        };
        if names.iter().all(|n| n.is_empty()) {
            return Err(MetricDeclarationError::MissingHeader);
        }

        let tags = match records.next() {
            Some(record) => record?,
            None => return Err(MetricDeclarationError::MissingTypeRow),
        };
        if names.len() != tags.len() {
            return Err(MetricDeclarationError::ColumnMismatch {
                names: names.len(),
                tags: tags.len(),
            });
        }

        let pairs: Vec<(&str, &str)> = names.iter().zip(tags.iter()).collect();
        Self::from_pairs(&pairs)
    }

    /// Build a schema from `(name, tag)` pairs, preserving their order
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, MetricDeclarationError> {
        let mut schema = MetricSchema::default();

        for (column, (name, tag)) in pairs.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                return Err(MetricDeclarationError::EmptyName { column });
            }
            if schema.get(name).is_some() {
                return Err(MetricDeclarationError::DuplicateName(name.to_string()));
            }

            let metric_type = match MetricType::from_tag(tag) {
                Some(t) => t,
                None => {
                    warn!(
                        "metric '{}' has unrecognized type tag '{}', treating it as String",
                        name, tag
                    );
                    schema.defaulted.push(name.to_string());
                    MetricType::String
                }
            };

            schema.fields.push(MetricField {
                name: name.to_string(),
                metric_type,
            });
        }

        Ok(schema)
    }

    /// The declared metrics as ordered `(name, type)` pairs
    pub fn pairs(&self) -> Vec<(&str, MetricType)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.metric_type))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<MetricType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.metric_type)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Coerce a raw cell into the declared type of metric `name`
    pub fn coerce(&self, name: &str, raw: &str) -> Result<Value, MetricValueError> {
        let metric_type = self
            .get(name)
            .ok_or_else(|| MetricValueError::Undeclared(name.to_string()))?;
        coerce_value(metric_type, raw).ok_or_else(|| MetricValueError::InvalidValue {
            name: name.to_string(),
            expected: metric_type,
            raw: raw.to_string(),
        })
    }
}

/// Convert a raw string into a JSON scalar of the given type
pub fn coerce_value(metric_type: MetricType, raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    match metric_type {
        MetricType::Boolean => parse_bool(trimmed).map(Value::Bool),
        MetricType::Integer => trimmed.parse::<i64>().ok().map(Value::from),
        MetricType::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        MetricType::String => Some(Value::String(trimmed.to_string())),
    }
}

/// Type a raw cell by inspection when no metric schema is registered
///
/// Booleans are recognized first, then integers, then floats; anything else
/// stays a string.
pub fn infer_value(raw: &str) -> Value {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        return Value::Number(n);
    }

    Value::String(trimmed.to_string())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
