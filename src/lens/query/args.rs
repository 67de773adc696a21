//! Query lens arguments
//!
//! These arguments are shared by the CLI (through clap derives) and by
//! library callers (through serde).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::database::{AnalysisFilter, ResultFilter};
use crate::lens::utils::one_or_many;
use crate::records::parse_date;

/// Arguments for querying stored results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct QueryArgs {
    /// Only return results of these analyses (repeatable)
    #[cfg_attr(feature = "cli", clap(long = "analysis-id", value_name = "ID"))]
    #[serde(default, deserialize_with = "one_or_many")]
    pub analysis_ids: Vec<i64>,

    /// Only return results of samples with these names (repeatable)
    #[cfg_attr(
        feature = "cli",
        clap(long = "sample", value_name = "NAME", conflicts_with = "analysis_ids")
    )]
    #[serde(default, deserialize_with = "one_or_many")]
    pub samples: Vec<String>,

    /// List analyses instead of results
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub list_analyses: bool,

    /// Only list analyses by this analyst
    #[cfg_attr(feature = "cli", clap(long, requires = "list_analyses"))]
    #[serde(default)]
    pub analyst: Option<String>,

    /// Only list analyses of this department
    #[cfg_attr(feature = "cli", clap(long, requires = "list_analyses"))]
    #[serde(default)]
    pub department: Option<String>,

    /// Only list analyses dated on or before this day (YYYY-MM-DD)
    #[cfg_attr(feature = "cli", clap(long, value_name = "DATE", requires = "list_analyses"))]
    #[serde(default)]
    pub before: Option<String>,

    /// Only list analyses dated on or after this day (YYYY-MM-DD)
    #[cfg_attr(feature = "cli", clap(long, value_name = "DATE", requires = "list_analyses"))]
    #[serde(default)]
    pub after: Option<String>,

    /// Export the result table to this CSV file instead of printing it
    #[cfg_attr(feature = "cli", clap(long, short, value_name = "FILE"))]
    #[serde(default)]
    pub output: Option<String>,
}

impl QueryArgs {
    /// Query the results of the given analyses
    pub fn by_analysis(analysis_ids: Vec<i64>) -> Self {
        Self {
            analysis_ids,
            ..Default::default()
        }
    }

    /// Query the results of the named samples
    pub fn by_sample(samples: Vec<String>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    /// Validate the arguments
    ///
    /// Returns an error message if the arguments are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.analysis_ids.is_empty() && !self.samples.is_empty() {
            return Err("--analysis-id and --sample cannot be combined".to_string());
        }
        if self.list_analyses && (!self.analysis_ids.is_empty() || !self.samples.is_empty()) {
            return Err("--list-analyses does not take result filters".to_string());
        }
        self.analysis_filter().map(|_| ())
    }

    /// The result filter selected by these arguments
    pub fn result_filter(&self) -> ResultFilter {
        if !self.analysis_ids.is_empty() {
            ResultFilter::AnalysisIds(self.analysis_ids.clone())
        } else if !self.samples.is_empty() {
            ResultFilter::SampleNames(self.samples.clone())
        } else {
            ResultFilter::All
        }
    }

    /// The analysis listing filter selected by these arguments
    pub fn analysis_filter(&self) -> Result<AnalysisFilter, String> {
        Ok(AnalysisFilter {
            analyst: self.analyst.clone(),
            department: self.department.clone(),
            on_or_before: parse_day(self.before.as_deref(), "--before")?,
            on_or_after: parse_day(self.after.as_deref(), "--after")?,
        })
    }
}

fn parse_day(raw: Option<&str>, flag: &str) -> Result<Option<NaiveDate>, String> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_date(raw)
            .map(|dt| Some(dt.date()))
            .ok_or_else(|| format!("{} expects a date like 2020-01-31, got '{}'", flag, raw)),
    }
}
