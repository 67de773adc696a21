//! Record builders
//!
//! Builders turn loosely-typed metadata and results input into transient
//! [`Analysis`], [`Sample`] and [`SampleResult`] values. Nothing here touches
//! the database; see `LabDatabase::insert_batch` for persistence.

use std::collections::HashSet;
use std::rc::Rc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::{MetadataDocument, RecordError, ResultsTable};
use crate::metrics::{infer_value, MetricSchema};

/// Fields read from the `Analysis` section; everything else is ignored
pub const ANALYSIS_FIELDS: &[&str] = &["analysis_name", "date", "department", "analyst"];

/// Fields read from each `Samples` entry; everything else is ignored
pub const SAMPLE_FIELDS: &[&str] = &["sample_name", "sample_type", "sample_description"];

/// An analysis waiting to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Required
    pub analysis_name: String,
    /// Defaults to the build time when absent
    pub date: NaiveDateTime,
    pub department: Option<String>,
    pub analyst: Option<String>,
}

/// A sample waiting to be persisted, linked to its analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Required
    pub sample_name: String,
    pub sample_type: Option<String>,
    pub sample_description: Option<String>,
    pub analysis: Rc<Analysis>,
}

/// The metrics measured for one sample
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub sample: Rc<Sample>,
    pub metrics: Map<String, Value>,
}

/// Everything one insert invocation writes, built before any write happens
#[derive(Debug, Clone)]
pub struct Batch {
    pub analysis: Rc<Analysis>,
    pub samples: Vec<Rc<Sample>>,
    pub results: Vec<SampleResult>,
    /// Samples with no row in the results file
    pub samples_without_rows: Vec<String>,
}

/// Build an [`Analysis`] from the `Analysis` metadata mapping
pub fn build_analysis(metadata: &Map<String, Value>) -> Result<Analysis, RecordError> {
    const ENTITY: &str = "Analysis";
    log_ignored_fields(ENTITY, metadata, ANALYSIS_FIELDS);

    let analysis_name = required_string(ENTITY, metadata, "analysis_name")?;
    let date = match optional_string(ENTITY, metadata, "date")? {
        Some(raw) => parse_date(&raw).ok_or_else(|| RecordError::InvalidField {
            entity: ENTITY,
            field: "date",
            reason: format!(
                "'{}' is not a date (expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339)",
                raw
            ),
        })?,
        None => Utc::now().naive_utc(),
    };

    Ok(Analysis {
        analysis_name,
        date,
        department: optional_string(ENTITY, metadata, "department")?,
        analyst: optional_string(ENTITY, metadata, "analyst")?,
    })
}

/// Build every entry of the `Samples` list, linking each one to `analysis`
pub fn build_samples(
    metadata: &MetadataDocument,
    analysis: &Rc<Analysis>,
) -> Result<Vec<Rc<Sample>>, RecordError> {
    const ENTITY: &str = "Sample";

    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(metadata.samples.len());

    for entry in &metadata.samples {
        log_ignored_fields(ENTITY, entry, SAMPLE_FIELDS);

        let sample_name = required_string(ENTITY, entry, "sample_name")?;
        if !seen.insert(sample_name.clone()) {
            return Err(RecordError::DuplicateSample(sample_name));
        }

        samples.push(Rc::new(Sample {
            sample_name,
            sample_type: optional_string(ENTITY, entry, "sample_type")?,
            sample_description: optional_string(ENTITY, entry, "sample_description")?,
            analysis: Rc::clone(analysis),
        }));
    }

    Ok(samples)
}

/// Build the result for `sample` from the matching row of `table`
///
/// Zero matching rows yield an empty metrics map. More than one matching row
/// is ambiguous and rejected. Empty cells are left out of the map. With a
/// schema, metric names must be declared and values are coerced to the
/// declared type; without one, values are typed by inspection.
pub fn build_result(
    table: &ResultsTable,
    sample: &Rc<Sample>,
    schema: Option<&MetricSchema>,
) -> Result<SampleResult, RecordError> {
    let rows: Vec<_> = table.rows_for(&sample.sample_name).collect();
    if rows.len() > 1 {
        return Err(RecordError::AmbiguousSample {
            sample: sample.sample_name.clone(),
            rows: rows.len(),
        });
    }

    let mut metrics = Map::new();
    if let Some(row) = rows.first() {
        for (column, raw) in table.metric_columns.iter().zip(row.values.iter()) {
            if raw.is_empty() {
                continue;
            }
            let value = match schema {
                Some(schema) => schema.coerce(column, raw)?,
                None => infer_value(raw),
            };
            metrics.insert(column.clone(), value);
        }
    }

    Ok(SampleResult {
        sample: Rc::clone(sample),
        metrics,
    })
}

/// Run all builders for one insert invocation
///
/// Every results row must reference a sample listed in the metadata.
pub fn build_batch(
    metadata: &MetadataDocument,
    table: &ResultsTable,
    schema: Option<&MetricSchema>,
) -> Result<Batch, RecordError> {
    let analysis = Rc::new(build_analysis(&metadata.analysis)?);
    let samples = build_samples(metadata, &analysis)?;

    let known: HashSet<&str> = samples.iter().map(|s| s.sample_name.as_str()).collect();
    if let Some(row) = table
        .rows
        .iter()
        .find(|r| !known.contains(r.sample_name.as_str()))
    {
        return Err(RecordError::UnknownSample(row.sample_name.clone()));
    }

    let results = samples
        .iter()
        .map(|sample| build_result(table, sample, schema))
        .collect::<Result<Vec<_>, _>>()?;

    let samples_without_rows = samples
        .iter()
        .filter(|s| table.rows_for(&s.sample_name).next().is_none())
        .map(|s| s.sample_name.clone())
        .collect();

    Ok(Batch {
        analysis,
        samples,
        results,
        samples_without_rows,
    })
}

/// Parse an analysis date
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn required_string(
    entity: &'static str,
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<String, RecordError> {
    match optional_string(entity, map, field)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(RecordError::MissingField { entity, field }),
    }
}

fn optional_string(
    entity: &'static str,
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, RecordError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        // numeric names such as "1001" are common in sample sheets
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(RecordError::InvalidField {
            entity,
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn log_ignored_fields(entity: &str, map: &Map<String, Value>, allowed: &[&str]) {
    for key in map.keys().filter(|k| !allowed.contains(&k.as_str())) {
        debug!("{} field '{}' is not recognized, ignoring it", entity, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordErrorKind;
    use serde_json::json;

    fn document(value: Value) -> MetadataDocument {
        MetadataDocument::from_value(value).unwrap()
    }

    fn table(csv: &str) -> ResultsTable {
        ResultsTable::from_reader(csv.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_build_analysis_allow_list() {
        let doc = document(json!({
            "Analysis": {
                "analysis_name": "Troubleshoot drop out rates",
                "date": "2017-09-20",
                "department": "IT",
                "analyst": "Guido van Rossum",
                "budget": 1000
            }
        }));

        let analysis = build_analysis(&doc.analysis).unwrap();
        assert_eq!(analysis.analysis_name, "Troubleshoot drop out rates");
        assert_eq!(analysis.date.to_string(), "2017-09-20 00:00:00");
        assert_eq!(analysis.department.as_deref(), Some("IT"));
        assert_eq!(analysis.analyst.as_deref(), Some("Guido van Rossum"));
    }

    #[test]
    fn test_build_analysis_missing_name() {
        let doc = document(json!({"Analysis": {"department": "QC"}}));
        let err = build_analysis(&doc.analysis).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingField {
                entity: "Analysis",
                field: "analysis_name"
            }
        ));
        assert_eq!(err.kind(), RecordErrorKind::Validation);
    }

    #[test]
    fn test_build_analysis_blank_name() {
        let doc = document(json!({"Analysis": {"analysis_name": "  "}}));
        assert!(build_analysis(&doc.analysis).is_err());
    }

    #[test]
    fn test_build_analysis_default_date() {
        let before = Utc::now().naive_utc();
        let doc = document(json!({"Analysis": {"analysis_name": "A1"}}));
        let analysis = build_analysis(&doc.analysis).unwrap();
        assert!(analysis.date >= before - chrono::Duration::seconds(1));
        assert!(analysis.department.is_none());
    }

    #[test]
    fn test_build_analysis_bad_date() {
        let doc = document(json!({"Analysis": {"analysis_name": "A1", "date": "yesterday"}}));
        let err = build_analysis(&doc.analysis).unwrap_err();
        assert!(matches!(err, RecordError::InvalidField { field: "date", .. }));
    }

    #[test]
    fn test_build_analysis_non_string_field() {
        let doc = document(json!({"Analysis": {"analysis_name": "A1", "analyst": ["x"]}}));
        let err = build_analysis(&doc.analysis).unwrap_err();
        assert!(matches!(err, RecordError::InvalidField { field: "analyst", .. }));
    }

    #[test]
    fn test_samples_link_to_analysis() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [
                {"sample_name": "S1", "sample_type": "Reference", "sample_description": "NA"},
                {"sample_name": "S2", "colour": "blue"}
            ]
        }));

        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let samples = build_samples(&doc, &analysis).unwrap();

        assert_eq!(samples.len(), 2);
        for sample in &samples {
            assert!(Rc::ptr_eq(&sample.analysis, &analysis));
        }
        assert_eq!(samples[0].sample_type.as_deref(), Some("Reference"));
        assert_eq!(samples[0].sample_description.as_deref(), Some("NA"));
        assert!(samples[1].sample_type.is_none());
    }

    #[test]
    fn test_samples_missing_name() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_type": "Test"}]
        }));
        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let err = build_samples(&doc, &analysis).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingField {
                entity: "Sample",
                field: "sample_name"
            }
        ));
    }

    #[test]
    fn test_samples_duplicate_name() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S1"}, {"sample_name": "S1"}]
        }));
        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let err = build_samples(&doc, &analysis).unwrap_err();
        assert!(matches!(err, RecordError::DuplicateSample(s) if s == "S1"));
    }

    #[test]
    fn test_build_result_drops_key_column() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S1"}]
        }));
        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let samples = build_samples(&doc, &analysis).unwrap();

        let table = table("sample_name,metric1,metric2,note\nS1,0.5,12,\nS2,0.1,1,x\n");
        let result = build_result(&table, &samples[0], None).unwrap();

        assert!(Rc::ptr_eq(&result.sample, &samples[0]));
        assert_eq!(result.metrics.len(), 2);
        assert_eq!(result.metrics["metric1"], json!(0.5));
        assert_eq!(result.metrics["metric2"], json!(12));
        assert!(!result.metrics.contains_key("sample_name"));
        assert!(!result.metrics.contains_key("note"));
    }

    #[test]
    fn test_build_result_no_matching_rows_is_empty() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S9"}]
        }));
        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let samples = build_samples(&doc, &analysis).unwrap();

        let table = table("sample_name,metric1\nS1,0.5\n");
        let result = build_result(&table, &samples[0], None).unwrap();
        assert!(result.metrics.is_empty());
    }

    #[test]
    fn test_build_result_ambiguous() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S1"}]
        }));
        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let samples = build_samples(&doc, &analysis).unwrap();

        let table = table("sample_name,metric1\nS1,0.5\nS1,0.6\n");
        let err = build_result(&table, &samples[0], None).unwrap_err();
        assert!(matches!(err, RecordError::AmbiguousSample { rows: 2, .. }));
        assert_eq!(err.kind(), RecordErrorKind::Referential);
    }

    #[test]
    fn test_build_result_with_schema() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S1"}]
        }));
        let analysis = Rc::new(build_analysis(&doc.analysis).unwrap());
        let samples = build_samples(&doc, &analysis).unwrap();
        let schema = MetricSchema::from_pairs(&[("count", "Float"), ("ok", "Boolean")]).unwrap();

        let result = build_result(&table("sample_name,count,ok\nS1,3,1\n"), &samples[0], Some(&schema))
            .unwrap();
        assert_eq!(result.metrics["count"], json!(3.0));
        assert_eq!(result.metrics["ok"], json!(true));

        let err = build_result(&table("sample_name,other\nS1,3\n"), &samples[0], Some(&schema))
            .unwrap_err();
        assert!(matches!(err, RecordError::Metric(_)));
    }

    #[test]
    fn test_build_batch_unknown_sample() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S1"}]
        }));
        let err = build_batch(&doc, &table("sample_name,m\nS1,1\nS2,2\n"), None).unwrap_err();
        assert!(matches!(err, RecordError::UnknownSample(ref s) if s == "S2"));
        assert_eq!(err.kind(), RecordErrorKind::Referential);
    }

    #[test]
    fn test_build_batch() {
        let doc = document(json!({
            "Analysis": {"analysis_name": "A1"},
            "Samples": [{"sample_name": "S1"}, {"sample_name": "S2"}]
        }));
        let batch = build_batch(&doc, &table("sample_name,m\nS1,1\n"), None).unwrap();

        assert_eq!(batch.samples.len(), 2);
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].metrics["m"], json!(1));
        assert!(batch.results[1].metrics.is_empty());
        assert_eq!(batch.samples_without_rows, vec!["S2"]);
        assert!(batch
            .samples
            .iter()
            .all(|s| Rc::ptr_eq(&s.analysis, &batch.analysis)));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2017-09-20").is_some());
        assert!(parse_date("2017-09-20 13:45:00").is_some());
        assert_eq!(
            parse_date("2017-09-20T13:45:00+02:00").unwrap().to_string(),
            "2017-09-20 11:45:00"
        );
        assert!(parse_date("20/09/2017").is_none());
    }
}
