//! Query lens types
//!
//! The flat table produced from joined result rows, and the operations to
//! render or export it.

use std::io::Write;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::JoinedResult;
use crate::lens::utils::cell_text;

/// Leading column holding the sample name
pub const SAMPLE_NAME_COLUMN: &str = "sample_name";
/// Leading column holding the owning analysis id
pub const ANALYSIS_ID_COLUMN: &str = "analysis_id";

/// Prefix given to metric keys that clash with a leading column
///
/// A key whose name is a leading column behind any number of prefixes gets
/// one more prefix, so `analysis_id` becomes `metrics.analysis_id` and
/// `metrics.analysis_id` becomes `metrics.metrics.analysis_id`.
pub const CLASH_PREFIX: &str = "metrics.";

/// One (result, sample) pair ready to be flattened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
    pub sample_name: String,
    pub analysis_id: i64,
    pub metrics: Map<String, Value>,
}

impl From<&JoinedResult> for JoinedRow {
    fn from(joined: &JoinedResult) -> Self {
        Self {
            sample_name: joined.sample.sample_name.clone(),
            analysis_id: joined.sample.analysis_id,
            metrics: joined.result.metrics.clone(),
        }
    }
}

/// Tabular view of joined results
///
/// The first two columns are always `sample_name` and `analysis_id`,
/// followed by one column per metric key in first-seen order. A metric a
/// row does not carry is `null` in that row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Flatten joined rows into one table row per pair
pub fn flatten(rows: &[JoinedRow]) -> FlatTable {
    let mut columns = vec![
        SAMPLE_NAME_COLUMN.to_string(),
        ANALYSIS_ID_COLUMN.to_string(),
    ];
    let mut metric_keys: Vec<String> = Vec::new();

    for row in rows {
        for key in row.metrics.keys() {
            let column = column_name(key);
            if !metric_keys.iter().any(|k| k == key) {
                metric_keys.push(key.clone());
                columns.push(column);
            }
        }
    }

    let rows = rows
        .iter()
        .map(|row| {
            let mut values = Vec::with_capacity(columns.len());
            values.push(Value::String(row.sample_name.clone()));
            values.push(Value::from(row.analysis_id));
            for key in &metric_keys {
                values.push(row.metrics.get(key).cloned().unwrap_or(Value::Null));
            }
            values
        })
        .collect();

    FlatTable { columns, rows }
}

fn column_name(key: &str) -> String {
    if shadows_leading_column(key) {
        format!("{}{}", CLASH_PREFIX, key)
    } else {
        key.to_string()
    }
}

/// True when `name` is a leading column once every clash prefix is removed
fn shadows_leading_column(name: &str) -> bool {
    let mut core = name;
    while let Some(rest) = core.strip_prefix(CLASH_PREFIX) {
        core = rest;
    }
    core == SAMPLE_NAME_COLUMN || core == ANALYSIS_ID_COLUMN
}

impl FlatTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Metric column names, without the two leading columns
    pub fn metric_columns(&self) -> &[String] {
        self.columns.get(2..).unwrap_or(&[])
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }

    /// Convert the table back into joined rows
    ///
    /// Every metric column is kept on every row (including nulls), so
    /// flattening the result reproduces this table exactly.
    pub fn to_joined_rows(&self) -> Vec<JoinedRow> {
        self.rows
            .iter()
            .map(|row| {
                let sample_name = row.first().map(cell_text).unwrap_or_default();
                let analysis_id = row.get(1).and_then(Value::as_i64).unwrap_or_default();
                let metrics = self
                    .metric_columns()
                    .iter()
                    .zip(row.iter().skip(2))
                    .map(|(column, value)| (metric_key(column), value.clone()))
                    .collect();
                JoinedRow {
                    sample_name,
                    analysis_id,
                    metrics,
                }
            })
            .collect()
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Rows rendered as plain cell text
    pub fn cell_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)
            .map_err(|e| anyhow!("Failed to write CSV header: {}", e))?;
        for row in self.cell_rows() {
            wtr.write_record(&row)
                .map_err(|e| anyhow!("Failed to write CSV row: {}", e))?;
        }
        wtr.flush()
            .map_err(|e| anyhow!("Failed to flush CSV output: {}", e))?;
        Ok(())
    }
}

fn metric_key(column: &str) -> String {
    match column.strip_prefix(CLASH_PREFIX) {
        Some(key) if shadows_leading_column(key) => key.to_string(),
        _ => column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(sample: &str, analysis_id: i64, metrics: Value) -> JoinedRow {
        JoinedRow {
            sample_name: sample.to_string(),
            analysis_id,
            metrics: match metrics {
                Value::Object(map) => map,
                _ => panic!("expected an object"),
            },
        }
    }

    fn sample_rows() -> Vec<JoinedRow> {
        vec![
            row("S1", 1, json!({"m1": 0.5, "m2": 3})),
            row("S2", 1, json!({"m3": true})),
            row("S3", 2, json!({})),
            row("S4", 2, json!({"m2": 7, "m1": null})),
        ]
    }

    #[test]
    fn test_flatten_columns_and_nulls() {
        let table = flatten(&sample_rows());

        assert_eq!(
            table.columns,
            vec!["sample_name", "analysis_id", "m1", "m2", "m3"]
        );
        assert_eq!(table.len(), 4);
        assert_eq!(table.rows[0], vec![json!("S1"), json!(1), json!(0.5), json!(3), Value::Null]);
        assert_eq!(
            table.rows[1],
            vec![json!("S2"), json!(1), Value::Null, Value::Null, json!(true)]
        );
        assert_eq!(
            table.rows[2],
            vec![json!("S3"), json!(2), Value::Null, Value::Null, Value::Null]
        );
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let once = flatten(&sample_rows());
        let twice = flatten(&once.to_joined_rows());
        assert_eq!(once, twice);

        let empty = flatten(&[]);
        assert_eq!(flatten(&empty.to_joined_rows()), empty);
    }

    #[test]
    fn test_flatten_renames_clashing_metric() {
        let rows = vec![row("S1", 1, json!({"analysis_id": "batch-7", "m1": 1}))];
        let table = flatten(&rows);

        assert_eq!(
            table.columns,
            vec!["sample_name", "analysis_id", "metrics.analysis_id", "m1"]
        );
        assert_eq!(table.rows[0][1], json!(1));
        assert_eq!(table.rows[0][2], json!("batch-7"));
        assert_eq!(flatten(&table.to_joined_rows()), table);
    }

    #[test]
    fn test_flatten_keeps_prefixed_and_clashing_metrics_apart() {
        let rows = vec![row(
            "S1",
            1,
            json!({"analysis_id": "a", "metrics.analysis_id": "b", "metrics.m1": 2}),
        )];
        let table = flatten(&rows);

        assert_eq!(
            table.columns,
            vec![
                "sample_name",
                "analysis_id",
                "metrics.analysis_id",
                "metrics.metrics.analysis_id",
                "metrics.m1"
            ]
        );
        assert_eq!(
            Value::Object(table.to_records()[0].clone()),
            json!({
                "sample_name": "S1",
                "analysis_id": 1,
                "metrics.analysis_id": "a",
                "metrics.metrics.analysis_id": "b",
                "metrics.m1": 2
            })
        );

        let joined = table.to_joined_rows();
        assert_eq!(joined[0].metrics.get("analysis_id"), Some(&json!("a")));
        assert_eq!(joined[0].metrics.get("metrics.analysis_id"), Some(&json!("b")));
        assert_eq!(flatten(&joined), table);
    }

    #[test]
    fn test_column_access() {
        let table = flatten(&sample_rows());
        assert_eq!(table.metric_columns(), ["m1", "m2", "m3"]);

        let m2: Vec<Value> = table.column("m2").unwrap().into_iter().cloned().collect();
        assert_eq!(m2, vec![json!(3), Value::Null, Value::Null, json!(7)]);
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_to_records() {
        let table = flatten(&sample_rows()[..1]);
        let records = table.to_records();
        assert_eq!(
            Value::Object(records[0].clone()),
            json!({"sample_name": "S1", "analysis_id": 1, "m1": 0.5, "m2": 3})
        );
    }

    #[test]
    fn test_write_csv() {
        let table = flatten(&sample_rows()[..2]);
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "sample_name,analysis_id,m1,m2,m3\nS1,1,0.5,3,\nS2,1,,,true\n"
        );
    }
}
