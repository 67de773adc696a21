//! End-to-end insert and query against file databases

use std::fs;
use std::path::Path;

use labstore::database::{LabDatabase, RetryPolicy, TableCounts};
use labstore::lens::insert::{InsertArgs, InsertLens};
use labstore::lens::query::{flatten, QueryLens, SAMPLE_NAME_COLUMN};
use labstore::metrics::{MetricSchema, MetricType};
use labstore::LabstoreConfig;
use serde_json::json;

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

fn create_db(dir: &Path, schema: Option<&MetricSchema>) -> String {
    let config = LabstoreConfig {
        data_dir: dir.to_string_lossy().to_string(),
        ..Default::default()
    };
    let target = config.resolve_target("lab", None, None).unwrap();
    target.ensure_parent_dir().unwrap();
    LabDatabase::create(&target.path, schema).unwrap();
    target.path
}

#[test]
fn insert_then_query_single_sample() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), None);

    let metadata = write(
        dir.path(),
        "metadata.json",
        r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"}]}"#,
    );
    let results = write(dir.path(), "results.csv", "sample_name,metric1\nS1,0.5\n");

    {
        let db = LabDatabase::open(&path, &RetryPolicy::none()).unwrap();
        InsertLens::new(&db)
            .insert(&InsertArgs::new(metadata, results))
            .unwrap();
    }

    // a fresh connection sees the committed rows
    let db = LabDatabase::open(&path, &RetryPolicy::none()).unwrap();
    assert_eq!(
        db.counts().unwrap(),
        TableCounts {
            analyses: 1,
            samples: 1,
            results: 1
        }
    );

    let table = QueryLens::new(&db).results_by_analysis(&[]).unwrap();
    assert_eq!(table.columns, vec!["sample_name", "analysis_id", "metric1"]);
    assert_eq!(table.rows, vec![vec![json!("S1"), json!(1), json!(0.5)]]);
}

#[test]
fn failed_insert_leaves_database_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), None);

    let metadata = write(
        dir.path(),
        "metadata.json",
        r#"{"Analysis":{"department":"QC"},"Samples":[{"sample_name":"S1"}]}"#,
    );
    let results = write(dir.path(), "results.csv", "sample_name,metric1\nS1,0.5\n");

    let db = LabDatabase::open(&path, &RetryPolicy::none()).unwrap();
    let err = InsertLens::new(&db)
        .insert(&InsertArgs::new(metadata, results))
        .unwrap_err();
    assert!(err.to_string().contains("analysis_name"));
    assert_eq!(db.counts().unwrap(), TableCounts::default());
}

#[test]
fn query_by_sample_returns_only_named_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), None);
    let db = LabDatabase::open(&path, &RetryPolicy::none()).unwrap();

    let metadata = write(
        dir.path(),
        "metadata.json",
        r#"{
            "Analysis": {"analysis_name": "MSQ100", "date": "2017-09-20", "analyst": "DMT"},
            "Samples": [
                {"sample_name": "S1", "sample_type": "Test"},
                {"sample_name": "S2", "sample_type": "Test"},
                {"sample_name": "S3", "sample_type": "Control"}
            ]
        }"#,
    );
    let results = write(
        dir.path(),
        "results.csv",
        "sample_name,yield,passed\nS1,0.91,true\nS2,0.87,false\nS3,0.12,false\n",
    );
    InsertLens::new(&db)
        .insert(&InsertArgs::new(metadata, results))
        .unwrap();

    let lens = QueryLens::new(&db);
    let table = lens
        .results_by_sample(&["S1".to_string(), "S2".to_string()])
        .unwrap();

    let mut names: Vec<&str> = table
        .column(SAMPLE_NAME_COLUMN)
        .unwrap()
        .into_iter()
        .filter_map(|v| v.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["S1", "S2"]);

    // re-flattening the returned table changes nothing
    assert_eq!(flatten(&table.to_joined_rows()), table);
}

#[test]
fn declared_metrics_are_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let declaration = write(
        dir.path(),
        "metrics.csv",
        "m1,m2,m3,m4\nFloat,Integer,Boolean,Unknown\n",
    );
    let schema = MetricSchema::from_path(&declaration).unwrap();
    assert_eq!(
        schema.pairs(),
        vec![
            ("m1", MetricType::Float),
            ("m2", MetricType::Integer),
            ("m3", MetricType::Boolean),
            ("m4", MetricType::String),
        ]
    );

    let path = create_db(dir.path(), Some(&schema));
    let db = LabDatabase::open(&path, &RetryPolicy::none()).unwrap();
    assert_eq!(db.metric_schema().unwrap(), Some(schema));

    let metadata = write(
        dir.path(),
        "metadata.json",
        r#"{"Analysis":{"analysis_name":"A1"},"Samples":[{"sample_name":"S1"}]}"#,
    );

    let undeclared = write(dir.path(), "bad.csv", "sample_name,m9\nS1,1\n");
    assert!(InsertLens::new(&db)
        .insert(&InsertArgs::new(metadata.clone(), undeclared))
        .is_err());
    assert_eq!(db.counts().unwrap(), TableCounts::default());

    let typed = write(
        dir.path(),
        "good.csv",
        "sample_name,m1,m2,m3,m4\nS1,1,2,yes,007\n",
    );
    InsertLens::new(&db)
        .insert(&InsertArgs::new(metadata, typed))
        .unwrap();

    let joined = db.results().joined(&Default::default()).unwrap();
    assert_eq!(
        serde_json::Value::Object(joined[0].result.metrics.clone()),
        json!({"m1": 1.0, "m2": 2, "m3": true, "m4": "007"})
    );
}

#[test]
fn open_missing_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.sqlite3");
    let err = LabDatabase::open(&missing.to_string_lossy(), &RetryPolicy::none())
        .err()
        .unwrap();
    assert!(err.to_string().contains("create-database"));
}
