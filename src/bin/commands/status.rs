use clap::Args;
use labstore::database::{LabDatabase, SchemaStatus, TableCounts};
use labstore::lens::utils::OutputFormat;
use labstore::LabstoreConfig;
use serde::Serialize;
use std::path::Path;

use super::TargetArgs;

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    #[clap(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Serialize)]
struct DatabaseStatus {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<TableCounts>,
    metrics: Vec<(String, String)>,
}

pub fn run(config: &LabstoreConfig, args: StatusArgs, output_format: OutputFormat) {
    let target = super::resolve_target(config, &args.target);
    let exists = Path::new(&target.path).exists();

    let mut status = DatabaseStatus {
        path: target.path.clone(),
        exists,
        size_bytes: None,
        schema: SchemaStatus::NotInitialized.to_string(),
        counts: None,
        metrics: Vec::new(),
    };

    if exists {
        status.size_bytes = std::fs::metadata(&target.path).ok().map(|m| m.len());

        // an uninitialized or incompatible schema is reported through the open error
        let db = match LabDatabase::open(&target.path, &config.retry_policy()) {
            Ok(db) => Some(db),
            Err(e) => {
                status.schema = e.to_string();
                None
            }
        };

        if let Some(db) = db {
            match db.schema_status() {
                Ok(s) => status.schema = s.to_string(),
                Err(e) => status.schema = format!("unknown ({})", e),
            }
            status.counts = db.counts().ok();
            if let Ok(Some(schema)) = db.metric_schema() {
                status.metrics = schema
                    .pairs()
                    .into_iter()
                    .map(|(name, t)| (name.to_string(), t.to_string()))
                    .collect();
            }
        }
    }

    if output_format.is_json() {
        let json = match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&status),
            _ => serde_json::to_string(&status),
        };
        match json {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing status: {}", e),
        }
        return;
    }

    print_status(&status);
}

fn print_status(status: &DatabaseStatus) {
    println!("Database:  {}", status.path);
    if !status.exists {
        println!("Status:    not created");
        return;
    }
    if let Some(size) = status.size_bytes {
        println!("Size:      {} bytes", size);
    }
    println!("Schema:    {}", status.schema);
    if let Some(counts) = &status.counts {
        println!("Analyses:  {}", counts.analyses);
        println!("Samples:   {}", counts.samples);
        println!("Results:   {}", counts.results);
    }
    if status.metrics.is_empty() {
        println!("Metrics:   none registered (values typed by inspection)");
    } else {
        println!("Metrics:");
        for (name, metric_type) in &status.metrics {
            println!("  {:<24} {}", name, metric_type);
        }
    }
}
