use clap::Args;
use labstore::database::LabDatabase;
use labstore::lens::utils::OutputFormat;
use labstore::metrics::MetricSchema;
use labstore::LabstoreConfig;
use serde::Serialize;

use super::{resolve_target, TargetArgs};

/// Arguments for the CreateDatabase command
#[derive(Args)]
pub struct CreateDatabaseArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    /// CSV file declaring metric names (header) and their types (second row)
    #[clap(long, value_name = "DECL_CSV")]
    pub metrics: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateInfo {
    path: String,
    metrics: Vec<MetricInfo>,
    defaulted: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MetricInfo {
    name: String,
    metric_type: String,
}

pub fn run(config: &LabstoreConfig, args: CreateDatabaseArgs, output_format: OutputFormat) {
    let CreateDatabaseArgs { target, metrics } = args;
    let target = resolve_target(config, &target);

    // Read the declaration before touching the database
    let schema = match metrics {
        Some(path) => match MetricSchema::from_path(&path) {
            Ok(schema) => Some(schema),
            Err(e) => {
                eprintln!("ERROR: invalid metric declaration '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    if let Err(e) = target.ensure_parent_dir() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = LabDatabase::create(&target.path, schema.as_ref()) {
        eprintln!("Failed to create database: {}", e);
        std::process::exit(1);
    }

    let info = CreateInfo {
        path: target.path.clone(),
        metrics: schema
            .as_ref()
            .map(|s| {
                s.pairs()
                    .into_iter()
                    .map(|(name, metric_type)| MetricInfo {
                        name: name.to_string(),
                        metric_type: metric_type.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        defaulted: schema.map(|s| s.defaulted).unwrap_or_default(),
    };

    if output_format.is_json() {
        let json = match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&info),
            _ => serde_json::to_string(&info),
        };
        match json {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing create info: {}", e),
        }
        return;
    }

    println!("Database ready at {}", info.path);
    if !info.metrics.is_empty() {
        println!("Registered {} metrics:", info.metrics.len());
        for metric in &info.metrics {
            println!("  {:<24} {}", metric.name, metric.metric_type);
        }
    }
    if !info.defaulted.is_empty() {
        eprintln!(
            "WARNING: unrecognized type tags defaulted to String for: {}",
            info.defaulted.join(", ")
        );
    }
}
