use clap::Args;
use labstore::lens::insert::{InsertArgs, InsertLens};
use labstore::lens::utils::OutputFormat;
use labstore::LabstoreConfig;

use super::{open_database, resolve_target, TargetArgs};

/// Arguments for the InsertRecords command
#[derive(Args)]
pub struct InsertRecordsArgs {
    #[clap(flatten)]
    pub records: InsertArgs,

    #[clap(flatten)]
    pub target: TargetArgs,
}

pub fn run(config: &LabstoreConfig, args: InsertRecordsArgs, output_format: OutputFormat) {
    let InsertRecordsArgs { records, target } = args;
    let target = resolve_target(config, &target);
    let db = open_database(config, &target);

    let lens = InsertLens::new(&db);
    let summary = match lens.insert(&records) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("ERROR: nothing was inserted: {}", e);
            std::process::exit(1);
        }
    };

    match lens.format_summary(&summary, &output_format) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error formatting insert summary: {}", e);
            std::process::exit(1);
        }
    }

    if !summary.samples_without_results.is_empty() && !output_format.is_json() {
        eprintln!(
            "NOTE: no results rows for samples: {}",
            summary.samples_without_results.join(", ")
        );
    }
}
