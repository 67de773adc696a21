use clap::Args;
use labstore::lens::query::{QueryArgs, QueryLens};
use labstore::lens::utils::OutputFormat;
use labstore::LabstoreConfig;

use super::{open_database, resolve_target, TargetArgs};

/// Arguments for the Query command
#[derive(Args)]
pub struct QueryCommandArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    #[clap(flatten)]
    pub query: QueryArgs,
}

pub fn run(config: &LabstoreConfig, args: QueryCommandArgs, output_format: OutputFormat) {
    let QueryCommandArgs { target, query } = args;

    if let Err(e) = query.validate() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    let target = resolve_target(config, &target);
    let db = open_database(config, &target);
    let lens = QueryLens::new(&db);

    if query.list_analyses {
        let filter = match query.analysis_filter() {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
        };
        let analyses = match lens.list_analyses(&filter) {
            Ok(analyses) => analyses,
            Err(e) => {
                eprintln!("Error listing analyses: {}", e);
                std::process::exit(1);
            }
        };
        if analyses.is_empty() && !output_format.is_json() {
            println!("No analyses found");
            return;
        }
        match lens.format_analyses(&analyses, &output_format) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("Error formatting analyses: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let table = match lens.query(&query) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error querying results: {}", e);
            std::process::exit(1);
        }
    };

    if query.output.is_none() && table.is_empty() && !output_format.is_json() {
        println!("No results found");
        return;
    }

    match lens.render(&table, query.output.as_deref(), &output_format) {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => {
            if let Some(path) = &query.output {
                eprintln!("Wrote {} rows to {}", table.len(), path);
            }
        }
        Err(e) => {
            eprintln!("Error writing results: {}", e);
            std::process::exit(1);
        }
    }
}
