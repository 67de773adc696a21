pub mod config;
pub mod create_database;
pub mod insert_records;
pub mod query;
pub mod status;

use clap::Args;
use labstore::config::DatabaseTarget;
use labstore::database::LabDatabase;
use labstore::LabstoreConfig;

/// Database location shared by all commands that work on a database
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Database name (stored in the data directory) or database file path
    #[clap(value_name = "TARGET")]
    pub target: String,

    /// Database server host; only local hosts are served
    #[clap(long)]
    pub host: Option<String>,

    /// Database server port
    #[clap(long)]
    pub port: Option<u16>,
}

/// Resolve the target or exit with an error
pub(crate) fn resolve_target(config: &LabstoreConfig, args: &TargetArgs) -> DatabaseTarget {
    match config.resolve_target(&args.target, args.host.as_deref(), args.port) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

/// Open an existing, initialized database or exit with an error
pub(crate) fn open_database(config: &LabstoreConfig, target: &DatabaseTarget) -> LabDatabase {
    match LabDatabase::open(&target.path, &config.retry_policy()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}
