use clap::{Parser, Subcommand};
use labstore::lens::utils::OutputFormat;
use labstore::LabstoreConfig;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::create_database::CreateDatabaseArgs;
use commands::insert_records::InsertRecordsArgs;
use commands::query::QueryCommandArgs;
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.labstore/labstore.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a database and its tables, optionally registering metric types.
    CreateDatabase(CreateDatabaseArgs),

    /// Insert one analysis with its samples and results in a single transaction.
    InsertRecords(InsertRecordsArgs),

    /// Query results joined to their samples, or list analyses.
    Query(QueryCommandArgs),

    /// Show schema status, row counts and registered metrics of a database.
    Status(StatusArgs),

    /// Show the effective configuration.
    Config(ConfigArgs),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match LabstoreConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    match cli.command {
        Commands::CreateDatabase(args) => {
            commands::create_database::run(&config, args, cli.format)
        }
        Commands::InsertRecords(args) => commands::insert_records::run(&config, args, cli.format),
        Commands::Query(args) => commands::query::run(&config, args, cli.format),
        Commands::Status(args) => commands::status::run(&config, args, cli.format),
        Commands::Config(args) => commands::config::run(&config, args, cli.format),
    }
}
