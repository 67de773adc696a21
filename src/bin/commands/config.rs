use clap::Args;
use labstore::lens::utils::OutputFormat;
use labstore::LabstoreConfig;
use serde::Serialize;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// List the database files found in the data directory
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    #[serde(flatten)]
    config: LabstoreConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    databases: Option<Vec<String>>,
}

pub fn run(config: &LabstoreConfig, args: ConfigArgs, output_format: OutputFormat) {
    let databases = if args.verbose {
        let mut names: Vec<String> = std::fs::read_dir(&config.data_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|ext| ext == "sqlite3"))
                    .filter_map(|path| {
                        path.file_stem()
                            .map(|stem| stem.to_string_lossy().to_string())
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Some(names)
    } else {
        None
    };

    let info = ConfigInfo {
        config_file: LabstoreConfig::config_file_path(),
        config: config.clone(),
        databases,
    };

    match output_format {
        OutputFormat::Json | OutputFormat::JsonLine => match serde_json::to_string(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing config info: {}", e),
        },
        OutputFormat::JsonPretty => match serde_json::to_string_pretty(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing config info: {}", e),
        },
        _ => {
            // Table, Markdown, and PSV all use the same human-readable format
            println!("{}", config.summary());
            if let Some(databases) = &info.databases {
                println!();
                if databases.is_empty() {
                    println!("No named databases in {}", config.data_dir);
                } else {
                    println!("Named databases:");
                    for name in databases {
                        println!("  {}", name);
                    }
                }
            }
        }
    }
}
