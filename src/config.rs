use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::database::RetryPolicy;

/// Default number of retries when opening an existing database
pub const DEFAULT_CONNECT_RETRIES: u32 = 1;

/// Default base delay between open retries, in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Hosts the embedded SQLite engine can serve
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// File suffixes that mark a target as a database file path
const DATABASE_SUFFIXES: &[&str] = &[".db", ".sqlite", ".sqlite3"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabstoreConfig {
    /// Path to the directory holding named databases
    pub data_dir: String,

    /// Retries after a transient failure to open a database
    pub connect_retries: u32,

    /// Base delay of the exponential backoff between retries
    pub retry_backoff_ms: u64,
}

const EMPTY_CONFIG: &str = r#"### labstore configuration file

### directory holding databases created by name
# data_dir = "~/.labstore"

### retries when a database is busy or cannot be opened
# connect_retries = 1
# retry_backoff_ms = 200        # doubled after every retry
"#;

impl Default for LabstoreConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.labstore", home_dir),
            connect_retries: DEFAULT_CONNECT_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl LabstoreConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<LabstoreConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.labstore/labstore.toml as the configuration file path
        let labstore_dir = Self::default_dir()?;

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(labstore_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create labstore directory: {}", e))?;
                let p = format!("{}/labstore.toml", labstore_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of LABSTORE)
        // E.g., `LABSTORE_DATA_DIR=/srv/lab ./labstore` would set the data directory
        builder = builder.add_source(config::Environment::with_prefix("LABSTORE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, labstore_dir)
    }

    fn from_map(config: &HashMap<String, String>, default_dir: String) -> Result<LabstoreConfig> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_dir,
        };

        let connect_retries = match config.get("connect_retries") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid connect_retries '{}': {}", s, e))?,
            None => DEFAULT_CONNECT_RETRIES,
        };

        let retry_backoff_ms = match config.get("retry_backoff_ms") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid retry_backoff_ms '{}': {}", s, e))?,
            None => DEFAULT_RETRY_BACKOFF_MS,
        };

        Ok(LabstoreConfig {
            data_dir,
            connect_retries,
            retry_backoff_ms,
        })
    }

    fn default_dir() -> Result<String> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();
        Ok(format!("{}/.labstore", home_dir))
    }

    /// Path of the database file for a named database
    pub fn database_path(&self, name: &str) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}.sqlite3", data_dir, name)
    }

    /// Resolve a command-line target into a database location
    ///
    /// A target that contains a path separator or ends with a database file
    /// suffix is used as a path; anything else names a database inside
    /// `data_dir`. Only local hosts can be served.
    pub fn resolve_target(
        &self,
        target: &str,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<DatabaseTarget> {
        let host = host.unwrap_or("localhost");
        if !LOCAL_HOSTS.contains(&host.to_lowercase().as_str()) {
            return Err(anyhow!(
                "Cannot connect to database server at '{}': only local databases are supported",
                match port {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                }
            ));
        }

        let target = target.trim();
        if target.is_empty() {
            return Err(anyhow!("Database target must not be empty"));
        }

        let is_path = target.contains('/')
            || target.contains(std::path::MAIN_SEPARATOR)
            || DATABASE_SUFFIXES.iter().any(|s| target.ends_with(s));

        let path = if is_path {
            expand_home(target)
        } else {
            self.database_path(target)
        };

        Ok(DatabaseTarget {
            name: target.to_string(),
            path,
            host: host.to_string(),
            port,
        })
    }

    /// Backoff used when opening existing databases
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.connect_retries, self.retry_backoff_ms)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Config File:        {}", Self::config_file_path()),
            format!("Data Directory:     {}", self.data_dir),
            format!("Connect Retries:    {}", self.connect_retries),
            format!("Retry Backoff:      {} ms", self.retry_backoff_ms),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.labstore/labstore.toml", home_dir)
    }
}

/// Where a command's database lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseTarget {
    /// Target as given on the command line
    pub name: String,
    /// Database file path
    pub path: String,
    pub host: String,
    pub port: Option<u16>,
}

impl DatabaseTarget {
    /// Create the directory the database file will live in
    pub fn ensure_parent_dir(&self) -> Result<()> {
        match Path::new(&self.path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
                .map_err(|e| {
                    anyhow!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    )
                }),
            _ => Ok(()),
        }
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}
