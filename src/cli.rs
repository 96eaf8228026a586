use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use deribit_options::PipelineConfig;
use deribit_options::fetch::{FetchConfig, Network};
use deribit_options::storage::{DEFAULT_SQLITE_PATH, MySqlConfig, StorageConfig};

/// Env var holding the MySQL password. Unset means an empty password.
pub const MYSQL_PASSWORD_ENV: &str = "DERIBIT_MYSQL_PASSWORD";

/// Fetch BTC option instruments from Deribit, keep the first expiry cohort,
/// and save it to an `options` table.
#[derive(Parser, Debug)]
#[command(name = "deribit-options", version, about)]
pub struct Cli {
    /// Storage backend: sqlite (default) or mysql
    #[arg(long, default_value = "sqlite")]
    pub backend: String,

    /// SQLite database file
    #[arg(long, default_value = DEFAULT_SQLITE_PATH)]
    pub db_path: PathBuf,

    /// MySQL host
    #[arg(long, default_value = "localhost")]
    pub mysql_host: String,

    /// MySQL port
    #[arg(long, default_value = "3306")]
    pub mysql_port: u16,

    /// MySQL user (password is read from DERIBIT_MYSQL_PASSWORD)
    #[arg(long, default_value = "root")]
    pub mysql_user: String,

    /// MySQL database name
    #[arg(long, default_value = "deribit_db")]
    pub mysql_database: String,

    /// Deribit environment to query (testnet or mainnet)
    #[arg(long, default_value = "testnet")]
    pub network: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,
}

impl Cli {
    pub fn into_config(self) -> Result<PipelineConfig> {
        let password = std::env::var(MYSQL_PASSWORD_ENV).unwrap_or_default();
        self.into_config_with_password(password)
    }

    fn into_config_with_password(self, password: String) -> Result<PipelineConfig> {
        let network = match self.network.to_lowercase().as_str() {
            "testnet" => Network::Testnet,
            "mainnet" => Network::Mainnet,
            other => bail!("Invalid network '{other}'. Use 'testnet' or 'mainnet'."),
        };

        let storage = match self.backend.to_lowercase().as_str() {
            "sqlite" => StorageConfig::sqlite(self.db_path),
            "mysql" => StorageConfig::MySql(MySqlConfig {
                host: self.mysql_host,
                port: self.mysql_port,
                user: self.mysql_user,
                password,
                database: self.mysql_database,
                ..MySqlConfig::default()
            }),
            other => bail!("Invalid backend '{other}'. Use 'sqlite' or 'mysql'."),
        };

        let fetch = FetchConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..FetchConfig::for_network(network)
        };

        Ok(PipelineConfig { fetch, storage })
    }
}
