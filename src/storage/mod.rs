pub mod mysql;
pub mod sql;
pub mod sqlite;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::InstrumentRecord;

pub use mysql::MySqlSink;
pub use sqlite::SqliteSink;

pub const DEFAULT_SQLITE_PATH: &str = "deribit_options.db";

// ── Storage config ──────────────────────────────────────────────────

/// Where the `options` table lives.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Embedded database file.
    Sqlite { path: PathBuf, busy_timeout: Duration },
    /// Server-backed database.
    MySql(MySqlConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::sqlite(DEFAULT_SQLITE_PATH)
    }
}

impl StorageConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        StorageConfig::Sqlite {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Build the sink for this target. Nothing is opened until `connect`.
    pub fn open_sink(&self) -> Box<dyn StorageSink> {
        match self {
            StorageConfig::Sqlite { path, busy_timeout } => {
                Box::new(SqliteSink::new(path.clone(), *busy_timeout))
            }
            StorageConfig::MySql(config) => Box::new(MySqlSink::new(config.clone())),
        }
    }
}

/// Connection parameters for the MySQL / MariaDB backend.
#[derive(Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        MySqlConfig {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "deribit_db".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl fmt::Display for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

// ── Write mode ──────────────────────────────────────────────────────

/// How `insert_batch` writes into the `options` table it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Table has `batch_id` and a unique key on `instrument_name`:
    /// rows are replaced and restamped.
    Upsert,
    /// Plain five-column table without those: rows are appended with a
    /// positional insert and no batch id.
    Append,
}

impl WriteMode {
    pub fn for_layout(has_batch_id: bool, unique_instrument_name: bool) -> Self {
        if has_batch_id && unique_instrument_name {
            WriteMode::Upsert
        } else {
            WriteMode::Append
        }
    }
}

// ── Sink traits ─────────────────────────────────────────────────────

/// A storage backend able to hold the `options` table.
///
/// Implemented by the SQLite file backend and the MySQL server backend;
/// the pipeline only ever sees this trait.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Target description for progress output. Never includes credentials.
    fn describe(&self) -> String;

    /// Open a connection. Fails with `StoreError::Connection` when the target
    /// is unreachable, locked, or rejects the credentials.
    async fn connect(&self) -> Result<Box<dyn SinkConnection>, StoreError>;
}

/// One open connection, owned by a single pipeline run.
///
/// `insert_batch` writes inside a transaction that only becomes visible on
/// `commit`. Dropping the connection without committing discards the batch.
/// Both `commit` and `rollback` release the connection.
#[async_trait]
pub trait SinkConnection: Send {
    /// Create the `options` table if absent. Never alters an existing table;
    /// instead picks the `WriteMode` the table it finds supports.
    async fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Write every record, in order. In `WriteMode::Upsert` rows are stamped
    /// with `batch_id`. Returns the number of rows written.
    async fn insert_batch(
        &mut self,
        batch_id: &str,
        records: &[InstrumentRecord],
    ) -> Result<usize, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
