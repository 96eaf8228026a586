use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::{Connection, params};

use super::{SinkConnection, StorageSink, WriteMode, sql};
use crate::error::StoreError;
use crate::model::InstrumentRecord;

/// Embedded-file backend.
pub struct SqliteSink {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        SqliteSink {
            path: path.into(),
            busy_timeout,
        }
    }
}

#[async_trait]
impl StorageSink for SqliteSink {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    async fn connect(&self) -> Result<Box<dyn SinkConnection>, StoreError> {
        let target = self.describe();

        // The parent directory is not created: a bad path is a connection failure.
        let conn = Connection::open(&self.path).map_err(|e| StoreError::connection(&target, e))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| StoreError::connection(&target, e))?;

        // Opening is lazy; read the schema once so that a file that is not a
        // database fails here and not mid-batch.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| StoreError::connection(&target, e))?;

        // Take the write lock now. Another run holding it past the busy
        // timeout is a connection failure, not a failed batch.
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StoreError::connection(&target, e))?;

        debug!("opened {target} with write lock");
        Ok(Box::new(SqliteSession { conn, mode: None }))
    }
}

/// Holds an open `BEGIN IMMEDIATE` transaction from connect until
/// commit, rollback, or drop.
struct SqliteSession {
    conn: Connection,
    mode: Option<WriteMode>,
}

impl SqliteSession {
    fn write_mode(&mut self) -> Result<WriteMode, StoreError> {
        if let Some(mode) = self.mode {
            return Ok(mode);
        }
        let (batch_id_columns, unique_name_keys): (i64, i64) = self
            .conn
            .query_row(sql::SQLITE_TABLE_LAYOUT, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(StoreError::schema)?;

        let mode = WriteMode::for_layout(batch_id_columns > 0, unique_name_keys > 0);
        if mode == WriteMode::Append {
            warn!("`options` table has no batch_id/unique instrument_name; appending rows");
        }
        self.mode = Some(mode);
        Ok(mode)
    }

    fn finish(self, statement: &'static str, action: &'static str) -> Result<(), StoreError> {
        let result = self
            .conn
            .execute_batch(statement)
            .map_err(|e| StoreError::transaction(action, e));

        if let Err((_, e)) = self.conn.close() {
            warn!("closing sqlite connection: {e}");
        }
        result
    }
}

#[async_trait]
impl SinkConnection for SqliteSession {
    async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(sql::SQLITE_CREATE_TABLE)
            .map_err(StoreError::schema)?;
        self.mode = None;
        self.write_mode().map(|_| ())
    }

    async fn insert_batch(
        &mut self,
        batch_id: &str,
        records: &[InstrumentRecord],
    ) -> Result<usize, StoreError> {
        let mode = self.write_mode()?;
        let statement = match mode {
            WriteMode::Upsert => sql::SQLITE_UPSERT,
            WriteMode::Append => sql::SQLITE_INSERT,
        };
        let mut stmt = self.conn.prepare_cached(statement).map_err(StoreError::schema)?;

        let mut written = 0;
        for record in records {
            let result = match mode {
                WriteMode::Upsert => stmt.execute(params![
                    record.instrument_name,
                    record.strike,
                    record.expiration_timestamp,
                    record.option_type.as_str(),
                    record.min_trade_amount,
                    batch_id,
                ]),
                WriteMode::Append => stmt.execute(params![
                    record.instrument_name,
                    record.strike,
                    record.expiration_timestamp,
                    record.option_type.as_str(),
                    record.min_trade_amount,
                ]),
            };
            result.map_err(|e| StoreError::insert(&record.instrument_name, e))?;
            written += 1;
        }

        debug!("staged {written} rows for batch {batch_id} ({mode:?})");
        Ok(written)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        (*self).finish("COMMIT", "commit")
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        (*self).finish("ROLLBACK", "roll back")
    }
}
