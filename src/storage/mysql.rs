use async_trait::async_trait;
use log::{debug, warn};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{Executor, MySql, Transaction};

use super::{MySqlConfig, SinkConnection, StorageSink, WriteMode, sql};
use crate::error::StoreError;
use crate::model::InstrumentRecord;

/// Server-backed backend (MySQL or MariaDB).
pub struct MySqlSink {
    config: MySqlConfig,
}

impl MySqlSink {
    pub fn new(config: MySqlConfig) -> Self {
        MySqlSink { config }
    }
}

#[async_trait]
impl StorageSink for MySqlSink {
    fn describe(&self) -> String {
        self.config.to_string()
    }

    async fn connect(&self) -> Result<Box<dyn SinkConnection>, StoreError> {
        let c = &self.config;
        let options = MySqlConnectOptions::new()
            .host(&c.host)
            .port(c.port)
            .username(&c.user)
            .password(&c.password)
            .database(&c.database);

        // One connection: the run owns it exclusively, and `connect_with`
        // opens it eagerly so bad credentials fail here.
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(c.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connection(self.describe(), e))?;

        debug!("connected to {}", self.describe());
        Ok(Box::new(MySqlSession {
            pool,
            tx: None,
            mode: None,
        }))
    }
}

struct MySqlSession {
    pool: MySqlPool,
    tx: Option<Transaction<'static, MySql>>,
    mode: Option<WriteMode>,
}

async fn detect_write_mode<'e, E>(executor: E) -> Result<WriteMode, StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let (batch_id_columns, unique_name_keys): (i64, i64) = sqlx::query_as(sql::MYSQL_TABLE_LAYOUT)
        .fetch_one(executor)
        .await
        .map_err(StoreError::schema)?;

    let mode = WriteMode::for_layout(batch_id_columns > 0, unique_name_keys > 0);
    if mode == WriteMode::Append {
        warn!("`options` table has no batch_id/unique instrument_name; appending rows");
    }
    Ok(mode)
}

#[async_trait]
impl SinkConnection for MySqlSession {
    async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        // DDL commits implicitly in MySQL, so it runs outside the batch transaction.
        let query = sqlx::query(sql::MYSQL_CREATE_TABLE);
        let result = match self.tx.as_mut() {
            Some(tx) => query.execute(&mut **tx).await,
            None => query.execute(&self.pool).await,
        };
        result.map_err(StoreError::schema)?;

        let mode = match self.tx.as_mut() {
            Some(tx) => detect_write_mode(&mut **tx).await?,
            None => detect_write_mode(&self.pool).await?,
        };
        self.mode = Some(mode);
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        batch_id: &str,
        records: &[InstrumentRecord],
    ) -> Result<usize, StoreError> {
        let mode = match self.mode {
            Some(mode) => mode,
            None => {
                let mode = match self.tx.as_mut() {
                    Some(tx) => detect_write_mode(&mut **tx).await?,
                    None => detect_write_mode(&self.pool).await?,
                };
                self.mode = Some(mode);
                mode
            }
        };

        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self
                .pool
                .begin()
                .await
                .map_err(|e| StoreError::transaction("begin", e))?,
        };
        let tx = self.tx.insert(tx);

        let mut written = 0;
        for record in records {
            let query = match mode {
                WriteMode::Upsert => sqlx::query(sql::MYSQL_UPSERT),
                WriteMode::Append => sqlx::query(sql::MYSQL_INSERT),
            };
            let query = query
                .bind(&record.instrument_name)
                .bind(record.strike)
                .bind(record.expiration_timestamp)
                .bind(record.option_type.as_str())
                .bind(record.min_trade_amount);
            let query = match mode {
                WriteMode::Upsert => query.bind(batch_id),
                WriteMode::Append => query,
            };
            query
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::insert(&record.instrument_name, e))?;
            written += 1;
        }

        debug!("staged {written} rows for batch {batch_id} ({mode:?})");
        Ok(written)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MySqlSession { pool, tx, .. } = *self;
        let result = match tx {
            Some(tx) => tx.commit().await.map_err(|e| StoreError::transaction("commit", e)),
            None => Ok(()),
        };
        pool.close().await;
        result
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let MySqlSession { pool, tx, .. } = *self;
        let result = match tx {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| StoreError::transaction("roll back", e)),
            None => Ok(()),
        };
        pool.close().await;
        result
    }
}
