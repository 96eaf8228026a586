//! SQL text for the `options` table, per backend.
//!
//! Both dialects keep the five instrument columns with the same names and
//! types, plus `batch_id` and a uniqueness constraint on `instrument_name`
//! so that re-running the pipeline replaces rows instead of duplicating them.

pub const SQLITE_CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS options (
        instrument_name      TEXT NOT NULL,
        strike               REAL,
        expiration_timestamp INTEGER,
        option_type          TEXT,
        min_trade_amount     REAL,
        batch_id             TEXT,
        UNIQUE (instrument_name)
    );
";

pub const SQLITE_UPSERT: &str = "
    INSERT INTO options (
        instrument_name, strike, expiration_timestamp, option_type, min_trade_amount, batch_id
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (instrument_name) DO UPDATE SET
        strike               = excluded.strike,
        expiration_timestamp = excluded.expiration_timestamp,
        option_type          = excluded.option_type,
        min_trade_amount     = excluded.min_trade_amount,
        batch_id             = excluded.batch_id
";

// Legacy five-column `options` tables get plain appends.
pub const SQLITE_INSERT: &str = "
    INSERT INTO options (
        instrument_name, strike, expiration_timestamp, option_type, min_trade_amount
    ) VALUES (?1, ?2, ?3, ?4, ?5)
";

/// `(batch_id columns, single-column unique keys on instrument_name)`.
pub const SQLITE_TABLE_LAYOUT: &str = "
    SELECT
        (SELECT count(*) FROM pragma_table_info('options') WHERE name = 'batch_id'),
        (SELECT count(*) FROM pragma_index_list('options') AS il
          WHERE il.\"unique\" = 1
            AND (SELECT count(*) FROM pragma_index_info(il.name)) = 1
            AND (SELECT name FROM pragma_index_info(il.name)) = 'instrument_name')
";

pub const MYSQL_CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS options (
        instrument_name      VARCHAR(255) NOT NULL,
        strike               REAL,
        expiration_timestamp BIGINT,
        option_type          VARCHAR(50),
        min_trade_amount     REAL,
        batch_id             CHAR(36),
        UNIQUE KEY uq_options_instrument_name (instrument_name)
    )
";

// VALUES() rather than a row alias so MariaDB accepts it too.
pub const MYSQL_UPSERT: &str = "
    INSERT INTO options (
        instrument_name, strike, expiration_timestamp, option_type, min_trade_amount, batch_id
    ) VALUES (?, ?, ?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        strike               = VALUES(strike),
        expiration_timestamp = VALUES(expiration_timestamp),
        option_type          = VALUES(option_type),
        min_trade_amount     = VALUES(min_trade_amount),
        batch_id             = VALUES(batch_id)
";

pub const MYSQL_INSERT: &str = "
    INSERT INTO options (
        instrument_name, strike, expiration_timestamp, option_type, min_trade_amount
    ) VALUES (?, ?, ?, ?, ?)
";

/// Same shape as `SQLITE_TABLE_LAYOUT`, from `information_schema`.
pub const MYSQL_TABLE_LAYOUT: &str = "
    SELECT
        (SELECT COUNT(*) FROM information_schema.COLUMNS
          WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = 'options'
            AND COLUMN_NAME = 'batch_id'),
        (SELECT COUNT(*) FROM information_schema.STATISTICS s
          WHERE s.TABLE_SCHEMA = DATABASE() AND s.TABLE_NAME = 'options'
            AND s.NON_UNIQUE = 0 AND s.SEQ_IN_INDEX = 1
            AND s.COLUMN_NAME = 'instrument_name'
            AND NOT EXISTS (
                SELECT 1 FROM information_schema.STATISTICS s2
                 WHERE s2.TABLE_SCHEMA = s.TABLE_SCHEMA AND s2.TABLE_NAME = s.TABLE_NAME
                   AND s2.INDEX_NAME = s.INDEX_NAME AND s2.SEQ_IN_INDEX > 1))
";
