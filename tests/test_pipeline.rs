use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;

use deribit_options::fetch::InstrumentSource;
use deribit_options::storage::{SinkConnection, SqliteSink, StorageSink};
use deribit_options::{
    FetchError, InstrumentRecord, OptionType, Pipeline, PipelineError, PipelineState, StoreError,
};

// ── Stubs ────────────────────────────────────────────────────────────

struct StubSource {
    records: Option<Vec<InstrumentRecord>>,
}

impl StubSource {
    fn ok(records: Vec<InstrumentRecord>) -> Box<Self> {
        Box::new(StubSource {
            records: Some(records),
        })
    }

    fn failing() -> Box<Self> {
        Box::new(StubSource { records: None })
    }
}

#[async_trait]
impl InstrumentSource for StubSource {
    fn describe(&self) -> String {
        "stub".to_string()
    }

    async fn fetch_instruments(&self) -> Result<Vec<InstrumentRecord>, FetchError> {
        self.records.clone().ok_or_else(|| FetchError::Network {
            url: "stub".to_string(),
            status: Some(502),
            message: "HTTP 502: Bad Gateway".to_string(),
        })
    }
}

type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// Records every sink call; can be told to fail at connect or insert.
struct RecordingSink {
    calls: CallLog,
    fail_connect: bool,
    fail_insert: bool,
}

struct RecordingConnection {
    calls: CallLog,
    fail_insert: bool,
}

#[async_trait]
impl StorageSink for RecordingSink {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    async fn connect(&self) -> Result<Box<dyn SinkConnection>, StoreError> {
        self.calls.lock().unwrap().push("connect");
        if self.fail_connect {
            return Err(StoreError::connection("recording", "access denied"));
        }
        Ok(Box::new(RecordingConnection {
            calls: self.calls.clone(),
            fail_insert: self.fail_insert,
        }))
    }
}

#[async_trait]
impl SinkConnection for RecordingConnection {
    async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push("ensure_schema");
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        _batch_id: &str,
        records: &[InstrumentRecord],
    ) -> Result<usize, StoreError> {
        self.calls.lock().unwrap().push("insert_batch");
        if self.fail_insert {
            let name = records.first().map(|r| r.instrument_name.as_str()).unwrap_or("?");
            return Err(StoreError::insert(name, "type mismatch"));
        }
        Ok(records.len())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push("commit");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push("rollback");
        Ok(())
    }
}

fn recording(fail_connect: bool, fail_insert: bool) -> (Box<RecordingSink>, CallLog) {
    let calls = CallLog::default();
    let sink = RecordingSink {
        calls: calls.clone(),
        fail_connect,
        fail_insert,
    };
    (Box::new(sink), calls)
}

fn record(name: &str, expiry: i64) -> InstrumentRecord {
    InstrumentRecord {
        instrument_name: name.to_string(),
        strike: 70_000.0,
        expiration_timestamp: expiry,
        option_type: OptionType::Call,
        min_trade_amount: 0.1,
    }
}

fn sqlite_names(path: &std::path::Path) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT instrument_name FROM options ORDER BY rowid")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_expiry_cohort_is_committed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.db");
    let source = StubSource::ok(vec![
        record("a", 100),
        record("b", 100),
        record("c", 200),
        record("d", 100),
        record("e", 300),
    ]);
    let sink = Box::new(SqliteSink::new(&path, Duration::from_secs(1)));

    let mut pipeline = Pipeline::new(source, sink);
    let report = pipeline.run().await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Committed);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.written, 3);
    assert_eq!(report.selected_expiry, Some(100));
    assert_eq!(sqlite_names(&path), vec!["a", "b", "d"]);
}

#[tokio::test]
async fn test_empty_fetch_still_creates_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.db");
    let sink = Box::new(SqliteSink::new(&path, Duration::from_secs(1)));

    let mut pipeline = Pipeline::new(StubSource::ok(vec![]), sink);
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.written, 0);
    assert_eq!(report.selected_expiry, None);
    assert_eq!(pipeline.state(), PipelineState::Committed);
    assert!(sqlite_names(&path).is_empty());
}

#[tokio::test]
async fn test_fetch_failure_never_touches_storage() {
    let (sink, calls) = recording(false, false);

    let mut pipeline = Pipeline::new(StubSource::failing(), sink);
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch(FetchError::Network { .. })));
    assert_eq!(err.stage(), PipelineState::Start);
    assert_eq!(pipeline.state(), PipelineState::Aborted);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_failure_skips_schema_and_insert() {
    let (sink, calls) = recording(true, false);

    let mut pipeline = Pipeline::new(StubSource::ok(vec![record("a", 1)]), sink);
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Store(StoreError::Connection { .. })));
    assert_eq!(err.stage(), PipelineState::Filtered);
    assert_eq!(pipeline.state(), PipelineState::Aborted);
    assert_eq!(*calls.lock().unwrap(), vec!["connect"]);
}

#[tokio::test]
async fn test_insert_failure_rolls_back_instead_of_committing() {
    let (sink, calls) = recording(false, true);

    let mut pipeline = Pipeline::new(StubSource::ok(vec![record("a", 1), record("b", 1)]), sink);
    let err = pipeline.run().await.unwrap_err();

    match &err {
        PipelineError::Store(StoreError::Insert { instrument_name, .. }) => assert_eq!(instrument_name, "a"),
        other => panic!("expected insert error, got {other:?}"),
    }
    assert_eq!(err.stage(), PipelineState::Connected);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["connect", "ensure_schema", "insert_batch", "rollback"]
    );
}

#[tokio::test]
async fn test_success_orders_schema_before_insert_before_commit() {
    let (sink, calls) = recording(false, false);

    let mut pipeline = Pipeline::new(StubSource::ok(vec![record("a", 1), record("b", 2)]), sink);
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["connect", "ensure_schema", "insert_batch", "commit"]
    );
}

#[tokio::test]
async fn test_unreachable_sqlite_path_aborts_at_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing/options.db");
    let sink = Box::new(SqliteSink::new(&path, Duration::from_secs(1)));

    let mut pipeline = Pipeline::new(StubSource::ok(vec![record("a", 1)]), sink);
    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.stage(), PipelineState::Filtered);
    assert_eq!(pipeline.state(), PipelineState::Aborted);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_batch_id_is_fresh_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.db");
    let records = vec![record("a", 1), record("b", 1)];

    let mut first = Pipeline::new(
        StubSource::ok(records.clone()),
        Box::new(SqliteSink::new(&path, Duration::from_secs(1))),
    );
    let first = first.run().await.unwrap();
    let mut second = Pipeline::new(
        StubSource::ok(records),
        Box::new(SqliteSink::new(&path, Duration::from_secs(1))),
    );
    let second = second.run().await.unwrap();

    assert_ne!(first.batch_id, second.batch_id);
    assert_eq!(sqlite_names(&path), vec!["a", "b"]);
}

#[tokio::test]
async fn test_existing_five_column_table_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TABLE options (
                instrument_name TEXT,
                strike REAL,
                expiration_timestamp INTEGER,
                option_type TEXT,
                min_trade_amount REAL
            );",
        )
        .unwrap();
    let sink = Box::new(SqliteSink::new(&path, Duration::from_secs(1)));

    let mut pipeline = Pipeline::new(StubSource::ok(vec![record("a", 1), record("b", 2)]), sink);
    let report = pipeline.run().await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Committed);
    assert_eq!(report.written, 1);
    assert_eq!(sqlite_names(&path), vec!["a"]);
}
