use std::fmt;

use log::{info, warn};

use crate::error::{PipelineError, StoreError};
use crate::fetch::{DeribitClient, FetchConfig, InstrumentSource};
use crate::filter::{filter_by_expiry, selected_expiry};
use crate::model::InstrumentRecord;
use crate::storage::{SinkConnection, StorageConfig, StorageSink};

// ── State ───────────────────────────────────────────────────────────

/// Driver states. Runs only move forward; `Aborted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Fetched,
    Filtered,
    Connected,
    Committed,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "START",
            PipelineState::Fetched => "FETCHED",
            PipelineState::Filtered => "FILTERED",
            PipelineState::Connected => "CONNECTED",
            PipelineState::Committed => "COMMITTED",
            PipelineState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

// ── Config & report ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

/// Outcome of a committed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Stamped on every row this run wrote.
    pub batch_id: String,
    pub fetched: usize,
    /// Expiry of the persisted cohort; `None` when nothing was fetched.
    pub selected_expiry: Option<i64>,
    pub written: usize,
}

impl RunReport {
    /// Selected expiry as a UTC date, for display only. Falls back to the
    /// raw value when it is out of chrono's range.
    pub fn expiry_label(&self) -> Option<String> {
        let ms = self.selected_expiry?;
        let label = chrono::DateTime::from_timestamp_millis(ms)
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| ms.to_string());
        Some(label)
    }
}

// ── Driver ──────────────────────────────────────────────────────────

/// Fetch → filter → persist, once.
///
/// The storage connection is opened only after the fetch has completed and
/// is released (committed or rolled back) before `run` returns.
pub struct Pipeline {
    source: Box<dyn InstrumentSource>,
    sink: Box<dyn StorageSink>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(source: Box<dyn InstrumentSource>, sink: Box<dyn StorageSink>) -> Self {
        Pipeline {
            source,
            sink,
            state: PipelineState::Start,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let source = DeribitClient::new(config.fetch.clone())?;
        Ok(Pipeline::new(Box::new(source), config.storage.open_sink()))
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the pipeline. Any error leaves the driver in `Aborted` and the
    /// table as it was before the run. Reporting the error is up to the caller.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        if self.state != PipelineState::Start {
            warn!("pipeline re-run from state {}; resetting", self.state);
            self.state = PipelineState::Start;
        }

        match self.drive().await {
            Ok(report) => Ok(report),
            Err(err) => {
                info!("aborted after {}: {err}", err.stage());
                self.advance(PipelineState::Aborted);
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<RunReport, PipelineError> {
        let batch_id = uuid::Uuid::new_v4().to_string();

        println!("[1] Fetching instruments from {} ...", self.source.describe());
        let instruments = self.source.fetch_instruments().await?;
        self.advance(PipelineState::Fetched);

        println!("[2] Filtering {} instruments by one expiry date...", instruments.len());
        let filtered = filter_by_expiry(&instruments);
        self.advance(PipelineState::Filtered);
        println!("[3] Total filtered instruments: {}", filtered.len());

        println!("[4] Connecting to {} ...", self.sink.describe());
        let mut conn = self.sink.connect().await?;
        self.advance(PipelineState::Connected);

        let written = match persist(&mut *conn, &batch_id, &filtered).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!("rollback after failed batch: {rollback_err}");
                }
                return Err(err.into());
            }
        };
        conn.commit().await?;
        self.advance(PipelineState::Committed);

        let report = RunReport {
            batch_id,
            fetched: instruments.len(),
            selected_expiry: selected_expiry(&instruments),
            written,
        };
        match report.expiry_label() {
            Some(expiry) => println!(
                "Done. {} rows expiring {expiry} saved to {} (batch {}).",
                report.written,
                self.sink.describe(),
                report.batch_id
            ),
            None => println!(
                "Done. 0 rows saved to {} (no instruments returned).",
                self.sink.describe()
            ),
        }
        Ok(report)
    }

    fn advance(&mut self, next: PipelineState) {
        info!("{} -> {}", self.state, next);
        self.state = next;
    }
}

/// Schema first, then the batch. Nothing here commits.
async fn persist(
    conn: &mut dyn SinkConnection,
    batch_id: &str,
    records: &[InstrumentRecord],
) -> Result<usize, StoreError> {
    println!("[5] Setting up `options` table...");
    conn.ensure_schema().await?;

    println!("[6] Inserting {} rows...", records.len());
    conn.insert_batch(batch_id, records).await
}
