//! Pulls Deribit option instruments, keeps one expiration cohort, and
//! stores it in an `options` table (SQLite file or MySQL server).

pub mod error;
pub mod fetch;
pub mod filter;
pub mod model;
pub mod pipeline;
pub mod storage;

pub use error::{FetchError, PipelineError, StoreError};
pub use model::{InstrumentRecord, OptionType};
pub use pipeline::{Pipeline, PipelineConfig, PipelineState, RunReport};
