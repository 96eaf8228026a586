use thiserror::Error;

use crate::pipeline::PipelineState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the instrument fetch stage.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Host unreachable, transport failure, or a non-2xx status.
    #[error("network error fetching {url}: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Body is not JSON, or has no `result` array of instruments.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Network { status, .. } => *status,
            FetchError::Decode { .. } => None,
        }
    }
}

/// Failures of the storage sink. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to {target}")]
    Connection {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to set up `options` table")]
    Schema(#[source] BoxError),

    #[error("failed to insert instrument `{instrument_name}`")]
    Insert {
        instrument_name: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to {action} transaction")]
    Transaction {
        action: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub fn connection(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Connection {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn schema(source: impl Into<BoxError>) -> Self {
        StoreError::Schema(source.into())
    }

    pub fn insert(instrument_name: &str, source: impl Into<BoxError>) -> Self {
        StoreError::Insert {
            instrument_name: instrument_name.to_string(),
            source: source.into(),
        }
    }

    pub fn transaction(action: &'static str, source: impl Into<BoxError>) -> Self {
        StoreError::Transaction {
            action,
            source: source.into(),
        }
    }
}

/// Error that aborted a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Last state the driver reached before aborting.
    pub fn stage(&self) -> PipelineState {
        match self {
            PipelineError::Fetch(_) => PipelineState::Start,
            PipelineError::Store(StoreError::Connection { .. }) => PipelineState::Filtered,
            PipelineError::Store(_) => PipelineState::Connected,
        }
    }
}
