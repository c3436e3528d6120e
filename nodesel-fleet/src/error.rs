//! Error types for fleet plumbing

use nodesel_query::QueryError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid ip version: {0}")]
    InvalidIpVersion(String),

    #[error("Invalid wait mode: {0}")]
    InvalidWaitMode(String),

    #[error("Timeout after {elapsed:?} with {pending} slot(s) or address(es) unresolved")]
    Timeout { elapsed: Duration, pending: usize },
}

impl FleetError {
    /// Failures worth another attempt on the next polling pass
    pub fn is_transient(&self) -> bool {
        matches!(self, FleetError::Io { .. } | FleetError::Decode { .. })
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
