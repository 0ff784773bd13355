//! Storage errors

use std::path::PathBuf;

use thiserror::Error;
use ur_core::PersistenceError;

/// Error type for the rule file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid rule file '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported rule file version: {0}")]
    UnsupportedVersion(u32),
}

impl From<StoreError> for PersistenceError {
    fn from(err: StoreError) -> Self {
        PersistenceError::with_source(err.to_string(), err)
    }
}
