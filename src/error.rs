//! Error types shared across the backup and restore pipelines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input: bad name, unknown collection, duplicate backup, ...
    #[error("invalid parameter: {0}")]
    Param(String),

    /// A backup or restore task that does not exist, or a missing object
    /// where absence is meaningful (not retryable).
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient object storage failure. Retryable.
    #[error("object storage error: {0}")]
    Storage(String),

    /// Transient cluster RPC failure. Retryable.
    #[error("cluster rpc error: {0}")]
    Rpc(String),

    /// Non-retryable pipeline failure: missing source binlog, src == dst
    /// path computation, bulk-insert job failure.
    #[error("{0}")]
    Fatal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether a retry wrapper is allowed to swallow this error and
    /// re-attempt. Not-found and parameter errors never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Rpc(_) | Error::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
