//! Batch driver errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch driver requires a running tokio runtime")]
    NoRuntime,

    #[error("batch name must not be empty")]
    EmptyBatchName,
}

pub type BatchResult<T> = Result<T, BatchError>;
