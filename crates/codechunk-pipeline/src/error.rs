use std::time::Duration;
use thiserror::Error;

/// Returned by a [`FileFetcher`](crate::traits::FileFetcher)
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The source API refused the request; retry after the given interval
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a work unit failed. Failed units are reported, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkUnitError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch failed for {path}: {message}")]
    Fetch { path: String, message: String },

    #[error("splitting failed: {0}")]
    Split(String),

    #[error("worker {0} exited")]
    WorkerExited(usize),

    #[error("no workers left to run the unit")]
    NoWorkers,

    #[error("ingest stage closed")]
    IngestClosed,

    #[error("cancelled")]
    Cancelled,
}

/// Errors a caller of the worker pool can see
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool has no workers")]
    NoWorkers,

    #[error("worker pool is shut down")]
    ShutDown,

    #[error("unknown job {0}")]
    UnknownJob(String),

    #[error("job has no files")]
    EmptyJob,
}
