//! Repository-scale chunking pipeline.
//!
//! Files are planned into prioritized [`WorkUnit`](planner::WorkUnit)s and
//! processed by a fixed pool of workers coordinated by one manager task,
//! which owns the shared request budget. Workers fetch and split files and
//! forward the chunks to a single ingest stage that deduplicates them and
//! writes them to a [`ChunkStore`](traits::ChunkStore).

pub mod error;
pub mod ingest;
pub mod loader;
pub mod manager;
pub mod messages;
pub mod pipeline;
pub mod planner;
pub mod rate_limit;
pub mod report;
pub mod traits;
pub mod worker;

pub use error::{FetchError, PoolError, WorkUnitError};
pub use ingest::{ChunkBatch, IngestStats, Ingestor};
pub use loader::{scan_directory, FileRef, FsFetcher};
pub use manager::{JobTicket, PoolState, WorkerPool, WorkerPoolHandle, WorkerSnapshot, WorkerStatus};
pub use messages::{JobSpec, UnitResult, WorkerEvent, WorkerId};
pub use pipeline::{Pipeline, PipelineReport};
pub use planner::{plan, JobId, Priority, UnitId, WorkUnit};
pub use report::{JobProgress, JobReport, JobStatus, PoolStatus};
pub use traits::{ChunkStore, FileFetcher, ItemStatus, PoolMonitor, PreparedChunk, TracingMonitor};
