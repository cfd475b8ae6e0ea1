//! Collaborators at the pipeline boundary

use crate::error::FetchError;
use crate::loader::FileRef;
use crate::messages::{UnitOutcome, WorkerId};
use crate::planner::UnitId;
use anyhow::Result;
use async_trait::async_trait;
use codechunk_core::postprocess::FlatMetadata;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Source of file content, typically a remote repository API
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, file: &FileRef) -> std::result::Result<String, FetchError>;
}

/// A chunk ready for embedding and storage
#[derive(Debug, Clone, Serialize)]
pub struct PreparedChunk {
    /// Content hash
    pub id: String,
    pub content: String,
    pub metadata: FlatMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Stored,
    Failed(String),
}

/// Embedding and vector-store stage; returns one status per chunk
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn upsert(&self, namespace: &str, chunks: &[PreparedChunk]) -> Result<Vec<ItemStatus>>;
}

/// Observer of pool events
pub trait PoolMonitor: Send + Sync {
    fn on_rate_limit(&self, _worker: WorkerId, _unit: UnitId, _retry_after: Duration) {}
    fn on_unit_finished(&self, _unit: UnitId, _outcome: &UnitOutcome) {}
    fn on_worker_exit(&self, _worker: WorkerId, _reason: &str) {}
}

/// Logs pool events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl PoolMonitor for TracingMonitor {
    fn on_rate_limit(&self, worker: WorkerId, unit: UnitId, retry_after: Duration) {
        warn!(worker_id = %worker, unit_id = %unit, retry_after_ms = retry_after.as_millis() as u64, "worker rate limited");
    }

    fn on_unit_finished(&self, unit: UnitId, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Completed(result) => info!(
                unit_id = %unit,
                files = result.files_processed,
                chunks = result.chunks_produced,
                "work unit completed"
            ),
            UnitOutcome::Failed(error) => warn!(unit_id = %unit, error = %error, "work unit failed"),
        }
    }

    fn on_worker_exit(&self, worker: WorkerId, reason: &str) {
        error!(worker_id = %worker, reason, "worker left the pool");
    }
}
