//! Manager and worker message protocol.
//!
//! Five message kinds cross the channel: `Assign` (manager to worker) and
//! `Completed`, `Failed`, `Progress`, `RateLimit` (worker to manager).

use crate::error::WorkUnitError;
use crate::planner::{UnitId, WorkUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Repository a job processes, copied into every document's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub repo_id: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    /// Vector-store namespace for the job's chunks
    pub namespace: String,
}

impl JobSpec {
    pub fn new(repo_id: impl Into<String>) -> Self {
        let repo_id = repo_id.into();
        Self {
            namespace: repo_id.clone(),
            repo_id,
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_commit(mut self, commit_hash: impl Into<String>) -> Self {
        self.commit_hash = Some(commit_hash.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub unit: WorkUnit,
    pub job: Arc<JobSpec>,
    /// Cancelled when the unit times out or the pool shuts down
    pub cancel: CancellationToken,
}

/// Manager to worker
#[derive(Debug)]
pub enum WorkerCommand {
    Assign(Assignment),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitResult {
    pub files_processed: usize,
    /// Missing or empty files
    pub files_skipped: usize,
    pub chunks_produced: usize,
}

/// Worker to manager
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Completed {
        worker: WorkerId,
        unit: UnitId,
        result: UnitResult,
    },
    Failed {
        worker: WorkerId,
        unit: UnitId,
        error: WorkUnitError,
    },
    /// Sent after every file batch; `requests` counts source API calls made for it
    Progress {
        worker: WorkerId,
        unit: UnitId,
        files_done: usize,
        requests: u64,
    },
    RateLimit {
        worker: WorkerId,
        unit: UnitId,
        retry_after: Duration,
    },
}

impl WorkerEvent {
    pub fn worker(&self) -> WorkerId {
        match self {
            WorkerEvent::Completed { worker, .. }
            | WorkerEvent::Failed { worker, .. }
            | WorkerEvent::Progress { worker, .. }
            | WorkerEvent::RateLimit { worker, .. } => *worker,
        }
    }
}

/// How a unit was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Completed(UnitResult),
    Failed(WorkUnitError),
}
