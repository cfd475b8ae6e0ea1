//! Job reports and pool snapshots returned to callers

use crate::messages::{UnitResult, WorkerId};
use crate::planner::{JobId, UnitId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Every unit completed
    Success,
    /// Some units failed
    Partial,
    /// The job could not run, or every unit failed
    Failed,
}

impl JobStatus {
    pub fn from_counts(completed: usize, failed: usize) -> Self {
        match (completed, failed) {
            (_, 0) if completed > 0 => JobStatus::Success,
            (0, _) => JobStatus::Failed,
            _ => JobStatus::Partial,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Success => "success",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub unit: UnitId,
    pub worker: WorkerId,
    pub result: UnitResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_units: usize,
    pub completed_units: usize,
    pub failed_units: usize,
    pub files_processed: usize,
    pub chunks_produced: usize,
    /// Failed units and the reason, in resolution order
    pub failures: Vec<(UnitId, String)>,
    pub results: Vec<UnitReport>,
    pub elapsed_ms: u64,
}

impl JobReport {
    /// Report for a job with no files: nothing to do, so nothing failed
    pub fn empty(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Success,
            total_units: 0,
            completed_units: 0,
            failed_units: 0,
            files_processed: 0,
            chunks_produced: 0,
            failures: Vec::new(),
            results: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub percentage: f32,
    pub active_workers: usize,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerCounts {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub rate_limited: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub workers: WorkerCounts,
    pub jobs: JobCounts,
    pub queue: QueueCounts,
}
