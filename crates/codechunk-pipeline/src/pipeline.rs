//! End to end run: scan (or take) a file list, process it on the worker
//! pool and store the chunks through the ingest stage

use crate::ingest::{IngestStats, Ingestor};
use crate::loader::{scan_directory, FileRef, FsFetcher};
use crate::manager::WorkerPool;
use crate::messages::JobSpec;
use crate::planner::JobId;
use crate::report::JobReport;
use crate::traits::{ChunkStore, FileFetcher, PoolMonitor, TracingMonitor};
use anyhow::{Context, Result};
use codechunk_config::Config;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Batches buffered between workers and the ingest stage
const INGEST_QUEUE_DEPTH: usize = 32;

/// Id reported for a run that had nothing to submit; pool ids start at 1
const UNSUBMITTED_JOB: JobId = JobId(0);

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub job: JobReport,
    pub ingest: IngestStats,
}

pub struct Pipeline {
    config: Config,
    store: Arc<dyn ChunkStore>,
    monitor: Arc<dyn PoolMonitor>,
}

impl Pipeline {
    pub fn new(config: Config, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            config,
            store,
            monitor: Arc::new(TracingMonitor),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn PoolMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Chunk every eligible file under `root`
    pub async fn run_local(&self, root: &Path, spec: JobSpec) -> Result<PipelineReport> {
        let files = scan_directory(root, &self.config.core);
        info!(root = %root.display(), files = files.len(), "scanned repository");
        self.run(Arc::new(FsFetcher::new(root)), spec, files).await
    }

    pub async fn run(
        &self,
        fetcher: Arc<dyn FileFetcher>,
        spec: JobSpec,
        files: Vec<FileRef>,
    ) -> Result<PipelineReport> {
        if files.is_empty() {
            info!(repo_id = %spec.repo_id, "no files to process");
            return Ok(PipelineReport {
                job: JobReport::empty(UNSUBMITTED_JOB),
                ingest: IngestStats::default(),
            });
        }

        let (chunks_tx, chunks_rx) = mpsc::channel(INGEST_QUEUE_DEPTH);
        let ingestor = Ingestor::new(&self.config.dedup, Arc::clone(&self.store));
        let ingest = tokio::spawn(ingestor.run(chunks_rx));

        let pool = WorkerPool::spawn(&self.config, fetcher, chunks_tx, Arc::clone(&self.monitor))
            .context("failed to start worker pool")?;
        let outcome = match pool.submit(spec, files).await {
            Ok(ticket) => ticket.wait().await,
            Err(e) => Err(e),
        };
        // stopping the pool drops the workers' senders, which ends ingest
        pool.shutdown().await.context("failed to stop worker pool")?;
        let job = outcome.context("job did not run")?;
        let ingest = ingest.await.context("ingest task failed")?;

        info!(
            job_id = %job.job_id,
            status = %job.status,
            stored = ingest.stored,
            "pipeline finished"
        );
        Ok(PipelineReport { job, ingest })
    }
}
