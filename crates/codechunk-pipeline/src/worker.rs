//! A pool worker: fetches, splits and forwards the files of one assigned
//! unit at a time

use crate::error::{FetchError, WorkUnitError};
use crate::ingest::ChunkBatch;
use crate::loader::FileRef;
use crate::messages::{Assignment, JobSpec, UnitResult, WorkerCommand, WorkerEvent, WorkerId};
use crate::planner::UnitId;
use crate::rate_limit::BudgetSnapshot;
use crate::traits::FileFetcher;
use codechunk_config::Config;
use codechunk_core::{Document, DocumentMetadata, SplitterRouter};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

pub struct Worker {
    id: WorkerId,
    fetcher: Arc<dyn FileFetcher>,
    router: Arc<SplitterRouter>,
    batch_size: usize,
    throttle_ratio: f32,
    default_retry_after: Duration,
    budget: watch::Receiver<BudgetSnapshot>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    chunks: mpsc::Sender<ChunkBatch>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        config: &Config,
        fetcher: Arc<dyn FileFetcher>,
        router: Arc<SplitterRouter>,
        budget: watch::Receiver<BudgetSnapshot>,
        events: mpsc::UnboundedSender<WorkerEvent>,
        chunks: mpsc::Sender<ChunkBatch>,
    ) -> Self {
        Self {
            id,
            fetcher,
            router,
            batch_size: config.pool.file_batch_size.max(1),
            throttle_ratio: config.rate_limit.throttle_ratio,
            default_retry_after: config.rate_limit.default_retry_after(),
            budget,
            events,
            chunks,
        }
    }

    /// Run assignments until the manager drops the command channel
    pub async fn run(mut self, mut commands: mpsc::Receiver<WorkerCommand>) {
        debug!(worker_id = %self.id, "worker started");
        while let Some(command) = commands.recv().await {
            match command {
                WorkerCommand::Assign(assignment) => self.handle(assignment).await,
            }
        }
        debug!(worker_id = %self.id, "worker stopped");
    }

    async fn handle(&mut self, assignment: Assignment) {
        let unit = assignment.unit.id;
        let cancel = assignment.cancel.clone();
        debug!(worker_id = %self.id, unit_id = %unit, files = assignment.unit.files.len(), "unit assigned");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(WorkUnitError::Cancelled),
            result = self.process(&assignment) => result,
        };
        let worker = self.id;
        let event = match outcome {
            Ok(result) => WorkerEvent::Completed { worker, unit, result },
            Err(error) => WorkerEvent::Failed { worker, unit, error },
        };
        // a closed channel means the pool is shutting down
        let _ = self.events.send(event);
    }

    async fn process(&mut self, assignment: &Assignment) -> Result<UnitResult, WorkUnitError> {
        let unit = assignment.unit.id;
        let mut result = UnitResult::default();

        for batch in assignment.unit.files.chunks(self.batch_size) {
            self.throttle(unit).await;

            let fetched = join_all(batch.iter().map(|file| self.fetch(unit, file))).await;
            let mut requests = 0;
            let mut documents = Vec::with_capacity(batch.len());
            for (file, outcome) in batch.iter().zip(fetched) {
                let (content, attempts) = outcome?;
                requests += attempts;
                match content.filter(|c| !c.trim().is_empty()) {
                    Some(content) => documents.push(document(&assignment.job, file, content)),
                    None => result.files_skipped += 1,
                }
            }
            result.files_processed += documents.len();

            let router = Arc::clone(&self.router);
            let chunks = tokio::task::spawn_blocking(move || {
                documents.iter().flat_map(|doc| router.route(doc)).collect::<Vec<_>>()
            })
            .await
            .map_err(|e| WorkUnitError::Split(e.to_string()))?;
            result.chunks_produced += chunks.len();

            let _ = self.events.send(WorkerEvent::Progress {
                worker: self.id,
                unit,
                files_done: result.files_processed + result.files_skipped,
                requests,
            });

            if !chunks.is_empty() {
                self.chunks
                    .send(ChunkBatch {
                        job_id: unit.job,
                        unit_id: unit,
                        namespace: assignment.job.namespace.clone(),
                        chunks,
                    })
                    .await
                    .map_err(|_| WorkUnitError::IngestClosed)?;
            }
        }

        Ok(result)
    }

    /// Pause while the shared budget is at or above the throttle ratio
    async fn throttle(&mut self, unit: UnitId) {
        let mut reported = false;
        loop {
            let snapshot = *self.budget.borrow_and_update();
            if !snapshot.should_throttle(self.throttle_ratio) {
                return;
            }
            let wait = snapshot.wait_time(Instant::now());
            if !reported {
                warn!(
                    worker_id = %self.id,
                    unit_id = %unit,
                    usage = snapshot.usage(),
                    wait_ms = wait.as_millis() as u64,
                    "request budget nearly exhausted, pausing"
                );
                let _ = self.events.send(WorkerEvent::RateLimit {
                    worker: self.id,
                    unit,
                    retry_after: wait,
                });
                reported = true;
            }
            if wait.is_zero() {
                // window is over, the manager publishes the reset
                if self.budget.changed().await.is_err() {
                    return;
                }
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = self.budget.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Content of `file` (None when missing) and the number of requests it took
    async fn fetch(&self, unit: UnitId, file: &FileRef) -> Result<(Option<String>, u64), WorkUnitError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.fetcher.fetch(file).await {
                Ok(content) => return Ok((Some(content), attempts)),
                Err(FetchError::NotFound(reason)) => {
                    warn!(worker_id = %self.id, path = %file.path, reason = %reason, "skipping missing file");
                    return Ok((None, attempts));
                }
                Err(FetchError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(self.default_retry_after);
                    warn!(
                        worker_id = %self.id,
                        path = %file.path,
                        retry_after_ms = wait.as_millis() as u64,
                        "source rate limited"
                    );
                    let _ = self.events.send(WorkerEvent::RateLimit {
                        worker: self.id,
                        unit,
                        retry_after: wait,
                    });
                    tokio::time::sleep(wait).await;
                }
                Err(FetchError::Transport(message)) => {
                    return Err(WorkUnitError::Fetch {
                        path: file.path.clone(),
                        message,
                    })
                }
            }
        }
    }
}

fn document(job: &JobSpec, file: &FileRef, content: String) -> Document {
    let metadata = DocumentMetadata {
        source_path: file.path.clone(),
        repo_id: Some(job.repo_id.clone()),
        branch: job.branch.clone(),
        commit_hash: job.commit_hash.clone(),
        file_type: Some(file.file_type.clone()).filter(|t| !t.is_empty()),
        ..Default::default()
    };
    Document::new(file.path.clone(), content).with_metadata(metadata)
}
