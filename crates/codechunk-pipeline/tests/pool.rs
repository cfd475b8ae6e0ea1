//! Worker pool behaviour under a paused clock

use async_trait::async_trait;
use codechunk_config::Config;
use codechunk_pipeline::messages::UnitOutcome;
use codechunk_pipeline::{
    ChunkBatch, FetchError, FileFetcher, FileRef, JobSpec, JobStatus, PoolMonitor, UnitId,
    WorkerId, WorkerPool, WorkerPoolHandle, WorkerStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Clone, Copy)]
enum Behavior {
    Ok,
    /// Rate limited on the first request only
    LimitedOnce(Duration),
    /// Rate limited on every request
    AlwaysLimited(Duration),
    Hang,
    Panic,
}

#[derive(Default)]
struct ScriptedFetcher {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    fn with(mut self, path: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(path.to_string(), behavior);
        self
    }
}

#[async_trait]
impl FileFetcher for ScriptedFetcher {
    async fn fetch(&self, file: &FileRef) -> Result<String, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(file.path.clone()).or_default();
            *n += 1;
            *n
        };
        match self.behaviors.get(&file.path).copied().unwrap_or(Behavior::Ok) {
            Behavior::Ok => {}
            Behavior::LimitedOnce(retry_after) if call == 1 => {
                return Err(FetchError::RateLimited {
                    retry_after: Some(retry_after),
                })
            }
            Behavior::LimitedOnce(_) => {}
            Behavior::AlwaysLimited(retry_after) => {
                return Err(FetchError::RateLimited {
                    retry_after: Some(retry_after),
                })
            }
            Behavior::Hang => tokio::time::sleep(Duration::from_secs(600)).await,
            Behavior::Panic => panic!("fetcher exploded"),
        }
        Ok(format!("pub fn {}() -> u32 {{\n    42\n}}\n", file.path.replace(['/', '.'], "_")))
    }
}

#[derive(Default)]
struct RecordingMonitor {
    rate_limits: Mutex<Vec<(WorkerId, Instant)>>,
    finished: Mutex<Vec<UnitId>>,
    exits: Mutex<Vec<WorkerId>>,
}

impl PoolMonitor for RecordingMonitor {
    fn on_rate_limit(&self, worker: WorkerId, _unit: UnitId, _retry_after: Duration) {
        self.rate_limits.lock().unwrap().push((worker, Instant::now()));
    }

    fn on_unit_finished(&self, unit: UnitId, _outcome: &UnitOutcome) {
        self.finished.lock().unwrap().push(unit);
    }

    fn on_worker_exit(&self, worker: WorkerId, _reason: &str) {
        self.exits.lock().unwrap().push(worker);
    }
}

fn config(workers: usize) -> Config {
    let mut config = Config::default();
    config.pool.max_workers = workers;
    config.pool.tick_interval_ms = 100;
    config
}

struct Harness {
    pool: WorkerPoolHandle,
    monitor: Arc<RecordingMonitor>,
    batches: mpsc::Receiver<ChunkBatch>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start(config: &Config, fetcher: ScriptedFetcher) -> Harness {
    init_tracing();
    let (tx, rx) = mpsc::channel(64);
    let monitor = Arc::new(RecordingMonitor::default());
    let pool = WorkerPool::spawn(config, Arc::new(fetcher), tx, monitor.clone()).unwrap();
    Harness {
        pool,
        monitor,
        batches: rx,
    }
}

fn files(paths: &[&str]) -> Vec<FileRef> {
    paths.iter().map(|p| FileRef::new(*p, 64)).collect()
}

async fn worker_status(pool: &WorkerPoolHandle, id: usize) -> Option<WorkerStatus> {
    pool.workers()
        .await
        .unwrap()
        .into_iter()
        .find(|w| w.id == WorkerId(id))
        .map(|w| w.status)
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_worker_pauses_while_others_work() {
    let fetcher = ScriptedFetcher::default()
        .with("src/limited.rs", Behavior::LimitedOnce(Duration::from_secs(5)));
    let harness = start(&config(2), fetcher);
    let pool = &harness.pool;
    let started = Instant::now();

    let limited = pool
        .submit(JobSpec::new("acme/api"), files(&["src/limited.rs"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(worker_status(pool, 0).await, Some(WorkerStatus::RateLimited));

    // worker 1 keeps accepting assignments meanwhile
    let other = pool
        .submit(JobSpec::new("acme/web"), files(&["src/other.rs"]))
        .await
        .unwrap();
    let other = other.wait().await.unwrap();
    assert_eq!(other.status, JobStatus::Success);
    assert_eq!(other.results[0].worker, WorkerId(1));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(worker_status(pool, 0).await, Some(WorkerStatus::RateLimited));

    let limited = limited.wait().await.unwrap();
    assert_eq!(limited.status, JobStatus::Success);
    while worker_status(pool, 0).await != Some(WorkerStatus::Idle) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(started.elapsed() >= Duration::from_secs(5));

    let rate_limits = harness.monitor.rate_limits.lock().unwrap().clone();
    assert_eq!(rate_limits.len(), 1);
    assert_eq!(rate_limits[0].0, WorkerId(0));
}

#[tokio::test(start_paused = true)]
async fn test_unit_timeout_fails_without_retry() {
    let mut config = config(1);
    config.pool.min_unit_timeout_ms = 1_000;
    config.pool.timeout_multiplier = 1.0;
    let harness = start(&config, ScriptedFetcher::default().with("src/slow.rs", Behavior::Hang));
    let pool = &harness.pool;
    let started = Instant::now();

    let ticket = pool
        .submit(JobSpec::new("acme/api"), files(&["src/slow.rs"]))
        .await
        .unwrap();
    let report = ticket.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.failed_units, 1);
    assert_eq!(report.failures[0].1, "timed out after 1s");
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(600));

    // the cancelled worker is reusable
    while worker_status(pool, 0).await != Some(WorkerStatus::Idle) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let next = pool
        .submit(JobSpec::new("acme/api"), files(&["src/fast.rs"]))
        .await
        .unwrap();
    assert_eq!(next.wait().await.unwrap().status, JobStatus::Success);
    let workers = pool.workers().await.unwrap();
    assert_eq!(workers[0].errors, 1);
    assert_eq!(workers[0].completed_units, 1);
}

#[tokio::test(start_paused = true)]
async fn test_endless_rate_limit_still_times_out() {
    let paths = ["src/a.rs", "src/b.rs", "src/c.rs", "src/d.rs", "src/e.rs"];
    let fetcher = paths.iter().fold(ScriptedFetcher::default(), |f, p| {
        f.with(p, Behavior::AlwaysLimited(Duration::from_secs(10)))
    });
    let harness = start(&config(1), fetcher);
    let pool = &harness.pool;
    let started = Instant::now();

    let ticket = pool
        .submit(JobSpec::new("acme/api"), files(&paths))
        .await
        .unwrap();
    let report = tokio::time::timeout(Duration::from_secs(3600), ticket.wait())
        .await
        .expect("job resolves")
        .unwrap();

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.failures[0].1, "timed out after 30s");
    // one 30s timeout plus at most 30s of granted pauses
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(70));
    assert!(harness.monitor.rate_limits.lock().unwrap().len() >= 5);
}

#[tokio::test(start_paused = true)]
async fn test_worker_panic_is_contained() {
    let harness = start(&config(2), ScriptedFetcher::default().with("boom.rs", Behavior::Panic));
    let pool = &harness.pool;

    let ticket = pool
        .submit(JobSpec::new("acme/api"), files(&["boom.rs", "ok.rs"]))
        .await
        .unwrap();
    assert_eq!(ticket.units, 2);
    let report = ticket.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Partial);
    assert_eq!(report.completed_units, 1);
    assert!(report.failures[0].1.ends_with("exited"));

    let status = pool.status().await.unwrap();
    assert_eq!(status.workers.total, 1);
    assert_eq!(harness.monitor.exits.lock().unwrap().len(), 1);

    let next = pool
        .submit(JobSpec::new("acme/api"), files(&["again.rs"]))
        .await
        .unwrap();
    assert_eq!(next.wait().await.unwrap().status, JobStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_workers_throttle_on_shared_budget() {
    let mut config = config(1);
    config.pool.file_batch_size = 1;
    config.rate_limit.max_requests_per_window = 4;
    config.rate_limit.window_secs = 10;
    config.rate_limit.throttle_ratio = 0.5;
    let mut harness = start(&config, ScriptedFetcher::default());
    let started = Instant::now();

    let paths: Vec<String> = (0..6).map(|i| format!("src/f{i}.rs")).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let ticket = harness
        .pool
        .submit(JobSpec::new("acme/api"), files(&refs))
        .await
        .unwrap();
    let report = ticket.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.files_processed, 6);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(!harness.monitor.rate_limits.lock().unwrap().is_empty());

    let mut chunks = 0;
    while let Ok(batch) = harness.batches.try_recv() {
        assert_eq!(batch.namespace, "acme/api");
        chunks += batch.chunks.len();
    }
    assert_eq!(chunks, report.chunks_produced);
}

#[tokio::test(start_paused = true)]
async fn test_progress_and_shutdown() {
    let harness = start(&config(1), ScriptedFetcher::default().with("src/slow.rs", Behavior::Hang));
    let pool = &harness.pool;

    let ticket = pool
        .submit(JobSpec::new("acme/api"), files(&["src/slow.rs"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let progress = pool.progress(ticket.job_id).await.unwrap();
    assert_eq!(progress.total, 1);
    assert_eq!(progress.active_workers, 1);
    assert_eq!(progress.percentage, 0.0);

    pool.shutdown().await.unwrap();
    let report = ticket.wait().await.unwrap();
    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.failures[0].1, "cancelled");
    assert!(pool.status().await.is_err());
}
