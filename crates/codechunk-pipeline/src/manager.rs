//! Worker pool manager.
//!
//! [`PoolState`] holds every piece of mutable pool state (worker registry,
//! jobs, queue, in-flight units, request budget) and is driven with an
//! explicit clock so it can be tested without a runtime. [`WorkerPool`]
//! spawns the workers and one actor task that owns the state; callers talk
//! to it through a cloneable [`WorkerPoolHandle`].

use crate::error::{PoolError, WorkUnitError};
use crate::ingest::ChunkBatch;
use crate::loader::FileRef;
use crate::messages::{
    Assignment, JobSpec, UnitOutcome, UnitResult, WorkerCommand, WorkerEvent, WorkerId,
};
use crate::planner::{plan, JobId, UnitId, WorkUnit};
use crate::rate_limit::{BudgetSnapshot, RateLimitBudget};
use crate::report::{
    JobCounts, JobProgress, JobReport, JobStatus, PoolStatus, QueueCounts, UnitReport, WorkerCounts,
};
use crate::traits::{FileFetcher, PoolMonitor};
use crate::worker::Worker;
use codechunk_config::{Config, PoolConfig};
use codechunk_core::SplitterRouter;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Working,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub unit: Option<UnitId>,
    pub completed_units: u32,
    pub errors: u32,
    pub rate_limit_events: u32,
}

#[derive(Debug)]
struct WorkerEntry {
    status: WorkerStatus,
    unit: Option<UnitId>,
    rate_limited_until: Option<Instant>,
    completed_units: u32,
    errors: u32,
    rate_limit_events: u32,
}

impl WorkerEntry {
    fn new() -> Self {
        Self {
            status: WorkerStatus::Idle,
            unit: None,
            rate_limited_until: None,
            completed_units: 0,
            errors: 0,
            rate_limit_events: 0,
        }
    }

    /// The worker stopped working on `unit`
    fn release(&mut self, unit: UnitId) {
        if self.unit != Some(unit) {
            return;
        }
        self.unit = None;
        if self.status == WorkerStatus::Working {
            self.status = WorkerStatus::Idle;
        }
    }
}

#[derive(Debug)]
struct InFlight {
    worker: WorkerId,
    deadline: Instant,
    timeout: Duration,
    /// End of the latest reported pause
    paused_until: Option<Instant>,
    /// Deadline extension granted so far, at most `timeout`
    extended: Duration,
}

impl InFlight {
    /// Push the deadline back by the part of a pause not already covered
    /// by an earlier one, never by more than `timeout` in total
    fn pause(&mut self, now: Instant, retry_after: Duration) {
        let until = now + retry_after;
        let from = self.paused_until.map_or(now, |p| p.max(now));
        let fresh = until.saturating_duration_since(from);
        let granted = fresh.min(self.timeout.saturating_sub(self.extended));
        self.deadline += granted;
        self.extended += granted;
        self.paused_until = Some(self.paused_until.map_or(until, |p| p.max(until)));
    }
}

#[derive(Debug)]
struct Job {
    total_units: usize,
    completed_units: usize,
    failed_units: usize,
    files_processed: usize,
    chunks_produced: usize,
    failures: Vec<(UnitId, String)>,
    results: Vec<UnitReport>,
    started: Instant,
    status: Option<JobStatus>,
}

impl Job {
    fn resolved(&self) -> usize {
        self.completed_units + self.failed_units
    }
}

/// A unit handed to a worker by [`PoolState::dispatch`]
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub worker: WorkerId,
    pub unit: WorkUnit,
    pub job: Arc<JobSpec>,
}

pub struct PoolState {
    pool: PoolConfig,
    workers: BTreeMap<WorkerId, WorkerEntry>,
    /// Units waiting for an idle worker, in dispatch order
    queue: VecDeque<(Arc<JobSpec>, WorkUnit)>,
    in_flight: HashMap<UnitId, InFlight>,
    jobs: BTreeMap<JobId, Job>,
    budget: RateLimitBudget,
    next_job: u64,
    resolved: Vec<(UnitId, UnitOutcome)>,
    finished: Vec<JobReport>,
}

impl PoolState {
    pub fn new(config: &Config, workers: usize, now: Instant) -> Self {
        Self {
            pool: config.pool.clone(),
            workers: (0..workers).map(|i| (WorkerId(i), WorkerEntry::new())).collect(),
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
            jobs: BTreeMap::new(),
            budget: RateLimitBudget::new(&config.rate_limit, now),
            next_job: 1,
            resolved: Vec::new(),
            finished: Vec::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Plan `files` into units and queue them behind earlier jobs
    pub fn submit(
        &mut self,
        spec: JobSpec,
        files: Vec<FileRef>,
        now: Instant,
    ) -> Result<(JobId, usize), PoolError> {
        if self.workers.is_empty() {
            return Err(PoolError::NoWorkers);
        }
        if files.is_empty() {
            return Err(PoolError::EmptyJob);
        }
        let job_id = JobId(self.next_job);
        self.next_job += 1;

        let units = plan(files, job_id, self.workers.len(), &self.pool);
        let spec = Arc::new(spec);
        info!(
            job_id = %job_id,
            repo_id = %spec.repo_id,
            units = units.len(),
            files = units.iter().map(|u| u.files.len()).sum::<usize>(),
            "job submitted"
        );
        self.jobs.insert(
            job_id,
            Job {
                total_units: units.len(),
                completed_units: 0,
                failed_units: 0,
                files_processed: 0,
                chunks_produced: 0,
                failures: Vec::new(),
                results: Vec::new(),
                started: now,
                status: None,
            },
        );
        let count = units.len();
        self.queue
            .extend(units.into_iter().map(|unit| (Arc::clone(&spec), unit)));
        Ok((job_id, count))
    }

    /// Assign queued units to idle workers, lowest worker id first
    pub fn dispatch(&mut self, now: Instant) -> Vec<Dispatch> {
        let mut out = Vec::new();
        for (&id, entry) in self.workers.iter_mut() {
            if entry.status != WorkerStatus::Idle || entry.unit.is_some() {
                continue;
            }
            let Some((job, unit)) = self.queue.pop_front() else {
                break;
            };
            let timeout = unit.timeout(&self.pool);
            self.in_flight.insert(
                unit.id,
                InFlight {
                    worker: id,
                    deadline: now + timeout,
                    timeout,
                    paused_until: None,
                    extended: Duration::ZERO,
                },
            );
            entry.status = WorkerStatus::Working;
            entry.unit = Some(unit.id);
            out.push(Dispatch { worker: id, unit, job });
        }
        out
    }

    /// Apply a worker event; true when the request budget changed
    pub fn handle_event(&mut self, event: WorkerEvent, now: Instant) -> bool {
        match event {
            WorkerEvent::Completed { worker, unit, result } => {
                if let Some(entry) = self.workers.get_mut(&worker) {
                    entry.release(unit);
                }
                if self.in_flight.remove(&unit).is_some() {
                    self.complete_unit(unit, worker, result, now);
                } else {
                    debug!(unit_id = %unit, worker_id = %worker, "ignoring late completion");
                }
                false
            }
            WorkerEvent::Failed { worker, unit, error } => {
                if let Some(entry) = self.workers.get_mut(&worker) {
                    entry.release(unit);
                }
                if self.in_flight.remove(&unit).is_some() {
                    self.fail_unit(unit, Some(worker), error, now);
                } else {
                    debug!(unit_id = %unit, worker_id = %worker, error = %error, "ignoring late failure");
                }
                false
            }
            WorkerEvent::Progress { requests, .. } => {
                if requests == 0 {
                    return false;
                }
                self.budget.record(requests, now);
                true
            }
            WorkerEvent::RateLimit {
                worker,
                unit,
                retry_after,
            } => {
                let until = now + retry_after;
                if let Some(entry) = self.workers.get_mut(&worker) {
                    entry.status = WorkerStatus::RateLimited;
                    entry.rate_limited_until = Some(entry.rate_limited_until.map_or(until, |u| u.max(until)));
                    entry.rate_limit_events += 1;
                }
                // pausing is flow control, not lost time, up to one extra timeout
                if let Some(flight) = self.in_flight.get_mut(&unit).filter(|f| f.worker == worker) {
                    flight.pause(now, retry_after);
                }
                false
            }
        }
    }

    /// Remove an exited worker; fails its unit, and every queued unit once
    /// no worker is left
    pub fn worker_exited(&mut self, worker: WorkerId, now: Instant) -> bool {
        let Some(entry) = self.workers.remove(&worker) else {
            return false;
        };
        if let Some(unit) = entry.unit {
            if self.in_flight.remove(&unit).is_some() {
                self.fail_unit(unit, None, WorkUnitError::WorkerExited(worker.0), now);
            }
        }
        if self.workers.is_empty() {
            for (_, unit) in std::mem::take(&mut self.queue) {
                self.fail_unit(unit.id, None, WorkUnitError::NoWorkers, now);
            }
        }
        true
    }

    /// Expire timed-out units, re-enable rate-limited workers whose deadline
    /// passed and roll the budget window; true when the budget was reset
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut expired: Vec<(UnitId, Duration)> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, f)| (*id, f.timeout))
            .collect();
        expired.sort();
        for (unit, timeout) in expired {
            if let Some(flight) = self.in_flight.remove(&unit) {
                warn!(unit_id = %unit, worker_id = %flight.worker, timeout_ms = timeout.as_millis() as u64, "work unit timed out");
                self.fail_unit(unit, Some(flight.worker), WorkUnitError::Timeout(timeout), now);
            }
        }

        for (id, entry) in self.workers.iter_mut() {
            if entry.status != WorkerStatus::RateLimited {
                continue;
            }
            if entry.rate_limited_until.is_some_and(|until| until <= now) {
                entry.rate_limited_until = None;
                entry.status = if entry.unit.is_some() {
                    WorkerStatus::Working
                } else {
                    WorkerStatus::Idle
                };
                debug!(worker_id = %id, "worker rate limit lifted");
            }
        }

        self.budget.maybe_reset(now)
    }

    /// Fail every queued and in-flight unit
    pub fn shutdown(&mut self, now: Instant) {
        for (_, unit) in std::mem::take(&mut self.queue) {
            self.fail_unit(unit.id, None, WorkUnitError::Cancelled, now);
        }
        let mut in_flight: Vec<(UnitId, WorkerId)> =
            self.in_flight.drain().map(|(id, f)| (id, f.worker)).collect();
        in_flight.sort();
        for (unit, worker) in in_flight {
            self.fail_unit(unit, Some(worker), WorkUnitError::Cancelled, now);
        }
    }

    pub fn progress(&self, job_id: JobId) -> Option<JobProgress> {
        let job = self.jobs.get(&job_id)?;
        let percentage = if job.total_units == 0 {
            100.0
        } else {
            job.resolved() as f32 * 100.0 / job.total_units as f32
        };
        Some(JobProgress {
            completed: job.completed_units,
            failed: job.failed_units,
            total: job.total_units,
            percentage,
            active_workers: self
                .workers
                .values()
                .filter(|w| w.unit.is_some_and(|u| u.job == job_id))
                .count(),
            queue_depth: self.queue.iter().filter(|(_, u)| u.id.job == job_id).count(),
        })
    }

    pub fn status(&self) -> PoolStatus {
        let mut workers = WorkerCounts {
            total: self.workers.len(),
            ..Default::default()
        };
        for entry in self.workers.values() {
            match entry.status {
                WorkerStatus::Idle => workers.idle += 1,
                WorkerStatus::Working => workers.active += 1,
                WorkerStatus::RateLimited => workers.rate_limited += 1,
            }
        }
        let mut jobs = JobCounts::default();
        for job in self.jobs.values() {
            match job.status {
                None => jobs.active += 1,
                Some(JobStatus::Failed) => jobs.failed += 1,
                Some(_) => jobs.completed += 1,
            }
        }
        PoolStatus {
            workers,
            jobs,
            queue: QueueCounts {
                pending: self.queue.len(),
            },
        }
    }

    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .iter()
            .map(|(id, w)| WorkerSnapshot {
                id: *id,
                status: w.status,
                unit: w.unit,
                completed_units: w.completed_units,
                errors: w.errors,
                rate_limit_events: w.rate_limit_events,
            })
            .collect()
    }

    pub fn worker_status(&self, worker: WorkerId) -> Option<WorkerStatus> {
        self.workers.get(&worker).map(|w| w.status)
    }

    pub fn budget(&self) -> BudgetSnapshot {
        self.budget.snapshot()
    }

    /// Units resolved since the last call
    pub fn take_resolved(&mut self) -> Vec<(UnitId, UnitOutcome)> {
        std::mem::take(&mut self.resolved)
    }

    /// Reports of jobs finished since the last call
    pub fn take_finished(&mut self) -> Vec<JobReport> {
        std::mem::take(&mut self.finished)
    }

    fn complete_unit(&mut self, unit: UnitId, worker: WorkerId, result: UnitResult, now: Instant) {
        if let Some(entry) = self.workers.get_mut(&worker) {
            entry.completed_units += 1;
        }
        if let Some(job) = self.jobs.get_mut(&unit.job) {
            job.completed_units += 1;
            job.files_processed += result.files_processed;
            job.chunks_produced += result.chunks_produced;
            job.results.push(UnitReport { unit, worker, result });
        }
        self.resolved.push((unit, UnitOutcome::Completed(result)));
        self.finish_if_done(unit.job, now);
    }

    fn fail_unit(&mut self, unit: UnitId, worker: Option<WorkerId>, error: WorkUnitError, now: Instant) {
        if let Some(entry) = worker.and_then(|w| self.workers.get_mut(&w)) {
            entry.errors += 1;
        }
        if let Some(job) = self.jobs.get_mut(&unit.job) {
            job.failed_units += 1;
            job.failures.push((unit, error.to_string()));
        }
        self.resolved.push((unit, UnitOutcome::Failed(error)));
        self.finish_if_done(unit.job, now);
    }

    fn finish_if_done(&mut self, job_id: JobId, now: Instant) {
        let Some(job) = self.jobs.get_mut(&job_id) else {
            return;
        };
        if job.status.is_some() || job.resolved() < job.total_units {
            return;
        }
        let status = JobStatus::from_counts(job.completed_units, job.failed_units);
        job.status = Some(status);
        self.finished.push(JobReport {
            job_id,
            status,
            total_units: job.total_units,
            completed_units: job.completed_units,
            failed_units: job.failed_units,
            files_processed: job.files_processed,
            chunks_produced: job.chunks_produced,
            failures: std::mem::take(&mut job.failures),
            results: std::mem::take(&mut job.results),
            elapsed_ms: now.saturating_duration_since(job.started).as_millis() as u64,
        });
    }
}

enum PoolCommand {
    Submit {
        spec: JobSpec,
        files: Vec<FileRef>,
        reply: oneshot::Sender<Result<JobTicket, PoolError>>,
    },
    Progress {
        job: JobId,
        reply: oneshot::Sender<Option<JobProgress>>,
    },
    Status {
        reply: oneshot::Sender<PoolStatus>,
    },
    Workers {
        reply: oneshot::Sender<Vec<WorkerSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A submitted job; resolves to its report once every unit is resolved
#[derive(Debug)]
pub struct JobTicket {
    pub job_id: JobId,
    pub units: usize,
    report: oneshot::Receiver<JobReport>,
}

impl JobTicket {
    pub async fn wait(self) -> Result<JobReport, PoolError> {
        self.report.await.map_err(|_| PoolError::ShutDown)
    }
}

#[derive(Clone)]
pub struct WorkerPoolHandle {
    commands: mpsc::Sender<PoolCommand>,
    workers: usize,
}

impl WorkerPoolHandle {
    /// Workers spawned at startup
    pub fn size(&self) -> usize {
        self.workers
    }

    pub async fn submit(&self, spec: JobSpec, files: Vec<FileRef>) -> Result<JobTicket, PoolError> {
        self.request(|reply| PoolCommand::Submit { spec, files, reply })
            .await?
    }

    pub async fn progress(&self, job: JobId) -> Result<JobProgress, PoolError> {
        self.request(|reply| PoolCommand::Progress { job, reply })
            .await?
            .ok_or_else(|| PoolError::UnknownJob(job.to_string()))
    }

    pub async fn status(&self) -> Result<PoolStatus, PoolError> {
        self.request(|reply| PoolCommand::Status { reply }).await
    }

    pub async fn workers(&self) -> Result<Vec<WorkerSnapshot>, PoolError> {
        self.request(|reply| PoolCommand::Workers { reply }).await
    }

    /// Cancel outstanding units, resolve pending tickets and stop the workers
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        self.request(|reply| PoolCommand::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> PoolCommand,
    ) -> Result<T, PoolError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PoolError::ShutDown)?;
        response.await.map_err(|_| PoolError::ShutDown)
    }
}

pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `config.pool.effective_workers()` workers and the manager task.
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        config: &Config,
        fetcher: Arc<dyn FileFetcher>,
        chunks: mpsc::Sender<ChunkBatch>,
        monitor: Arc<dyn PoolMonitor>,
    ) -> Result<WorkerPoolHandle, PoolError> {
        let size = config.pool.effective_workers();
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let state = PoolState::new(config, size, Instant::now());
        let (budget_tx, budget_rx) = watch::channel(state.budget());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(64);
        let router = Arc::new(SplitterRouter::new(config));

        let mut senders = HashMap::with_capacity(size);
        for i in 0..size {
            let id = WorkerId(i);
            let (tx, rx) = mpsc::channel(1);
            let worker = Worker::new(
                id,
                config,
                Arc::clone(&fetcher),
                Arc::clone(&router),
                budget_rx.clone(),
                event_tx.clone(),
                chunks.clone(),
            );
            supervise(id, tokio::spawn(worker.run(rx)), exit_tx.clone());
            senders.insert(id, tx);
        }
        info!(workers = size, "worker pool started");

        let manager = Manager {
            state,
            senders,
            tokens: HashMap::new(),
            tickets: HashMap::new(),
            budget: budget_tx,
            monitor,
            tick: Duration::from_millis(config.pool.tick_interval_ms.max(1)),
        };
        tokio::spawn(manager.run(command_rx, event_rx, exit_rx));

        Ok(WorkerPoolHandle {
            commands: command_tx,
            workers: size,
        })
    }
}

/// Forward the worker task's exit (including panics) to the manager
fn supervise(
    id: WorkerId,
    handle: tokio::task::JoinHandle<()>,
    exits: mpsc::UnboundedSender<(WorkerId, String)>,
) {
    tokio::spawn(async move {
        let reason = match handle.await {
            Ok(()) => "stopped".to_string(),
            Err(e) if e.is_panic() => "panicked".to_string(),
            Err(e) => e.to_string(),
        };
        let _ = exits.send((id, reason));
    });
}

struct Manager {
    state: PoolState,
    senders: HashMap<WorkerId, mpsc::Sender<WorkerCommand>>,
    tokens: HashMap<UnitId, CancellationToken>,
    tickets: HashMap<JobId, oneshot::Sender<JobReport>>,
    budget: watch::Sender<BudgetSnapshot>,
    monitor: Arc<dyn PoolMonitor>,
    tick: Duration,
}

impl Manager {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<PoolCommand>,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
        mut exits: mpsc::UnboundedReceiver<(WorkerId, String)>,
    ) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PoolCommand::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.event(event),
                Some((worker, reason)) = exits.recv() => self.exit(worker, &reason),
                _ = ticker.tick() => self.tick(),
            }
            self.dispatch();
            self.settle();
        }
        info!("worker pool stopped");
    }

    fn command(&mut self, command: PoolCommand) {
        match command {
            PoolCommand::Submit { spec, files, reply } => {
                let ticket = self
                    .state
                    .submit(spec, files, Instant::now())
                    .map(|(job_id, units)| {
                        let (tx, rx) = oneshot::channel();
                        self.tickets.insert(job_id, tx);
                        JobTicket {
                            job_id,
                            units,
                            report: rx,
                        }
                    });
                let _ = reply.send(ticket);
            }
            PoolCommand::Progress { job, reply } => {
                let _ = reply.send(self.state.progress(job));
            }
            PoolCommand::Status { reply } => {
                let _ = reply.send(self.state.status());
            }
            PoolCommand::Workers { reply } => {
                let _ = reply.send(self.state.workers());
            }
            PoolCommand::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    fn event(&mut self, event: WorkerEvent) {
        if let WorkerEvent::RateLimit {
            worker,
            unit,
            retry_after,
        } = &event
        {
            self.monitor.on_rate_limit(*worker, *unit, *retry_after);
        }
        if self.state.handle_event(event, Instant::now()) {
            self.publish();
        }
    }

    fn exit(&mut self, worker: WorkerId, reason: &str) {
        self.senders.remove(&worker);
        if self.state.worker_exited(worker, Instant::now()) {
            self.monitor.on_worker_exit(worker, reason);
            if self.state.worker_count() == 0 {
                error!("every worker has exited");
            }
        }
    }

    fn tick(&mut self) {
        if self.state.tick(Instant::now()) {
            self.publish();
        }
    }

    fn dispatch(&mut self) {
        for Dispatch { worker, unit, job } in self.state.dispatch(Instant::now()) {
            let unit_id = unit.id;
            let cancel = CancellationToken::new();
            let assignment = Assignment {
                unit,
                job,
                cancel: cancel.clone(),
            };
            let sent = self
                .senders
                .get(&worker)
                .is_some_and(|tx| tx.try_send(WorkerCommand::Assign(assignment)).is_ok());
            if sent {
                debug!(worker_id = %worker, unit_id = %unit_id, "unit dispatched");
                self.tokens.insert(unit_id, cancel);
            } else {
                self.exit(worker, "command channel closed");
            }
        }
    }

    /// Cancel resolved units' tokens and deliver finished reports
    fn settle(&mut self) {
        for (unit, outcome) in self.state.take_resolved() {
            if let Some(token) = self.tokens.remove(&unit) {
                token.cancel();
            }
            self.monitor.on_unit_finished(unit, &outcome);
        }
        for report in self.state.take_finished() {
            info!(
                job_id = %report.job_id,
                status = %report.status,
                completed = report.completed_units,
                failed = report.failed_units,
                chunks = report.chunks_produced,
                elapsed_ms = report.elapsed_ms,
                "job finished"
            );
            if let Some(ticket) = self.tickets.remove(&report.job_id) {
                let _ = ticket.send(report);
            }
        }
    }

    fn shutdown(&mut self) {
        self.state.shutdown(Instant::now());
        self.settle();
        self.senders.clear();
    }

    fn publish(&self) {
        self.budget.send_replace(self.state.budget());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.rate_limit.max_requests_per_window = 10;
        config.rate_limit.window_secs = 60;
        config
    }

    fn files(n: usize) -> Vec<FileRef> {
        (0..n).map(|i| FileRef::new(format!("src/file{i}.rs"), 100)).collect()
    }

    fn state(workers: usize, now: Instant) -> PoolState {
        PoolState::new(&config(), workers, now)
    }

    fn completed(worker: usize, unit: UnitId) -> WorkerEvent {
        WorkerEvent::Completed {
            worker: WorkerId(worker),
            unit,
            result: UnitResult {
                files_processed: 1,
                files_skipped: 0,
                chunks_produced: 3,
            },
        }
    }

    #[test]
    fn test_dispatch_fills_idle_workers_and_queues_rest() {
        let now = Instant::now();
        let mut pool = state(2, now);
        let (job, units) = pool.submit(JobSpec::new("acme/api"), files(6), now).unwrap();
        assert_eq!(units, 2);

        let other = pool.submit(JobSpec::new("acme/web"), files(2), now).unwrap().0;
        let dispatched = pool.dispatch(now);
        assert_eq!(dispatched.len(), 2);
        assert!(dispatched.iter().all(|d| d.unit.id.job == job));

        let status = pool.status();
        assert_eq!(status.workers.active, 2);
        assert_eq!(status.queue.pending, 2);
        assert_eq!(pool.progress(other).unwrap().queue_depth, 2);
        assert!(pool.dispatch(now).is_empty());
    }

    #[test]
    fn test_completion_produces_success_report() {
        let now = Instant::now();
        let mut pool = state(2, now);
        let (job, _) = pool.submit(JobSpec::new("acme/api"), files(4), now).unwrap();
        let dispatched = pool.dispatch(now);

        for d in &dispatched {
            pool.handle_event(completed(d.worker.0, d.unit.id), now + Duration::from_secs(1));
        }
        let reports = pool.take_finished();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.job_id, job);
        assert_eq!(report.status, JobStatus::Success);
        assert_eq!(report.completed_units, 2);
        assert_eq!(report.chunks_produced, 6);
        assert_eq!(report.elapsed_ms, 1000);
        assert_eq!(pool.status().workers.idle, 2);
        assert_eq!(pool.status().jobs.completed, 1);
        assert_eq!(pool.progress(job).unwrap().percentage, 100.0);
    }

    #[test]
    fn test_rate_limited_worker_waits_for_retry_after() {
        let start = Instant::now();
        let mut pool = state(2, start);
        pool.submit(JobSpec::new("acme/api"), files(1), start).unwrap();
        let first = pool.dispatch(start).remove(0);
        assert_eq!(first.worker, WorkerId(0));

        pool.handle_event(
            WorkerEvent::RateLimit {
                worker: WorkerId(0),
                unit: first.unit.id,
                retry_after: Duration::from_secs(5),
            },
            start,
        );
        assert_eq!(pool.worker_status(WorkerId(0)), Some(WorkerStatus::RateLimited));

        // the other worker keeps taking work meanwhile
        let later = start + Duration::from_secs(1);
        pool.submit(JobSpec::new("acme/web"), files(1), later).unwrap();
        let second = pool.dispatch(later);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].worker, WorkerId(1));

        pool.handle_event(completed(0, first.unit.id), later);
        pool.tick(start + Duration::from_millis(4999));
        assert_eq!(pool.worker_status(WorkerId(0)), Some(WorkerStatus::RateLimited));

        pool.tick(start + Duration::from_secs(5));
        assert_eq!(pool.worker_status(WorkerId(0)), Some(WorkerStatus::Idle));
    }

    #[test]
    fn test_rate_limit_lifts_back_to_working() {
        let start = Instant::now();
        let mut pool = state(1, start);
        pool.submit(JobSpec::new("acme/api"), files(1), start).unwrap();
        let unit = pool.dispatch(start)[0].unit.id;
        pool.handle_event(
            WorkerEvent::RateLimit {
                worker: WorkerId(0),
                unit,
                retry_after: Duration::from_secs(2),
            },
            start,
        );
        pool.tick(start + Duration::from_secs(2));
        assert_eq!(pool.worker_status(WorkerId(0)), Some(WorkerStatus::Working));
    }

    #[test]
    fn test_rate_limit_extension_is_bounded() {
        let start = Instant::now();
        let mut pool = state(1, start);
        pool.submit(JobSpec::new("acme/api"), files(1), start).unwrap();
        let d = pool.dispatch(start).remove(0);
        let timeout = d.unit.timeout(&config().pool);
        let pause = |pool: &mut PoolState, at: Instant| {
            pool.handle_event(
                WorkerEvent::RateLimit {
                    worker: d.worker,
                    unit: d.unit.id,
                    retry_after: Duration::from_secs(10),
                },
                at,
            );
        };

        // concurrent fetches reporting the same pause extend once
        for _ in 0..5 {
            pause(&mut pool, start);
        }
        pool.tick(start + timeout + Duration::from_secs(9));
        assert!(pool.take_resolved().is_empty());

        // a source that never recovers still times out after one extra timeout
        let mut at = start;
        while at < start + timeout * 3 {
            pause(&mut pool, at);
            at += Duration::from_secs(10);
            pool.tick(at);
        }
        let resolved = pool.take_resolved();
        assert_eq!(
            resolved,
            vec![(d.unit.id, UnitOutcome::Failed(WorkUnitError::Timeout(timeout)))]
        );
    }

    #[test]
    fn test_timeout_fails_unit_and_ignores_late_result() {
        let start = Instant::now();
        let mut pool = state(1, start);
        let (job, _) = pool.submit(JobSpec::new("acme/api"), files(1), start).unwrap();
        let d = pool.dispatch(start).remove(0);
        let timeout = d.unit.timeout(&config().pool);

        pool.tick(start + timeout - Duration::from_millis(1));
        assert!(pool.take_finished().is_empty());

        pool.tick(start + timeout);
        let resolved = pool.take_resolved();
        assert_eq!(
            resolved,
            vec![(d.unit.id, UnitOutcome::Failed(WorkUnitError::Timeout(timeout)))]
        );
        let report = pool.take_finished().remove(0);
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.failed_units, 1);
        assert!(report.failures[0].1.starts_with("timed out"));

        // the worker stays busy until it reports back
        assert_eq!(pool.worker_status(WorkerId(0)), Some(WorkerStatus::Working));
        pool.handle_event(completed(0, d.unit.id), start + timeout);
        assert!(pool.take_resolved().is_empty());
        assert_eq!(pool.progress(job).unwrap().completed, 0);
        assert_eq!(pool.worker_status(WorkerId(0)), Some(WorkerStatus::Idle));
        assert_eq!(pool.workers()[0].errors, 1);
    }

    #[test]
    fn test_partial_report_on_failure() {
        let now = Instant::now();
        let mut pool = state(2, now);
        pool.submit(JobSpec::new("acme/api"), files(2), now).unwrap();
        let d = pool.dispatch(now);
        pool.handle_event(completed(d[0].worker.0, d[0].unit.id), now);
        pool.handle_event(
            WorkerEvent::Failed {
                worker: d[1].worker,
                unit: d[1].unit.id,
                error: WorkUnitError::Split("boom".to_string()),
            },
            now,
        );
        let report = pool.take_finished().remove(0);
        assert_eq!(report.status, JobStatus::Partial);
        assert_eq!(report.failures, vec![(d[1].unit.id, "splitting failed: boom".to_string())]);
    }

    #[test]
    fn test_worker_exit_fails_unit_and_pool_continues() {
        let now = Instant::now();
        let mut pool = state(2, now);
        pool.submit(JobSpec::new("acme/api"), files(4), now).unwrap();
        let d = pool.dispatch(now);

        assert!(pool.worker_exited(WorkerId(1), now));
        assert!(!pool.worker_exited(WorkerId(1), now));
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(
            pool.take_resolved(),
            vec![(d[1].unit.id, UnitOutcome::Failed(WorkUnitError::WorkerExited(1)))]
        );

        pool.handle_event(completed(0, d[0].unit.id), now);
        let report = pool.take_finished().remove(0);
        assert_eq!(report.status, JobStatus::Partial);

        pool.submit(JobSpec::new("acme/web"), files(1), now).unwrap();
        assert_eq!(pool.dispatch(now)[0].worker, WorkerId(0));
    }

    #[test]
    fn test_queued_units_fail_when_no_workers_remain() {
        let now = Instant::now();
        let mut pool = state(1, now);
        pool.submit(JobSpec::new("acme/api"), files(1), now).unwrap();
        pool.dispatch(now);
        pool.submit(JobSpec::new("acme/web"), files(1), now).unwrap();

        pool.worker_exited(WorkerId(0), now);
        let reports = pool.take_finished();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status == JobStatus::Failed));
        assert_eq!(reports[1].failures[0].1, "no workers left to run the unit");
        assert!(matches!(
            pool.submit(JobSpec::new("acme/cli"), files(1), now),
            Err(PoolError::NoWorkers)
        ));
    }

    #[test]
    fn test_empty_job_rejected() {
        let now = Instant::now();
        let mut pool = state(1, now);
        assert!(matches!(
            pool.submit(JobSpec::new("acme/api"), Vec::new(), now),
            Err(PoolError::EmptyJob)
        ));
    }

    #[test]
    fn test_budget_records_and_resets_on_tick() {
        let start = Instant::now();
        let mut pool = state(1, start);
        let unit = UnitId { job: JobId(1), index: 0 };
        let progress = WorkerEvent::Progress {
            worker: WorkerId(0),
            unit,
            files_done: 5,
            requests: 9,
        };
        assert!(pool.handle_event(progress, start));
        assert!(pool.budget().should_throttle(0.9));

        assert!(!pool.tick(start + Duration::from_secs(59)));
        assert!(pool.tick(start + Duration::from_secs(61)));
        assert_eq!(pool.budget().requests_in_window, 0);
    }

    #[test]
    fn test_shutdown_cancels_outstanding_units() {
        let now = Instant::now();
        let mut pool = state(1, now);
        pool.submit(JobSpec::new("acme/api"), files(2), now).unwrap();
        pool.dispatch(now);
        pool.submit(JobSpec::new("acme/web"), files(1), now).unwrap();

        pool.shutdown(now);
        let reports = pool.take_finished();
        assert_eq!(reports.len(), 2);
        assert_eq!(pool.status().queue.pending, 0);
        assert!(reports.iter().all(|r| r.failures.iter().all(|(_, e)| e == "cancelled")));
    }
}
