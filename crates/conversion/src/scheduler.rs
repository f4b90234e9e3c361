//! Fixed-size worker pool executing conversion jobs.
//!
//! Lifecycle: `new` → `start` → `submit`* → `stop`.
//!
//! ```text
//!  submit(job) ──► unbounded queue ──► worker 0 ─┐
//!                        │       └───► worker 1 ─┼─► spawn_blocking(convert)
//!  stop() ── N x Stop ───┘       └───► worker N ─┘
//! ```
//!
//! Each worker owns a [`WorkerContext`] handed over at spawn time; the queue
//! receiver is shared behind an async mutex. Conversions are CPU-bound and run
//! on the blocking thread pool, so workers execute in parallel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ConversionError, SchedulerError};
use crate::job::ConversionJob;

/// Performs one conversion. Called from the blocking thread pool.
pub trait JobConverter: Send + Sync + 'static {
    fn convert(&self, job: &ConversionJob) -> Result<(), ConversionError>;
}

impl<F> JobConverter for F
where
    F: Fn(&ConversionJob) -> Result<(), ConversionError> + Send + Sync + 'static,
{
    fn convert(&self, job: &ConversionJob) -> Result<(), ConversionError> {
        self(job)
    }
}

/// Counts reported when the pool stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    pub submitted: u64,
    pub converted: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct PoolStats {
    submitted: AtomicU64,
    converted: AtomicU64,
    failed: AtomicU64,
}

impl PoolStats {
    fn report(&self) -> PoolReport {
        PoolReport {
            submitted: self.submitted.load(Ordering::Relaxed),
            converted: self.converted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
enum WorkerMessage {
    Job(ConversionJob),
    Stop,
}

/// Everything a worker needs, handed over at spawn time.
struct WorkerContext {
    worker: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<WorkerMessage>>>,
    converter: Arc<dyn JobConverter>,
    stats: Arc<PoolStats>,
}

impl WorkerContext {
    async fn run(self) {
        debug!(worker = self.worker, "Worker started");
        loop {
            let message = {
                let mut queue = self.queue.lock().await;
                queue.recv().await
            };
            match message {
                Some(WorkerMessage::Job(job)) => self.process(job).await,
                Some(WorkerMessage::Stop) | None => break,
            }
        }
        debug!(worker = self.worker, "Worker stopped");
    }

    async fn process(&self, job: ConversionJob) {
        let converter = Arc::clone(&self.converter);
        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || converter.convert(&job)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                self.stats.converted.fetch_add(1, Ordering::Relaxed);
                counter!("prate_conversions_total", "outcome" => "success").increment(1);
                histogram!("prate_conversion_duration_seconds").record(elapsed.as_secs_f64());
                info!(
                    worker = self.worker,
                    job = %job,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Conversion complete"
                );
            }
            Ok(Err(e)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                counter!("prate_conversions_total", "outcome" => "failure").increment(1);
                error!(worker = self.worker, job = %job, error = %e, "Conversion failed");
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                counter!("prate_conversions_total", "outcome" => "panic").increment(1);
                error!(worker = self.worker, job = %job, error = %e, "Conversion panicked");
            }
        }
    }
}

enum PoolState {
    Idle,
    Running {
        sender: mpsc::UnboundedSender<WorkerMessage>,
        workers: Vec<JoinHandle<()>>,
    },
    Stopped,
}

/// A fixed-size pool of conversion workers sharing one job queue.
pub struct ConversionScheduler {
    worker_count: usize,
    converter: Arc<dyn JobConverter>,
    stats: Arc<PoolStats>,
    state: PoolState,
}

impl ConversionScheduler {
    /// Create a pool. Workers are not spawned until [`start`](Self::start).
    pub fn new(
        worker_count: usize,
        converter: Arc<dyn JobConverter>,
    ) -> Result<Self, SchedulerError> {
        if worker_count == 0 {
            return Err(SchedulerError::InvalidWorkerCount);
        }
        Ok(Self {
            worker_count,
            converter,
            stats: Arc::new(PoolStats::default()),
            state: PoolState::Idle,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PoolState::Running { .. })
    }

    /// Spawn the workers. Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if !matches!(self.state, PoolState::Idle) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Arc::new(Mutex::new(receiver));

        let workers = (0..self.worker_count)
            .map(|worker| {
                let context = WorkerContext {
                    worker,
                    queue: Arc::clone(&queue),
                    converter: Arc::clone(&self.converter),
                    stats: Arc::clone(&self.stats),
                };
                tokio::spawn(context.run())
            })
            .collect();

        self.state = PoolState::Running { sender, workers };
        info!(workers = self.worker_count, "Conversion pool started");
        Ok(())
    }

    /// Enqueue a job. Never blocks and never drops a job.
    pub fn submit(&self, job: ConversionJob) -> Result<(), SchedulerError> {
        let PoolState::Running { sender, .. } = &self.state else {
            return Err(SchedulerError::NotRunning);
        };
        sender
            .send(WorkerMessage::Job(job))
            .map_err(|_| SchedulerError::NotRunning)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        counter!("prate_jobs_submitted_total").increment(1);
        debug!(job = %job, "Job submitted");
        Ok(())
    }

    /// Send one stop message per worker and wait for all of them.
    ///
    /// Jobs submitted before `stop` are processed first, since the queue is
    /// FIFO. Callers must not `submit` concurrently with `stop`.
    pub async fn stop(&mut self) -> Result<PoolReport, SchedulerError> {
        let (sender, workers) = match std::mem::replace(&mut self.state, PoolState::Stopped) {
            PoolState::Running { sender, workers } => (sender, workers),
            other => {
                self.state = other;
                return Err(SchedulerError::NotRunning);
            }
        };

        for _ in 0..workers.len() {
            if sender.send(WorkerMessage::Stop).is_err() {
                warn!("All workers exited before the stop signal");
                break;
            }
        }
        drop(sender);

        for (worker, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker = worker, error = %e, "Worker terminated abnormally");
            }
        }

        let report = self.stats.report();
        info!(
            submitted = report.submitted,
            converted = report.converted,
            failed = report.failed,
            "Conversion pool stopped"
        );
        Ok(report)
    }
}
