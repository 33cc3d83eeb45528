//! Job worker: claims and executes queued jobs.
//!
//! Any number of worker processes run this loop concurrently; exclusivity
//! comes from the queue's atomic claim, so handlers never lock. The
//! worker also owns the stuck-job sweep that recovers jobs whose handler
//! crashed mid-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use newsloom_core::{defaults, Job, JobRepository, JobType, Result};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Per-job execution timeout in seconds.
    pub job_timeout_secs: u64,
    /// Interval between stuck-job sweeps, in seconds.
    pub stuck_sweep_interval_secs: u64,
    /// Age at which a processing job counts as stuck, in seconds.
    pub stuck_after_secs: i64,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::WORKER_MAX_CONCURRENT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            stuck_sweep_interval_secs: defaults::WORKER_STUCK_SWEEP_INTERVAL_SECS,
            stuck_after_secs: defaults::STUCK_JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `JOB_TIMEOUT_SECS` | `300` | Per-job execution timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_MS);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            job_timeout_secs,
            ..Self::default()
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, job_type: JobType },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, job_type: JobType },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        job_type: JobType,
        error: String,
    },
    /// Stuck jobs were swept back to pending.
    StuckJobsReset { count: u64 },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| newsloom_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Job worker that processes jobs from the queue.
pub struct JobWorker {
    jobs: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(jobs: Arc<dyn JobRepository>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            jobs,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for a job type.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let job_type = handler.job_type();
        let mut handlers = self.handlers.write().await;
        handlers.insert(job_type, Arc::new(handler));
        debug!(?job_type, "Registered job handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        let worker_clone = worker.clone();

        tokio::spawn(async move {
            worker_clone.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent job processing.
    ///
    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Sleeps only when the queue is empty; sweeps stuck
    /// jobs on its own interval.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Job worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let sweep_interval = Duration::from_secs(self.config.stuck_sweep_interval_secs);
        let mut last_sweep = Instant::now();

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Job worker received shutdown signal");
                break;
            }

            if last_sweep.elapsed() >= sweep_interval {
                self.sweep_stuck().await;
                last_sweep = Instant::now();
            }

            // Claim up to max_concurrent jobs
            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..self.config.max_concurrent_jobs {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let runner = self.runner();
                        tasks.spawn(async move {
                            runner.execute_job(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Queue empty — sleep before polling again
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent job batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
                // No sleep — immediately try to claim more jobs
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    /// Sweep jobs stuck in processing past the timeout back to pending.
    async fn sweep_stuck(&self) {
        match self
            .jobs
            .reset_stuck(chrono::Duration::seconds(self.config.stuck_after_secs))
            .await
        {
            Ok(0) => {}
            Ok(count) => {
                warn!(
                    subsystem = "jobs",
                    component = "worker",
                    op = "sweep_stuck",
                    count,
                    "Reset stuck jobs to pending"
                );
                let _ = self.event_tx.send(WorkerEvent::StuckJobsReset { count });
            }
            Err(e) => {
                error!(error = ?e, "Stuck-job sweep failed");
            }
        }
    }

    /// Claim the next available job without processing it.
    async fn claim_job(&self) -> Option<Job> {
        let job_types: Vec<JobType> = {
            let handlers = self.handlers.read().await;
            handlers.keys().copied().collect()
        };

        match self.jobs.claim_next_for_types(&job_types).await {
            Ok(Some(job)) => Some(job),
            Ok(None) => None,
            Err(e) => {
                error!(error = ?e, "Failed to claim job");
                None
            }
        }
    }

    /// Bundle references for a spawned job task.
    fn runner(&self) -> JobRunner {
        JobRunner {
            jobs: self.jobs.clone(),
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }
}

/// Lightweight reference bundle for executing a single job in a spawned
/// task.
struct JobRunner {
    jobs: Arc<dyn JobRepository>,
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    job_timeout: Duration,
}

impl JobRunner {
    /// Execute a single claimed job.
    async fn execute_job(self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let job_type = job.job_type;

        info!(
            subsystem = "jobs",
            component = "worker",
            job_id = %job_id,
            job_type = %job_type,
            "Processing job"
        );

        let _ = self
            .event_tx
            .send(WorkerEvent::JobStarted { job_id, job_type });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&job_type).cloned()
        };

        let result = match handler {
            Some(handler) => {
                let ctx = JobContext::new(job);
                match tokio::time::timeout(self.job_timeout, handler.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            job_id = %job_id,
                            job_type = %job_type,
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        );
                        JobResult::Retry(format!(
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        ))
                    }
                }
            }
            None => {
                warn!(job_type = %job_type, "No handler registered for job type");
                JobResult::Failed(format!("No handler for job type: {job_type}"))
            }
        };

        match result {
            JobResult::Success(result_data) => {
                if let Err(e) = self.jobs.complete(job_id, result_data).await {
                    error!(error = ?e, job_id = %job_id, "Failed to mark job as completed");
                } else {
                    info!(
                        subsystem = "jobs",
                        component = "worker",
                        job_id = %job_id,
                        job_type = %job_type,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::JobCompleted { job_id, job_type });
                }
            }
            JobResult::Failed(error) => {
                self.finish_failed(job_id, job_type, error, false, start).await;
            }
            JobResult::Retry(error) => {
                self.finish_failed(job_id, job_type, error, true, start).await;
            }
        }
    }

    async fn finish_failed(
        &self,
        job_id: Uuid,
        job_type: JobType,
        error: String,
        retryable: bool,
        start: Instant,
    ) {
        if let Err(e) = self.jobs.fail(job_id, &error, retryable).await {
            error!(error = ?e, job_id = %job_id, "Failed to mark job as failed");
            return;
        }
        warn!(
            subsystem = "jobs",
            component = "worker",
            job_id = %job_id,
            job_type = %job_type,
            %error,
            retryable,
            duration_ms = start.elapsed().as_millis() as u64,
            "Job failed"
        );
        let _ = self.event_tx.send(WorkerEvent::JobFailed {
            job_id,
            job_type,
            error,
        });
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    jobs: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            jobs,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.jobs, self.config);

        for handler in self.handlers {
            let job_type = handler.job_type();
            let mut handlers = worker.handlers.write().await;
            handlers.insert(job_type, Arc::from(handler));
        }

        worker
    }
}
