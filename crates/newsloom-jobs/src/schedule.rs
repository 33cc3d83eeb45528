//! Periodic pass submission.
//!
//! Lifecycle sweeps and merge reconciliation run on a schedule, but the
//! schedule only *enqueues* jobs; execution always flows through the
//! queue. Idempotent enqueue makes double submission harmless: while a
//! pass is still pending or running, re-submitting collapses onto it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, warn};

use newsloom_core::{defaults, JobRepository, JobType};

/// One recurring pass.
#[derive(Debug, Clone)]
pub struct PeriodicPass {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub every: Duration,
}

/// The standard recurring passes of a worker deployment.
pub fn standard_passes() -> Vec<PeriodicPass> {
    vec![
        PeriodicPass {
            job_type: JobType::StoryLifecycle,
            payload: json!({}),
            every: Duration::from_secs(defaults::LIFECYCLE_PASS_INTERVAL_SECS),
        },
        PeriodicPass {
            job_type: JobType::StoryMerge,
            payload: json!({"limit": defaults::MERGE_SCAN_LIMIT}),
            every: Duration::from_secs(defaults::MERGE_PASS_INTERVAL_SECS),
        },
    ]
}

/// Spawn a task that enqueues `pass` on its interval, forever.
///
/// Enqueue errors are logged and the tick skipped; a queue outage heals
/// on a later tick without killing the schedule.
pub fn spawn_periodic(jobs: Arc<dyn JobRepository>, pass: PeriodicPass) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(pass.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let priority = pass.job_type.default_priority();
            match jobs
                .enqueue(pass.job_type, Some(pass.payload.clone()), priority, Utc::now())
                .await
            {
                Ok(job_id) => {
                    debug!(
                        subsystem = "jobs",
                        component = "schedule",
                        job_type = %pass.job_type,
                        job_id = %job_id,
                        "Periodic pass submitted"
                    );
                }
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "schedule",
                        job_type = %pass.job_type,
                        error = %e,
                        "Periodic pass submission failed; will retry next tick"
                    );
                }
            }
        }
    })
}
