//! Job registry
//!
//! Process-wide in-memory store of provisioning jobs. Lifecycle equals the
//! process lifetime; nothing survives a restart. Jobs are retained for a
//! bounded window after creation and then purged by the periodic sweeper, so
//! the polling client sees "not found" once a job ages out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use streampanel_connector::ids::{JobId, UserId};

use crate::stage::{ProvisionStage, StageState, StageStatus};

/// How long a job is kept after creation.
pub const JOB_RETENTION_SECS: i64 = 3600;

/// How often the sweeper purges expired jobs.
pub const CLEANUP_INTERVAL_SECS: u64 = 1800;

/// One user-provisioning workflow's tracked state.
///
/// `status` is always derived from the stage map by the roll-up rule; it is
/// never written independently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub user_id: UserId,
    pub status: StageState,
    pub stages: HashMap<ProvisionStage, StageStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory registry of provisioning jobs.
///
/// Constructed once at startup and handed to the HTTP layer and the
/// processor as an `Arc`; the map itself is the only shared mutable state.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new pending job for a user. Never fails.
    pub async fn create_job(&self, user_id: UserId) -> JobId {
        let mut jobs = self.jobs.write().await;

        let mut timestamp = Utc::now().timestamp_millis();
        let id = loop {
            let candidate = JobId::from_parts(timestamp, user_id);
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
            timestamp += 1;
        };

        let now = Utc::now();
        jobs.insert(
            id.clone(),
            Job {
                id: id.clone(),
                user_id,
                status: StageState::Pending,
                stages: HashMap::new(),
                created_at: now,
                updated_at: now,
            },
        );

        debug!(job_id = %id, %user_id, "Created provisioning job");
        id
    }

    /// Upsert one stage's status and recompute the derived overall status.
    ///
    /// An unknown job id is logged and dropped; provisioning continues even
    /// when registry state is inconsistent, so this must never error and
    /// never create a phantom job.
    pub async fn update_stage(
        &self,
        job_id: &JobId,
        stage: ProvisionStage,
        state: StageState,
        message: impl Into<String>,
    ) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(job_id) else {
            warn!(%job_id, %stage, %state, "Stage update for unknown job dropped");
            return;
        };

        job.stages.insert(stage, StageStatus::new(state, message));
        job.status = StageState::roll_up(job.stages.values().map(|s| &s.status));
        job.updated_at = Utc::now();

        debug!(%job_id, %stage, %state, overall = %job.status, "Updated job stage");
    }

    /// Read a snapshot of a job. Absent or purged ids yield `None`, which the
    /// HTTP layer renders as its not-found response.
    pub async fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Number of jobs currently tracked.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Purge every job older than the retention window. Returns the number
    /// removed.
    pub async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(JOB_RETENTION_SECS);
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at >= cutoff);
        before - jobs.len()
    }

    #[cfg(test)]
    async fn backdate(&self, job_id: &JobId, created_at: DateTime<Utc>) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.created_at = created_at;
        }
    }
}

/// Spawn the periodic retention sweeper for the life of the process.
///
/// The returned handle can be aborted on shutdown; there is no other stop
/// signal.
pub fn spawn_cleanup_sweeper(registry: Arc<JobRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let removed = registry.cleanup().await;
            if removed > 0 {
                info!(removed, "Purged expired provisioning jobs");
            } else {
                debug!("Retention sweep found nothing to purge");
            }
        }
    })
}
