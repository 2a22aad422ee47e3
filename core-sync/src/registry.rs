//! Active job registry and bounded per-user history
//!
//! The registry is the single place that decides whether a user may start a
//! sync. Registration, cancellation and completion all run under one lock, so
//! two concurrent callers can never both own an active job for the same user.

use crate::job::{SyncCounters, SyncHistoryEntry, SyncJob, SyncJobId, SyncStatus};
use crate::{Result, SyncError};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

struct ActiveSync {
    job: SyncJob,
    cancellation_token: CancellationToken,
}

#[derive(Default)]
struct RegistryState {
    active: HashMap<String, ActiveSync>,
    /// Oldest entry at the front
    history: HashMap<String, VecDeque<SyncHistoryEntry>>,
}

pub struct JobRegistry {
    state: Mutex<RegistryState>,
    history_limit: usize,
}

impl JobRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            history_limit: history_limit.max(1),
        }
    }

    /// Start a pending job and make it the user's active job.
    ///
    /// # Errors
    ///
    /// `SyncInProgress` if the user already has an active job.
    pub async fn register(&self, job: SyncJob, now: i64) -> Result<(SyncJob, CancellationToken)> {
        let mut state = self.state.lock().await;

        if state.active.contains_key(&job.user_id) {
            return Err(SyncError::SyncInProgress {
                user_id: job.user_id.clone(),
            });
        }

        let job = job.start(now)?;
        let token = CancellationToken::new();
        state.active.insert(
            job.user_id.clone(),
            ActiveSync {
                job: job.clone(),
                cancellation_token: token.clone(),
            },
        );
        debug!(user_id = %job.user_id, job_id = %job.id, "Registered sync job");

        Ok((job, token))
    }

    /// Copy of the user's active job
    pub async fn snapshot(&self, user_id: &str) -> Option<SyncJob> {
        let state = self.state.lock().await;
        state.active.get(user_id).map(|active| active.job.clone())
    }

    /// Copies of every active job, keyed by user
    pub async fn active(&self) -> HashMap<String, SyncJob> {
        let state = self.state.lock().await;
        state
            .active
            .iter()
            .map(|(user_id, active)| (user_id.clone(), active.job.clone()))
            .collect()
    }

    pub async fn is_active(&self, user_id: &str) -> bool {
        self.state.lock().await.active.contains_key(user_id)
    }

    /// Flag the active job as cancelled and fire its token. The worker
    /// observes the request at its next checkpoint.
    ///
    /// # Errors
    ///
    /// `NoActiveSync` if the user has no active job.
    pub async fn request_cancel(&self, user_id: &str) -> Result<SyncJob> {
        let mut state = self.state.lock().await;
        let active = state
            .active
            .get_mut(user_id)
            .ok_or_else(|| SyncError::NoActiveSync {
                user_id: user_id.to_string(),
            })?;

        active.job.cancel_requested = true;
        active.cancellation_token.cancel();
        Ok(active.job.clone())
    }

    /// Mutate the counters of the active job, if it is still `job_id`.
    pub async fn update_counters<F>(&self, user_id: &str, job_id: SyncJobId, f: F) -> Option<SyncCounters>
    where
        F: FnOnce(&mut SyncCounters),
    {
        let mut state = self.state.lock().await;
        let active = state.active.get_mut(user_id)?;
        if active.job.id != job_id {
            return None;
        }
        f(&mut active.job.counters);
        Some(active.job.counters)
    }

    /// Move the active job to its terminal state and into history.
    ///
    /// Returns `None` if `job_id` is no longer the user's active job.
    pub async fn finish(
        &self,
        user_id: &str,
        job_id: SyncJobId,
        outcome: JobOutcome,
        now: i64,
    ) -> Option<SyncHistoryEntry> {
        let mut state = self.state.lock().await;

        match state.active.get(user_id) {
            Some(active) if active.job.id == job_id => {}
            _ => {
                warn!(user_id, job_id = %job_id, "Finishing a job that is not active");
                return None;
            }
        }
        let active = state.active.remove(user_id)?;

        let job = Self::terminate(active.job, outcome, now);
        let entry = match SyncHistoryEntry::from_job(&job) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(user_id, job_id = %job_id, error = %e, "Job could not be recorded in history");
                return None;
            }
        };

        let history = state.history.entry(user_id.to_string()).or_default();
        history.push_back(entry.clone());
        while history.len() > self.history_limit {
            history.pop_front();
        }

        Some(entry)
    }

    fn terminate(job: SyncJob, outcome: JobOutcome, now: i64) -> SyncJob {
        let fallback = job.clone();
        let result = match outcome.clone() {
            JobOutcome::Succeeded => job.succeed(now),
            JobOutcome::Failed(message) => job.fail(message, now),
            JobOutcome::Cancelled => job.cancel(now),
        };

        result.unwrap_or_else(|e| {
            warn!(job_id = %fallback.id, error = %e, "Forcing terminal state");
            let mut job = fallback;
            job.completed_at = Some(now);
            match outcome {
                JobOutcome::Succeeded => job.status = SyncStatus::Succeeded,
                JobOutcome::Failed(message) => {
                    job.status = SyncStatus::Failed;
                    job.error_message = Some(message);
                }
                JobOutcome::Cancelled => job.status = SyncStatus::Cancelled,
            }
            job
        })
    }

    /// Finished jobs of a user, most recent first
    pub async fn history(&self, user_id: &str) -> Vec<SyncHistoryEntry> {
        let state = self.state.lock().await;
        state
            .history
            .get(user_id)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}
