//! # Sync Job State Machine
//!
//! Lifecycle of one user's sync job with validated state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Running → Succeeded
//!     ↓         ↓
//!     └──────→ Failed
//!     └──────→ Cancelled
//! ```
//!
//! Transitions consume the job and return it in its new state, so a job
//! value can never be observed halfway through a transition. Terminal jobs
//! are frozen into a [`SyncHistoryEntry`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncJob, SyncType};
//!
//! let job = SyncJob::new("76561198000000000", SyncType::Full, now).start(now)?;
//! let job = job.succeed(later)?;
//! let entry = SyncHistoryEntry::from_job(&job)?;
//! ```

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a sync job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| SyncError::InvalidInput {
            field: "job_id".to_string(),
            message: e.to_string(),
        })
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Succeeded | SyncStatus::Failed | SyncStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Succeeded => "succeeded",
            SyncStatus::Failed => "failed",
            SyncStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The type of sync being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    /// Manifest plus per-game metadata
    Full,
    /// Manifest only: ownership and playtime
    Incremental,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Full => "full",
            SyncType::Incremental => "incremental",
        }
    }
}

impl FromStr for SyncType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(SyncType::Full),
            "incremental" => Ok(SyncType::Incremental),
            _ => Err(SyncError::InvalidSyncType(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Work counters of a sync job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Remote games merged so far
    pub games_processed: u64,
    /// Games in the remote manifest (0 until it is fetched)
    pub games_total: u64,
    /// Fetch or record failures that were skipped
    pub errors: u64,
    pub games_added: u64,
    pub games_updated: u64,
    pub conflicts_detected: u64,
}

impl SyncCounters {
    /// Progress percentage (0-100)
    pub fn percent(&self) -> u8 {
        if self.games_total == 0 {
            return 0;
        }
        ((self.games_processed as f64 / self.games_total as f64) * 100.0).min(100.0) as u8
    }
}

// ============================================================================
// Sync Job Entity
// ============================================================================

/// A sync job with state machine semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: SyncJobId,
    /// User whose library is being synced
    pub user_id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub counters: SyncCounters,
    /// Set by a cancel request, observed by the worker at the next checkpoint
    pub cancel_requested: bool,
    /// Error message if failed
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl SyncJob {
    /// Create a new sync job in pending state
    pub fn new(user_id: impl Into<String>, sync_type: SyncType, now: i64) -> Self {
        Self {
            id: SyncJobId::new(),
            user_id: user_id.into(),
            sync_type,
            status: SyncStatus::Pending,
            counters: SyncCounters::default(),
            cancel_requested: false,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Start the sync job
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Pending` state
    pub fn start(mut self, now: i64) -> Result<Self> {
        self.validate_transition(SyncStatus::Running)?;
        self.status = SyncStatus::Running;
        self.started_at = Some(now);
        Ok(self)
    }

    /// Mark the job as succeeded
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn succeed(mut self, now: i64) -> Result<Self> {
        self.validate_transition(SyncStatus::Succeeded)?;
        self.status = SyncStatus::Succeeded;
        self.completed_at = Some(now);
        Ok(self)
    }

    /// Mark the job as failed with an error message
    pub fn fail(mut self, error_message: impl Into<String>, now: i64) -> Result<Self> {
        self.validate_transition(SyncStatus::Failed)?;
        self.status = SyncStatus::Failed;
        self.completed_at = Some(now);
        self.error_message = Some(error_message.into());
        Ok(self)
    }

    /// Mark the job as cancelled
    pub fn cancel(mut self, now: i64) -> Result<Self> {
        self.validate_transition(SyncStatus::Cancelled)?;
        self.status = SyncStatus::Cancelled;
        self.completed_at = Some(now);
        self.cancel_requested = true;
        Ok(self)
    }

    pub fn percent(&self) -> u8 {
        if self.status == SyncStatus::Succeeded {
            return 100;
        }
        self.counters.percent()
    }

    /// Duration of the job in seconds, once it has finished
    pub fn duration_secs(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start).max(0) as u64),
            _ => None,
        }
    }

    fn validate_transition(&self, to: SyncStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (SyncStatus::Pending, SyncStatus::Running)
                | (SyncStatus::Pending, SyncStatus::Cancelled)
                | (SyncStatus::Pending, SyncStatus::Failed)
                | (SyncStatus::Running, SyncStatus::Succeeded)
                | (SyncStatus::Running, SyncStatus::Failed)
                | (SyncStatus::Running, SyncStatus::Cancelled)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// History
// ============================================================================

/// Immutable snapshot of a finished sync job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub job_id: SyncJobId,
    pub user_id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub counters: SyncCounters,
    pub error_message: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: i64,
    pub duration_secs: u64,
}

impl SyncHistoryEntry {
    /// Freeze a terminal job
    ///
    /// # Errors
    ///
    /// Returns an error if the job has not reached a terminal state
    pub fn from_job(job: &SyncJob) -> Result<Self> {
        let completed_at = match (job.status.is_terminal(), job.completed_at) {
            (true, Some(completed_at)) => completed_at,
            _ => {
                return Err(SyncError::InvalidStateTransition {
                    from: job.status.as_str().to_string(),
                    to: "history".to_string(),
                    reason: "Only finished jobs can be recorded in history".to_string(),
                })
            }
        };

        Ok(Self {
            job_id: job.id,
            user_id: job.user_id.clone(),
            sync_type: job.sync_type,
            status: job.status,
            counters: job.counters,
            error_message: job.error_message.clone(),
            started_at: job.started_at,
            completed_at,
            duration_secs: job.duration_secs().unwrap_or(0),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
