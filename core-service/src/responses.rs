//! Typed results for each service method.

use core_sync::{
    AutoResolveSummary, Conflict, ConflictStatistics, SyncHistoryEntry, SyncJob, SyncJobId,
    SyncStatus, SyncType,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// `sync_library`: state at submission time, not completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStarted {
    pub job_id: SyncJobId,
    pub user_id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub started_at: Option<i64>,
}

impl From<SyncJob> for SyncStarted {
    fn from(job: SyncJob) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id,
            sync_type: job.sync_type,
            status: job.status,
            started_at: job.started_at,
        }
    }
}

/// `get_sync_progress`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub percent: u8,
    #[serde(flatten)]
    pub job: SyncJob,
}

impl From<SyncJob> for SyncProgress {
    fn from(job: SyncJob) -> Self {
        Self {
            percent: job.percent(),
            job,
        }
    }
}

/// `get_sync_history`, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncHistory {
    pub user_id: String,
    pub entries: Vec<SyncHistoryEntry>,
}

/// `cancel_sync`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelRequested {
    pub job_id: SyncJobId,
    pub user_id: String,
    /// Games merged when the request landed; the worker stops at the next game
    pub games_processed: u64,
}

impl From<SyncJob> for CancelRequested {
    fn from(job: SyncJob) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id,
            games_processed: job.counters.games_processed,
        }
    }
}

/// `get_active_syncs`, keyed by user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSyncs {
    pub syncs: BTreeMap<String, SyncJob>,
}

impl From<HashMap<String, SyncJob>> for ActiveSyncs {
    fn from(active: HashMap<String, SyncJob>) -> Self {
        Self {
            syncs: active.into_iter().collect(),
        }
    }
}

/// `get_conflicts`, detection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictList {
    pub total: usize,
    pub conflicts: Vec<Conflict>,
}

impl From<Vec<Conflict>> for ConflictList {
    fn from(conflicts: Vec<Conflict>) -> Self {
        Self {
            total: conflicts.len(),
            conflicts,
        }
    }
}

/// `resolve_conflict` and `ignore_conflict`: the closed conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictClosed {
    pub conflict: Conflict,
}

/// `auto_resolve_conflicts`
pub type AutoResolveResult = AutoResolveSummary;

/// `get_conflict_statistics`
pub type ConflictStatisticsResult = ConflictStatistics;

/// `purge_conflicts`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConflictsPurged {
    pub removed: usize,
}
