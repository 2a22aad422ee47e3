//! # Sync & Conflict Module
//!
//! Reconciles a user's local game library with the remote catalog.
//!
//! ## Overview
//!
//! This module manages the lifecycle of sync jobs, including:
//! - Admitting one active job per user and keeping a bounded history
//! - Fetching the owned-game manifest and per-game details
//! - Three-way merging of remote records against local edits
//! - Recording, resolving and purging field-level conflicts
//!
//! ## Components
//!
//! - **Sync Job State Machine** (`job`): Manages sync job lifecycle with validated state transitions
//! - **Job Registry** (`registry`): Active jobs, cancellation tokens and per-user history
//! - **Conflicts** (`conflict`): Conflict records and resolution strategies
//! - **Conflict Resolver** (`conflict_resolver`): Conflict registry, resolution and statistics
//! - **Merge Engine** (`merge`): Per-field reconciliation of remote and local games
//! - **Sync Coordinator** (`coordinator`): Orchestrates full and incremental syncs

pub mod conflict;
pub mod conflict_resolver;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod merge;
pub mod registry;

pub use conflict::{
    Conflict, ConflictId, ConflictStatus, ConflictType, EntityType, NewConflict, Resolution,
    ResolutionStrategy,
};
pub use conflict_resolver::{
    AppliedResolution, AutoResolveSummary, ConflictFilter, ConflictResolver, ConflictStatistics,
    RecordOutcome, SYSTEM_RESOLVER,
};
pub use coordinator::{SyncConfig, SyncCoordinator};
pub use error::{ErrorKind, Result, SyncError};
pub use job::{SyncCounters, SyncHistoryEntry, SyncJob, SyncJobId, SyncStatus, SyncType};
pub use merge::{GameMerger, MergeOutcome, MergeReport};
pub use registry::{JobOutcome, JobRegistry};
