//! # Sync Coordinator
//!
//! Orchestrates full and incremental library syncs against the remote catalog.
//!
//! ## Overview
//!
//! The `SyncCoordinator` owns the lifecycle of every sync job. It:
//! - Admits at most one active job per user through the [`JobRegistry`]
//! - Runs each job as a background task on a bounded worker pool
//! - Fetches the remote manifest (with retries) and, for full syncs, per-game details
//! - Merges every remote record through the [`GameMerger`]
//! - Flags local games missing from the manifest as conflicts
//! - Recomputes library statistics and sync timestamps
//! - Emits progress events via `EventBus`
//!
//! ## Workflow
//!
//! 1. Register the job (`pending → running`) and return immediately
//! 2. Wait for a worker slot
//! 3. Create or refresh the user's library and raise `sync_in_progress`
//! 4. Fetch the manifest; loss of the manifest fails the job
//! 5. Merge games one at a time, checking for cancellation between games
//! 6. Flag games absent from the manifest
//! 7. Recompute stats; advance `last_library_sync` (and `last_full_sync`) on success
//! 8. Clear `sync_in_progress`, move the job to history, emit the terminal event
//!
//! Every merged game is committed on its own, so a cancelled or failed job
//! keeps the games it already processed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncCoordinator, SyncType};
//! use std::sync::Arc;
//!
//! # async fn example(coordinator: Arc<SyncCoordinator>) -> core_sync::Result<()> {
//! let job = coordinator.start_sync("76561198000000000", SyncType::Full).await?;
//!
//! // Check status
//! let progress = coordinator.get_sync_progress(&job.user_id).await?;
//! println!("Progress: {}%", progress.percent());
//!
//! // Cancel if needed
//! coordinator.cancel_sync(&job.user_id).await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    conflict_resolver::ConflictResolver,
    job::{SyncCounters, SyncHistoryEntry, SyncJob, SyncJobId, SyncStatus, SyncType},
    merge::{recompute_library_stats, GameMerger, MergeOutcome},
    registry::{JobOutcome, JobRegistry},
    Result, SyncError,
};
use bridge_traits::catalog::{RemoteCatalog, RemoteGame, RemoteGameDetails};
use bridge_traits::error::BridgeError;
use bridge_traits::time::Clock;
use core_library::{GameField, GameRepository, Library, LibraryRepository};
use core_runtime::config::{CoreConfig, FieldPolicy};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Progress events are emitted every this many games, and after the last one
const PROGRESS_EVENT_INTERVAL: u64 = 10;

/// Sync coordinator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Worker-pool size
    pub max_concurrent_syncs: usize,

    /// Deadline for each remote fetch
    pub fetch_timeout: Duration,

    /// Attempts for the manifest fetch, first try included
    pub manifest_retry_attempts: u32,

    /// Delay before the first manifest retry; doubled after each retry
    pub retry_backoff: Duration,

    /// Deadline for an entire job
    pub sync_timeout: Duration,

    /// Finished jobs kept per user
    pub history_limit: usize,

    /// Per-field conflict policy; absent fields are protected
    pub field_policies: HashMap<GameField, FieldPolicy>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_syncs: 4,
            fetch_timeout: Duration::from_secs(30),
            manifest_retry_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            sync_timeout: Duration::from_secs(3600), // 1 hour
            history_limit: 20,
            field_policies: HashMap::new(),
        }
    }
}

impl SyncConfig {
    /// Derive the sync settings from the core configuration.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if a field policy names an unknown field.
    pub fn from_core_config(config: &CoreConfig) -> Result<Self> {
        let mut field_policies = HashMap::new();
        for (name, policy) in &config.field_policies {
            let field: GameField = name.parse().map_err(|message| SyncError::InvalidInput {
                field: "field_policies".to_string(),
                message,
            })?;
            if field == GameField::Owned {
                return Err(SyncError::InvalidInput {
                    field: "field_policies".to_string(),
                    message: "owned is not a syncable field".to_string(),
                });
            }
            field_policies.insert(field, *policy);
        }

        Ok(Self {
            max_concurrent_syncs: config.max_concurrent_syncs,
            fetch_timeout: config.fetch_timeout,
            manifest_retry_attempts: config.manifest_retry_attempts,
            retry_backoff: config.retry_backoff,
            sync_timeout: config.sync_timeout,
            history_limit: config.history_limit,
            field_policies,
        })
    }
}

/// How a job's work ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncRun {
    Completed,
    Cancelled,
}

/// Sync coordinator for orchestrating library syncs
pub struct SyncCoordinator {
    /// Configuration
    config: SyncConfig,

    /// Remote source of truth
    catalog: Arc<dyn RemoteCatalog>,

    libraries: Arc<dyn LibraryRepository>,
    games: Arc<dyn GameRepository>,

    /// Conflict registry shared with the service layer
    resolver: Arc<ConflictResolver>,

    merger: Arc<GameMerger>,

    /// Active jobs and history
    registry: Arc<JobRegistry>,

    /// Bounds how many jobs run at once
    workers: Arc<Semaphore>,

    /// Event bus for emitting sync events
    event_bus: EventBus,

    clock: Arc<dyn Clock>,
}

impl SyncCoordinator {
    /// Create a new sync coordinator
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use core_sync::{ConflictResolver, SyncConfig, SyncCoordinator};
    /// use std::sync::Arc;
    ///
    /// let resolver = Arc::new(ConflictResolver::new(
    ///     games.clone(), libraries.clone(), clock.clone(), event_bus.clone(), 500,
    /// ));
    /// let coordinator = SyncCoordinator::new(
    ///     SyncConfig::default(),
    ///     catalog,
    ///     libraries,
    ///     games,
    ///     resolver,
    ///     event_bus,
    ///     clock,
    /// );
    /// ```
    pub fn new(
        config: SyncConfig,
        catalog: Arc<dyn RemoteCatalog>,
        libraries: Arc<dyn LibraryRepository>,
        games: Arc<dyn GameRepository>,
        resolver: Arc<ConflictResolver>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let merger = Arc::new(GameMerger::new(
            games.clone(),
            resolver.clone(),
            event_bus.clone(),
            config.field_policies.clone(),
        ));
        let registry = Arc::new(JobRegistry::new(config.history_limit));
        let workers = Arc::new(Semaphore::new(config.max_concurrent_syncs.max(1)));

        Self {
            config,
            catalog,
            libraries,
            games,
            resolver,
            merger,
            registry,
            workers,
            event_bus,
            clock,
        }
    }

    pub fn resolver(&self) -> &Arc<ConflictResolver> {
        &self.resolver
    }

    /// Start a sync for a user
    ///
    /// Returns the job as registered; the merge itself runs in the background.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `user_id` is blank
    /// - `SyncInProgress` if the user already has an active job
    #[instrument(skip(self))]
    pub async fn start_sync(&self, user_id: &str, sync_type: SyncType) -> Result<SyncJob> {
        if user_id.trim().is_empty() {
            return Err(SyncError::InvalidInput {
                field: "user_id".to_string(),
                message: "user_id cannot be empty".to_string(),
            });
        }

        let now = self.clock.unix_timestamp();
        let (job, cancellation_token) = self
            .registry
            .register(SyncJob::new(user_id, sync_type, now), now)
            .await?;

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                job_id: job.id.to_string(),
                user_id: job.user_id.clone(),
                is_full_sync: sync_type == SyncType::Full,
            }))
            .ok();

        // Spawn background task
        let coordinator = self.clone_for_task();
        let task_job = job.clone();
        tokio::spawn(async move {
            coordinator.run_sync_task(task_job, cancellation_token).await;
        });

        info!(job_id = %job.id, "Started {} sync for user {}", sync_type, user_id);

        Ok(job)
    }

    /// Clone for background task (avoids Arc<Arc<...>>)
    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            catalog: Arc::clone(&self.catalog),
            libraries: Arc::clone(&self.libraries),
            games: Arc::clone(&self.games),
            resolver: Arc::clone(&self.resolver),
            merger: Arc::clone(&self.merger),
            registry: Arc::clone(&self.registry),
            workers: Arc::clone(&self.workers),
            event_bus: self.event_bus.clone(),
            clock: Arc::clone(&self.clock),
        }
    }

    /// Run sync task in background
    ///
    /// Always ends with the job in history, whatever happens to the work.
    #[instrument(skip(self, job, cancellation_token), fields(job_id = %job.id, user_id = %job.user_id))]
    async fn run_sync_task(self, job: SyncJob, cancellation_token: CancellationToken) {
        // Raised before queueing for a worker. A library this job creates
        // only gets the flag once `prepare_library` inserts it.
        if let Err(e) = self
            .libraries
            .set_sync_in_progress(&job.user_id, true, self.clock.unix_timestamp())
            .await
        {
            warn!(error = %e, "Failed to raise sync_in_progress");
        }

        let permit = tokio::select! {
            permit = Arc::clone(&self.workers).acquire_owned() => permit.ok(),
            _ = cancellation_token.cancelled() => None,
        };

        let (outcome, recoverable) = match permit {
            None if cancellation_token.is_cancelled() => {
                info!("Sync cancelled before a worker was free");
                (JobOutcome::Cancelled, false)
            }
            None => (JobOutcome::Failed("Worker pool closed".to_string()), false),
            Some(permit) => {
                let worker = self.clone_for_task();
                let task_job = job.clone();
                let token = cancellation_token.clone();
                let sync_timeout = self.config.sync_timeout;

                // Separate task so a panic in the work surfaces as a JoinError
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    match timeout(sync_timeout, worker.execute_sync(&task_job, &token)).await {
                        Ok(result) => result,
                        Err(_) => Err(SyncError::Timeout(sync_timeout.as_secs())),
                    }
                });

                match handle.await {
                    Ok(Ok(SyncRun::Completed)) => (JobOutcome::Succeeded, false),
                    Ok(Ok(SyncRun::Cancelled)) => (JobOutcome::Cancelled, false),
                    Ok(Err(e)) => {
                        error!(error = %e, kind = ?e.kind(), "Sync job failed");
                        (JobOutcome::Failed(e.to_string()), e.is_recoverable())
                    }
                    Err(join_error) => {
                        error!(error = %join_error, "Sync task aborted");
                        (
                            JobOutcome::Failed(format!("Sync task aborted: {}", join_error)),
                            false,
                        )
                    }
                }
            }
        };

        self.finalize(&job, outcome, recoverable).await;
    }

    /// Clear the library flag, move the job to history and announce the end.
    async fn finalize(&self, job: &SyncJob, outcome: JobOutcome, recoverable: bool) {
        let now = self.clock.unix_timestamp();

        // Before the registry releases the user, so a new job never sees its flag cleared
        if let Err(e) = self
            .libraries
            .set_sync_in_progress(&job.user_id, false, now)
            .await
        {
            warn!(error = %e, "Failed to clear sync_in_progress");
        }

        let Some(entry) = self.registry.finish(&job.user_id, job.id, outcome, now).await else {
            return;
        };

        let event = terminal_event(&entry, recoverable);
        match entry.status {
            SyncStatus::Succeeded => info!(
                added = entry.counters.games_added,
                updated = entry.counters.games_updated,
                conflicts = entry.counters.conflicts_detected,
                errors = entry.counters.errors,
                "Sync job {} completed",
                entry.job_id
            ),
            SyncStatus::Cancelled => info!(
                processed = entry.counters.games_processed,
                "Sync job {} cancelled",
                entry.job_id
            ),
            _ => {}
        }

        if let Some(event) = event {
            self.event_bus.emit(CoreEvent::Sync(event)).ok();
        }
    }

    /// Execute the sync operation
    async fn execute_sync(&self, job: &SyncJob, cancellation_token: &CancellationToken) -> Result<SyncRun> {
        let user_id = job.user_id.as_str();

        // Phase 1: Library
        self.prepare_library(job).await?;

        // Phase 2: Manifest
        let run = match self.fetch_manifest(job, cancellation_token).await? {
            Some(manifest) => self.merge_manifest(job, manifest, cancellation_token).await?,
            None => SyncRun::Cancelled,
        };

        // Phase 3: Stats. Partial progress of a cancelled job is counted too.
        let now = self.clock.unix_timestamp();
        let completed = run == SyncRun::Completed;
        let full = job.sync_type == SyncType::Full;
        recompute_library_stats(
            self.libraries.as_ref(),
            self.games.as_ref(),
            &self.event_bus,
            user_id,
            now,
            |library| {
                if completed {
                    library.last_library_sync = Some(now);
                    if full {
                        library.last_full_sync = Some(now);
                    }
                }
            },
        )
        .await?;

        Ok(run)
    }

    /// Create the user's library on first sync, refresh its profile on full
    /// syncs, and raise `sync_in_progress`.
    async fn prepare_library(&self, job: &SyncJob) -> Result<()> {
        let user_id = job.user_id.as_str();
        let existing = self.libraries.find_by_user_id(user_id).await?;

        let profile = if existing.is_none() || job.sync_type == SyncType::Full {
            match self.fetch(self.catalog.fetch_profile(user_id)).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "Profile fetch failed, keeping current display data");
                    self.update_counters(job, |c| c.errors += 1).await;
                    None
                }
            }
        } else {
            None
        };

        let now = self.clock.unix_timestamp();
        match existing {
            Some(mut library) => {
                if let Some(profile) = &profile {
                    library.apply_profile(profile, now);
                }
                library.sync_in_progress = true;
                library.updated_at = now;
                self.libraries.update(&library).await?;
            }
            None => {
                let mut library = match &profile {
                    Some(profile) => Library::from_profile(profile, now),
                    None => Library::new(user_id, user_id, now),
                };
                library.user_id = user_id.to_string();
                library.sync_in_progress = true;
                self.libraries.insert(&library).await?;
                info!("Created library for user {}", user_id);
            }
        }

        Ok(())
    }

    /// Fetch the owned-game manifest, retrying transient failures with
    /// exponential backoff.
    ///
    /// Returns `None` if the job was cancelled while waiting.
    async fn fetch_manifest(
        &self,
        job: &SyncJob,
        cancellation_token: &CancellationToken,
    ) -> Result<Option<Vec<RemoteGame>>> {
        let attempts = self.config.manifest_retry_attempts.max(1);
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0;

        loop {
            if cancellation_token.is_cancelled() {
                return Ok(None);
            }
            attempt += 1;

            match self.fetch(self.catalog.fetch_owned_games(&job.user_id)).await {
                Ok(manifest) => {
                    debug!(games = manifest.len(), attempt, "Fetched manifest");
                    return Ok(Some(manifest));
                }
                Err(e) => {
                    self.update_counters(job, |c| c.errors += 1).await;

                    if !e.is_transient() || attempt >= attempts {
                        error!(error = %e, attempt, "Manifest fetch failed");
                        return Err(SyncError::Remote(e));
                    }

                    warn!(error = %e, attempt, "Manifest fetch failed, retrying in {:?}", backoff);
                    tokio::select! {
                        _ = cancellation_token.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
    }

    /// Merge every manifest entry, then flag local games the manifest omits.
    async fn merge_manifest(
        &self,
        job: &SyncJob,
        manifest: Vec<RemoteGame>,
        cancellation_token: &CancellationToken,
    ) -> Result<SyncRun> {
        let user_id = job.user_id.as_str();
        let total = manifest.len() as u64;
        self.update_counters(job, |c| c.games_total = total).await;

        // Only used to find games missing from the manifest; each game is
        // re-read when merged since resolutions may land during the run
        let local = self.games.find_by_user_id(user_id).await?;
        let mut seen = HashSet::with_capacity(manifest.len());

        info!("Merging {} remote games", total);

        for remote in &manifest {
            // Checkpoint between games, never inside one
            if cancellation_token.is_cancelled() {
                info!("Cancellation observed, stopping merge");
                return Ok(SyncRun::Cancelled);
            }

            seen.insert(remote.app_id);

            let counters = if let Err(reason) = validate_remote(remote) {
                warn!(app_id = remote.app_id, reason, "Skipping invalid remote record");
                self.update_counters(job, |c| {
                    c.errors += 1;
                    c.games_processed += 1;
                })
                .await
            } else {
                let details = match job.sync_type {
                    SyncType::Full => self.fetch_details(job, remote.app_id).await,
                    SyncType::Incremental => None,
                };

                let report = self
                    .merger
                    .merge_game(
                        user_id,
                        remote,
                        details.as_ref(),
                        self.clock.unix_timestamp(),
                    )
                    .await?;

                let counters = self
                    .update_counters(job, |c| {
                        c.games_processed += 1;
                        c.conflicts_detected += report.conflicts;
                        match report.outcome {
                            MergeOutcome::Added => c.games_added += 1,
                            MergeOutcome::Updated { .. } => c.games_updated += 1,
                            MergeOutcome::Unchanged => {}
                        }
                    })
                    .await;
                counters
            };

            if counters.games_processed % PROGRESS_EVENT_INTERVAL == 0
                || counters.games_processed == total
            {
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Progress {
                        job_id: job.id.to_string(),
                        user_id: user_id.to_string(),
                        games_processed: counters.games_processed,
                        games_total: counters.games_total,
                        percent: counters.percent(),
                    }))
                    .ok();
            }
        }

        if cancellation_token.is_cancelled() {
            return Ok(SyncRun::Cancelled);
        }

        let flagged = self
            .merger
            .flag_missing_games(user_id, &local, &seen)
            .await;
        if flagged > 0 {
            info!(flagged, "Local games missing from the remote manifest");
            self.update_counters(job, |c| c.conflicts_detected += flagged)
                .await;
        }

        Ok(SyncRun::Completed)
    }

    /// Per-game details for full syncs. Failures are counted and skipped.
    async fn fetch_details(&self, job: &SyncJob, app_id: i64) -> Option<RemoteGameDetails> {
        match self.fetch(self.catalog.fetch_game_details(app_id)).await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(app_id, error = %e, "Skipping game details");
                self.update_counters(job, |c| c.errors += 1).await;
                None
            }
        }
    }

    /// Apply the fetch deadline to a catalog call
    async fn fetch<T>(
        &self,
        request: impl Future<Output = bridge_traits::error::Result<T>>,
    ) -> std::result::Result<T, BridgeError> {
        let limit = self.config.fetch_timeout;
        timeout(limit, request)
            .await
            .unwrap_or_else(|_| Err(BridgeError::Timeout(limit.as_millis() as u64)))
    }

    async fn update_counters<F>(&self, job: &SyncJob, f: F) -> SyncCounters
    where
        F: FnOnce(&mut SyncCounters),
    {
        self.registry
            .update_counters(&job.user_id, job.id, f)
            .await
            .unwrap_or_default()
    }

    /// Snapshot of the user's active job
    ///
    /// # Errors
    ///
    /// `JobNotFound` if the user has no active job
    pub async fn get_sync_progress(&self, user_id: &str) -> Result<SyncJob> {
        self.registry
            .snapshot(user_id)
            .await
            .ok_or_else(|| SyncError::JobNotFound {
                user_id: user_id.to_string(),
            })
    }

    /// Finished jobs of a user, most recent first
    pub async fn get_sync_history(&self, user_id: &str) -> Vec<SyncHistoryEntry> {
        self.registry.history(user_id).await
    }

    /// Request cancellation of the user's active job
    ///
    /// The job stops at its next checkpoint; games merged so far stay.
    ///
    /// # Errors
    ///
    /// `NoActiveSync` if the user has no active job
    #[instrument(skip(self))]
    pub async fn cancel_sync(&self, user_id: &str) -> Result<SyncJob> {
        let job = self.registry.request_cancel(user_id).await?;
        info!(job_id = %job.id, "Cancellation requested");
        Ok(job)
    }

    /// Snapshots of all active jobs, keyed by user
    pub async fn get_active_syncs(&self) -> HashMap<String, SyncJob> {
        self.registry.active().await
    }

    /// Check if a sync is currently active for a user
    pub async fn is_sync_active(&self, user_id: &str) -> bool {
        self.registry.is_active(user_id).await
    }

    /// Job id of the user's active job
    pub async fn active_job_id(&self, user_id: &str) -> Option<SyncJobId> {
        self.registry.snapshot(user_id).await.map(|job| job.id)
    }
}

fn validate_remote(remote: &RemoteGame) -> std::result::Result<(), &'static str> {
    if remote.app_id <= 0 {
        return Err("app_id must be positive");
    }
    if remote.name.trim().is_empty() {
        return Err("name is empty");
    }
    if remote.playtime_forever < 0 || remote.playtime_recent < 0 {
        return Err("negative playtime");
    }
    Ok(())
}

fn terminal_event(entry: &SyncHistoryEntry, recoverable: bool) -> Option<SyncEvent> {
    let job_id = entry.job_id.to_string();
    let user_id = entry.user_id.clone();
    let counters = entry.counters;

    match entry.status {
        SyncStatus::Succeeded => Some(SyncEvent::Completed {
            job_id,
            user_id,
            games_processed: counters.games_processed,
            games_added: counters.games_added,
            games_updated: counters.games_updated,
            conflicts_detected: counters.conflicts_detected,
            errors: counters.errors,
            duration_secs: entry.duration_secs,
        }),
        SyncStatus::Failed => Some(SyncEvent::Failed {
            job_id,
            user_id,
            message: entry.error_message.clone().unwrap_or_default(),
            games_processed: counters.games_processed,
            recoverable,
        }),
        SyncStatus::Cancelled => Some(SyncEvent::Cancelled {
            job_id,
            user_id,
            games_processed: counters.games_processed,
        }),
        SyncStatus::Pending | SyncStatus::Running => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyCatalog;

    #[async_trait::async_trait]
    impl RemoteCatalog for EmptyCatalog {
        async fn fetch_owned_games(
            &self,
            _user_id: &str,
        ) -> bridge_traits::error::Result<Vec<RemoteGame>> {
            Ok(Vec::new())
        }

        async fn fetch_game_details(
            &self,
            app_id: i64,
        ) -> bridge_traits::error::Result<RemoteGameDetails> {
            Err(BridgeError::NotFound(app_id.to_string()))
        }

        async fn fetch_profile(
            &self,
            user_id: &str,
        ) -> bridge_traits::error::Result<bridge_traits::catalog::RemoteProfile> {
            Err(BridgeError::NotFound(user_id.to_string()))
        }
    }

    #[test]
    fn test_sync_config_from_core_config() {
        let config = CoreConfig::builder()
            .in_memory_database()
            .remote_catalog(Arc::new(EmptyCatalog))
            .max_concurrent_syncs(2)
            .field_policy("playtime_recent", FieldPolicy::RemoteWins)
            .build()
            .unwrap();

        let sync_config = SyncConfig::from_core_config(&config).unwrap();
        assert_eq!(sync_config.max_concurrent_syncs, 2);
        assert_eq!(
            sync_config.field_policies.get(&GameField::PlaytimeRecent),
            Some(&FieldPolicy::RemoteWins)
        );
    }

    #[test]
    fn test_sync_config_rejects_unknown_field() {
        let config = CoreConfig::builder()
            .in_memory_database()
            .remote_catalog(Arc::new(EmptyCatalog))
            .field_policy("hours", FieldPolicy::RemoteWins)
            .build()
            .unwrap();

        assert!(matches!(
            SyncConfig::from_core_config(&config),
            Err(SyncError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_validate_remote() {
        let mut remote = RemoteGame {
            app_id: 10,
            name: "Counter-Strike".to_string(),
            playtime_forever: 0,
            playtime_recent: 0,
            icon_url: None,
        };
        assert!(validate_remote(&remote).is_ok());

        remote.playtime_recent = -3;
        assert!(validate_remote(&remote).is_err());

        remote.playtime_recent = 0;
        remote.name = " ".to_string();
        assert!(validate_remote(&remote).is_err());

        remote.name = "Counter-Strike".to_string();
        remote.app_id = 0;
        assert!(validate_remote(&remote).is_err());
    }

    #[test]
    fn test_terminal_event_matches_status() {
        let job = SyncJob::new("u1", SyncType::Full, 0)
            .start(0)
            .unwrap()
            .fail("manifest gone", 3)
            .unwrap();
        let entry = SyncHistoryEntry::from_job(&job).unwrap();

        match terminal_event(&entry, true) {
            Some(SyncEvent::Failed {
                message,
                recoverable,
                ..
            }) => {
                assert_eq!(message, "manifest gone");
                assert!(recoverable);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
