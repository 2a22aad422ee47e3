//! Conflict Resolver
//!
//! Registry of detected conflicts and the policies that settle them.
//!
//! ## Overview
//!
//! The merge engine records a conflict whenever a field was edited locally
//! and remotely since the previous sync, or when a game is missing from the
//! remote manifest. Conflicts stay `open` until a caller resolves or ignores
//! them, or a later sync finds the values agree again. Resolution writes the
//! chosen value through the game repository:
//!
//! - **keep-local**: the local value stands; the remote value is acknowledged
//!   as the new sync baseline so it is not raised again
//! - **keep-remote**: the local value is overwritten (or the game deleted for
//!   ownership conflicts)
//! - **merge**: numeric fields take the larger value, text fields the remote one
//!
//! ## Usage
//!
//! ```no_run
//! use core_sync::conflict::{ResolutionStrategy, ConflictStatus};
//! use core_sync::conflict_resolver::{ConflictFilter, ConflictResolver};
//!
//! # async fn example(resolver: ConflictResolver) -> core_sync::Result<()> {
//! let open = resolver
//!     .get_conflicts(&ConflictFilter::default().with_status(ConflictStatus::Open))
//!     .await;
//!
//! for conflict in open {
//!     resolver
//!         .resolve_conflict(&conflict.id.to_string(), ResolutionStrategy::KeepLocal, "alice")
//!         .await?;
//! }
//!
//! // Whatever is left gets the default policy
//! let summary = resolver.auto_resolve_conflicts().await;
//! println!("auto-resolved {}", summary.resolved);
//! # Ok(())
//! # }
//! ```

use crate::conflict::{
    Conflict, ConflictId, ConflictStatus, ConflictType, NewConflict, ResolutionStrategy,
};
use crate::error::{Result, SyncError};
use crate::merge::recompute_library_stats;
use bridge_traits::time::Clock;
use core_library::{FieldValue, GameField, GameRepository, LibraryRepository};
use core_runtime::events::{ConflictEvent, CoreEvent, EventBus, LibraryEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// Identity used for resolutions applied by [`ConflictResolver::auto_resolve_conflicts`]
/// and for conflicts a sync closes as obsolete
pub const SYSTEM_RESOLVER: &str = "system";

/// Result of [`ConflictResolver::record_conflict`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new open conflict was registered
    Created(ConflictId),
    /// An open conflict on the same field already existed and was refreshed
    Refreshed(ConflictId),
    /// The same disagreement was already settled in favour of the local side
    Suppressed,
}

/// Optional filters for [`ConflictResolver::get_conflicts`]; `None` means any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictFilter {
    pub user_id: Option<String>,
    pub status: Option<ConflictStatus>,
    pub conflict_type: Option<ConflictType>,
}

impl ConflictFilter {
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: ConflictStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, conflict_type: ConflictType) -> Self {
        self.conflict_type = Some(conflict_type);
        self
    }

    fn matches(&self, conflict: &Conflict) -> bool {
        self.user_id
            .as_deref()
            .map_or(true, |user_id| conflict.user_id == user_id)
            && self.status.map_or(true, |status| conflict.status == status)
            && self
                .conflict_type
                .map_or(true, |conflict_type| conflict.conflict_type == conflict_type)
    }
}

/// One resolution applied by the automatic policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedResolution {
    pub conflict_id: ConflictId,
    pub conflict_type: ConflictType,
    pub strategy: ResolutionStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResolveSummary {
    pub resolved: u64,
    /// Conflicts whose resolution failed; they remain open
    pub failed: u64,
    pub applied: Vec<AppliedResolution>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictStatistics {
    pub total_detected: u64,
    pub total_open: u64,
    pub total_resolved: u64,
    pub total_ignored: u64,
    pub by_type: BTreeMap<ConflictType, u64>,
}

/// Conflict registry and resolution engine
pub struct ConflictResolver {
    /// Insertion order, which is detection order
    conflicts: Mutex<Vec<Conflict>>,
    /// Serializes read-modify-write cycles on game rows between merges and
    /// resolutions. Always taken before `conflicts`.
    game_writes: Mutex<()>,
    games: Arc<dyn GameRepository>,
    libraries: Arc<dyn LibraryRepository>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    closed_conflict_limit: usize,
}

impl ConflictResolver {
    pub fn new(
        games: Arc<dyn GameRepository>,
        libraries: Arc<dyn LibraryRepository>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        closed_conflict_limit: usize,
    ) -> Self {
        Self {
            conflicts: Mutex::new(Vec::new()),
            game_writes: Mutex::new(()),
            games,
            libraries,
            clock,
            event_bus,
            closed_conflict_limit,
        }
    }

    /// Register a conflict found by the merge engine.
    ///
    /// An open conflict on the same (game, field, type) is refreshed with the
    /// latest values rather than duplicated.
    #[instrument(skip(self, new), fields(user_id = %new.user_id, app_id = new.app_id, field = %new.field))]
    pub async fn record_conflict(&self, new: NewConflict) -> RecordOutcome {
        let mut conflicts = self.conflicts.lock().await;

        if let Some(existing) = conflicts.iter_mut().find(|c| c.matches_open(&new)) {
            debug!(conflict_id = %existing.id, "Refreshing open conflict");
            existing.local_value = new.local_value;
            existing.remote_value = new.remote_value;
            return RecordOutcome::Refreshed(existing.id);
        }

        if conflicts.iter().any(|c| c.settles(&new)) {
            debug!("Conflict already settled locally, not raising again");
            return RecordOutcome::Suppressed;
        }

        let conflict = Conflict::open(new, self.clock.unix_timestamp());
        let id = conflict.id;
        info!(
            conflict_id = %id,
            conflict_type = %conflict.conflict_type,
            "Conflict detected"
        );
        self.event_bus
            .emit(CoreEvent::Conflict(ConflictEvent::Detected {
                conflict_id: id.to_string(),
                user_id: conflict.user_id.clone(),
                entity_id: conflict.entity_id.clone(),
                field: conflict.field.to_string(),
                conflict_type: conflict.conflict_type.to_string(),
            }))
            .ok();
        conflicts.push(conflict);

        RecordOutcome::Created(id)
    }

    /// Guard held by the merge engine while it reads, merges and writes back
    /// one game.
    pub(crate) async fn lock_game_writes(&self) -> MutexGuard<'_, ()> {
        self.game_writes.lock().await
    }

    /// Close the open conflicts on `fields` of a game that a sync found to be
    /// obsolete: the values agree again, or the game is back in the remote
    /// manifest.
    ///
    /// Nothing is written to the library. The conflicts are marked resolved
    /// as keep-remote by [`SYSTEM_RESOLVER`], so the same disagreement is
    /// raised again if it comes back. Returns the number closed.
    pub(crate) async fn close_obsolete(&self, entity_id: &str, fields: &[GameField]) -> usize {
        let now = self.clock.unix_timestamp();
        let mut conflicts = self.conflicts.lock().await;
        let mut closed = 0;

        for conflict in conflicts
            .iter_mut()
            .filter(|c| c.is_open() && c.entity_id == entity_id && fields.contains(&c.field))
        {
            if conflict
                .resolve(ResolutionStrategy::KeepRemote, SYSTEM_RESOLVER, now)
                .is_err()
            {
                continue;
            }
            closed += 1;
            info!(
                conflict_id = %conflict.id,
                conflict_type = %conflict.conflict_type,
                "Conflict no longer holds, closed"
            );
            self.event_bus
                .emit(CoreEvent::Conflict(ConflictEvent::Resolved {
                    conflict_id: conflict.id.to_string(),
                    strategy: ResolutionStrategy::KeepRemote.to_string(),
                    resolved_by: SYSTEM_RESOLVER.to_string(),
                }))
                .ok();
        }

        closed
    }

    /// Conflicts matching `filter`, ordered by detection time
    pub async fn get_conflicts(&self, filter: &ConflictFilter) -> Vec<Conflict> {
        let conflicts = self.conflicts.lock().await;
        let mut matching: Vec<Conflict> = conflicts
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.detected_at);
        matching
    }

    pub async fn get_conflict(&self, conflict_id: &str) -> Result<Conflict> {
        let id = ConflictId::from_string(conflict_id)?;
        let conflicts = self.conflicts.lock().await;
        conflicts
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| SyncError::ConflictNotFound {
                conflict_id: conflict_id.to_string(),
            })
    }

    /// Apply `strategy` to an open conflict and mark it resolved.
    ///
    /// # Errors
    ///
    /// - `ConflictNotFound` if the id is unknown
    /// - `AlreadyResolved` if the conflict is not open
    /// - `Library` if writing the resolved value fails; the conflict stays open
    #[instrument(skip(self))]
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        strategy: ResolutionStrategy,
        resolved_by: &str,
    ) -> Result<Conflict> {
        let id = ConflictId::from_string(conflict_id)?;

        // Held across the repository write so a conflict is settled at most
        // once and a running merge cannot write back a stale row over it
        let game_writes = self.game_writes.lock().await;
        let mut conflicts = self.conflicts.lock().await;
        let conflict = conflicts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| SyncError::ConflictNotFound {
                conflict_id: conflict_id.to_string(),
            })?;

        if !conflict.is_open() {
            return Err(SyncError::AlreadyResolved {
                conflict_id: conflict_id.to_string(),
                status: conflict.status.to_string(),
            });
        }

        let now = self.clock.unix_timestamp();
        let library_changed = self.apply_resolution(conflict, strategy, now).await?;
        conflict.resolve(strategy, resolved_by, now)?;
        let resolved = conflict.clone();
        drop(conflicts);
        drop(game_writes);

        if library_changed {
            recompute_library_stats(
                self.libraries.as_ref(),
                self.games.as_ref(),
                &self.event_bus,
                &resolved.user_id,
                now,
                |_| {},
            )
            .await?;
        }

        info!(conflict_id = %resolved.id, resolved_by, "Conflict resolved");
        self.event_bus
            .emit(CoreEvent::Conflict(ConflictEvent::Resolved {
                conflict_id: resolved.id.to_string(),
                strategy: strategy.to_string(),
                resolved_by: resolved_by.to_string(),
            }))
            .ok();

        Ok(resolved)
    }

    /// Close an open conflict without touching any data.
    #[instrument(skip(self))]
    pub async fn ignore_conflict(&self, conflict_id: &str, resolved_by: &str) -> Result<Conflict> {
        let id = ConflictId::from_string(conflict_id)?;
        let mut conflicts = self.conflicts.lock().await;
        let conflict = conflicts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| SyncError::ConflictNotFound {
                conflict_id: conflict_id.to_string(),
            })?;

        conflict.ignore(resolved_by, self.clock.unix_timestamp())?;
        info!(conflict_id = %conflict.id, resolved_by, "Conflict ignored");
        Ok(conflict.clone())
    }

    /// Settle every open conflict with the default strategy for its type.
    ///
    /// Failures are counted and leave the conflict open; they never abort
    /// the remaining resolutions.
    #[instrument(skip(self))]
    pub async fn auto_resolve_conflicts(&self) -> AutoResolveSummary {
        let open: Vec<(ConflictId, ConflictType)> = {
            let conflicts = self.conflicts.lock().await;
            conflicts
                .iter()
                .filter(|c| c.is_open())
                .map(|c| (c.id, c.conflict_type))
                .collect()
        };

        let mut summary = AutoResolveSummary::default();
        for (id, conflict_type) in open {
            let strategy = ResolutionStrategy::default_for(conflict_type);
            match self
                .resolve_conflict(&id.to_string(), strategy, SYSTEM_RESOLVER)
                .await
            {
                Ok(_) => {
                    summary.resolved += 1;
                    summary.applied.push(AppliedResolution {
                        conflict_id: id,
                        conflict_type,
                        strategy,
                    });
                }
                // Closed by someone else since the snapshot
                Err(SyncError::AlreadyResolved { .. }) | Err(SyncError::ConflictNotFound { .. }) => {}
                Err(e) => {
                    warn!(conflict_id = %id, error = %e, "Automatic resolution failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            resolved = summary.resolved,
            failed = summary.failed,
            "Automatic conflict resolution finished"
        );
        self.event_bus
            .emit(CoreEvent::Conflict(ConflictEvent::AutoResolved {
                resolved: summary.resolved,
                failed: summary.failed,
            }))
            .ok();

        summary
    }

    /// Counts over the conflicts currently held
    pub async fn get_statistics(&self) -> ConflictStatistics {
        let conflicts = self.conflicts.lock().await;

        let mut stats = ConflictStatistics::default();
        for conflict_type in [
            ConflictType::ValueMismatch,
            ConflictType::DeletedRemotely,
            ConflictType::NewLocally,
        ] {
            stats.by_type.insert(conflict_type, 0);
        }

        for conflict in conflicts.iter() {
            stats.total_detected += 1;
            match conflict.status {
                ConflictStatus::Open => stats.total_open += 1,
                ConflictStatus::Resolved => stats.total_resolved += 1,
                ConflictStatus::Ignored => stats.total_ignored += 1,
            }
            *stats.by_type.entry(conflict.conflict_type).or_insert(0) += 1;
        }

        stats
    }

    /// Drop the oldest closed conflicts beyond the retention cap.
    ///
    /// Returns the number of conflicts removed. Open conflicts are never purged.
    pub async fn purge_closed_conflicts(&self) -> usize {
        let mut conflicts = self.conflicts.lock().await;

        let mut closed: Vec<(i64, ConflictId)> = conflicts
            .iter()
            .filter(|c| !c.is_open())
            .map(|c| {
                let closed_at = c
                    .resolution
                    .as_ref()
                    .map_or(c.detected_at, |r| r.resolved_at);
                (closed_at, c.id)
            })
            .collect();

        if closed.len() <= self.closed_conflict_limit {
            return 0;
        }

        closed.sort_by_key(|(closed_at, _)| *closed_at);
        let excess = closed.len() - self.closed_conflict_limit;
        let doomed: Vec<ConflictId> = closed.into_iter().take(excess).map(|(_, id)| id).collect();

        conflicts.retain(|c| !doomed.contains(&c.id));
        debug!(removed = excess, "Purged closed conflicts");
        excess
    }

    /// Write the outcome of `strategy` for `conflict`.
    ///
    /// Returns whether the library's game set or playtimes changed.
    async fn apply_resolution(
        &self,
        conflict: &Conflict,
        strategy: ResolutionStrategy,
        now: i64,
    ) -> Result<bool> {
        let Some(mut game) = self.games.find(&conflict.entity_id).await? else {
            debug!(entity_id = %conflict.entity_id, "Game no longer exists, nothing to write");
            return Ok(false);
        };

        match (conflict.conflict_type, strategy) {
            (ConflictType::ValueMismatch, strategy) => {
                let field = conflict.field;
                let settled = match strategy {
                    ResolutionStrategy::KeepLocal => None,
                    ResolutionStrategy::KeepRemote => Some(conflict.remote_value.clone()),
                    ResolutionStrategy::Merge => Some(merged_value(conflict)),
                };

                let invalid = |message: String| SyncError::InvalidInput {
                    field: field.to_string(),
                    message,
                };

                game.set_baseline(field, conflict.remote_value.clone())
                    .map_err(invalid)?;
                let changed = settled.is_some();
                if let Some(value) = settled {
                    game.set_field(field, value).map_err(invalid)?;
                    game.updated_at = now;
                }
                self.games.update(&game).await?;

                if changed {
                    self.event_bus
                        .emit(CoreEvent::Library(LibraryEvent::GameUpdated {
                            user_id: game.user_id.clone(),
                            app_id: game.app_id,
                            fields: vec![field.to_string()],
                        }))
                        .ok();
                }
                Ok(changed && field.is_numeric())
            }
            (
                ConflictType::DeletedRemotely | ConflictType::NewLocally,
                ResolutionStrategy::KeepRemote,
            ) => {
                self.games.delete(&game.id).await?;
                info!(app_id = game.app_id, "Removed game no longer owned remotely");
                self.event_bus
                    .emit(CoreEvent::Library(LibraryEvent::GameRemoved {
                        user_id: game.user_id.clone(),
                        app_id: game.app_id,
                    }))
                    .ok();
                Ok(true)
            }
            (ConflictType::DeletedRemotely | ConflictType::NewLocally, _) => Ok(false),
        }
    }
}

fn merged_value(conflict: &Conflict) -> FieldValue {
    if conflict.field.is_numeric() {
        if let (Some(local), Some(remote)) = (
            conflict.local_value.as_int(),
            conflict.remote_value.as_int(),
        ) {
            return FieldValue::Int(local.max(remote));
        }
    }
    conflict.remote_value.clone()
}
