//! Three-way merge of remote game records into the local library
//!
//! Every syncable field is compared across three values: the local value
//! `l`, the baseline `b` accepted at the previous sync, and the incoming
//! remote value `r`.
//!
//! | Case                      | Effect                                  |
//! |---------------------------|-----------------------------------------|
//! | `l == r`                  | baseline refreshed to `r`               |
//! | `l == b` or `RemoteWins`  | local and baseline overwritten with `r` |
//! | `r == b`                  | local edit stands                       |
//! | otherwise                 | `value-mismatch` conflict, `l` kept     |

use crate::conflict::{ConflictType, NewConflict};
use crate::conflict_resolver::{ConflictResolver, RecordOutcome};
use crate::error::{Result, SyncError};
use bridge_traits::catalog::{RemoteGame, RemoteGameDetails};
use core_library::{
    FieldValue, Game, GameField, GameRepository, Library, LibraryRepository, LibraryStats,
};
use core_runtime::config::FieldPolicy;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// What merging one remote record did to the local library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    Updated { fields: Vec<GameField> },
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub outcome: MergeOutcome,
    /// Conflicts newly registered for this game
    pub conflicts: u64,
    /// The game as stored after the merge
    pub game: Game,
}

pub struct GameMerger {
    games: Arc<dyn GameRepository>,
    resolver: Arc<ConflictResolver>,
    event_bus: EventBus,
    field_policies: HashMap<GameField, FieldPolicy>,
}

impl GameMerger {
    pub fn new(
        games: Arc<dyn GameRepository>,
        resolver: Arc<ConflictResolver>,
        event_bus: EventBus,
        field_policies: HashMap<GameField, FieldPolicy>,
    ) -> Self {
        Self {
            games,
            resolver,
            event_bus,
            field_policies,
        }
    }

    fn policy(&self, field: GameField) -> FieldPolicy {
        self.field_policies.get(&field).copied().unwrap_or_default()
    }

    /// Merge one remote record into its local counterpart.
    ///
    /// The local game is read inside the write guard shared with conflict
    /// resolution, so a resolution landing mid-sync is merged against rather
    /// than overwritten. `details` is only passed by full syncs; without it
    /// the detail fields are left alone.
    ///
    /// Open conflicts on fields that no longer disagree, and ownership
    /// conflicts of a game present in the manifest, are closed.
    pub async fn merge_game(
        &self,
        user_id: &str,
        remote: &RemoteGame,
        details: Option<&RemoteGameDetails>,
        now: i64,
    ) -> Result<MergeReport> {
        let _guard = self.resolver.lock_game_writes().await;

        let Some(mut game) = self.games.find_by_app_id(user_id, remote.app_id).await? else {
            return self.add_game(user_id, remote, details, now).await;
        };

        let mut incoming = vec![
            (GameField::Name, FieldValue::Text(remote.name.clone())),
            (GameField::PlaytimeForever, FieldValue::Int(remote.playtime_forever)),
            (GameField::PlaytimeRecent, FieldValue::Int(remote.playtime_recent)),
            (GameField::IconUrl, remote.icon_url.clone().into()),
        ];
        if let Some(details) = details {
            incoming.extend([
                (GameField::Developer, details.developer.clone().into()),
                (GameField::Publisher, details.publisher.clone().into()),
                (GameField::ReleaseDate, details.release_date.clone().into()),
            ]);
        }

        let mut changed = Vec::new();
        let mut settled = vec![GameField::Owned];
        let mut conflicts = 0;

        for (field, remote_value) in incoming {
            let local_value = game.field_value(field);
            let baseline = game.baseline_value(field);
            let invalid = |message: String| SyncError::InvalidInput {
                field: field.to_string(),
                message,
            };

            if local_value == remote_value {
                if baseline != remote_value {
                    game.set_baseline(field, remote_value).map_err(invalid)?;
                }
                settled.push(field);
                continue;
            }

            if local_value == baseline || self.policy(field) == FieldPolicy::RemoteWins {
                game.set_field(field, remote_value.clone()).map_err(invalid)?;
                game.set_baseline(field, remote_value).map_err(invalid)?;
                changed.push(field);
                settled.push(field);
                continue;
            }

            if remote_value == baseline {
                settled.push(field);
                continue;
            }

            let outcome = self
                .resolver
                .record_conflict(NewConflict {
                    user_id: user_id.to_string(),
                    entity_id: game.id.clone(),
                    app_id: game.app_id,
                    field,
                    local_value,
                    remote_value,
                    conflict_type: ConflictType::ValueMismatch,
                })
                .await;
            if matches!(outcome, RecordOutcome::Created(_)) {
                conflicts += 1;
            }
        }

        game.last_remote_sync = Some(now);
        if !changed.is_empty() {
            game.updated_at = now;
        }

        if !self.games.update(&game).await? {
            debug!(app_id = remote.app_id, "Local game vanished during merge, re-adding");
            return self.add_game(user_id, remote, details, now).await;
        }

        let closed = self.resolver.close_obsolete(&game.id, &settled).await;
        if closed > 0 {
            debug!(app_id = game.app_id, closed, "Closed conflicts that no longer hold");
        }

        let outcome = if changed.is_empty() {
            MergeOutcome::Unchanged
        } else {
            self.event_bus
                .emit(CoreEvent::Library(LibraryEvent::GameUpdated {
                    user_id: user_id.to_string(),
                    app_id: game.app_id,
                    fields: changed.iter().map(|f| f.to_string()).collect(),
                }))
                .ok();
            MergeOutcome::Updated { fields: changed }
        };

        Ok(MergeReport {
            outcome,
            conflicts,
            game,
        })
    }

    async fn add_game(
        &self,
        user_id: &str,
        remote: &RemoteGame,
        details: Option<&RemoteGameDetails>,
        now: i64,
    ) -> Result<MergeReport> {
        let mut game = Game::from_remote(user_id, remote, now);
        if let Some(details) = details {
            game.apply_details(details);
        }
        self.games.insert(&game).await?;

        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::GameAdded {
                user_id: user_id.to_string(),
                app_id: game.app_id,
                name: game.name.clone(),
            }))
            .ok();

        Ok(MergeReport {
            outcome: MergeOutcome::Added,
            conflicts: 0,
            game,
        })
    }

    /// Raise an ownership conflict for every local game absent from the
    /// remote manifest. Nothing is deleted.
    ///
    /// Candidates are re-read first; games removed since `local_games` was
    /// loaded are skipped. Returns the number of conflicts newly registered.
    pub async fn flag_missing_games<'a>(
        &self,
        user_id: &str,
        local_games: impl IntoIterator<Item = &'a Game>,
        remote_app_ids: &HashSet<i64>,
    ) -> u64 {
        let mut created = 0;

        for candidate in local_games {
            if remote_app_ids.contains(&candidate.app_id) {
                continue;
            }

            let _guard = self.resolver.lock_game_writes().await;
            let game = match self.games.find(&candidate.id).await {
                Ok(Some(game)) => game,
                Ok(None) => continue,
                Err(e) => {
                    warn!(app_id = candidate.app_id, error = %e, "Failed to re-read missing game");
                    continue;
                }
            };

            let conflict_type = if game.last_remote_sync.is_some() {
                ConflictType::DeletedRemotely
            } else {
                ConflictType::NewLocally
            };

            let outcome = self
                .resolver
                .record_conflict(NewConflict {
                    user_id: user_id.to_string(),
                    entity_id: game.id.clone(),
                    app_id: game.app_id,
                    field: GameField::Owned,
                    local_value: FieldValue::Bool(true),
                    remote_value: FieldValue::Missing,
                    conflict_type,
                })
                .await;
            if matches!(outcome, RecordOutcome::Created(_)) {
                created += 1;
            }
        }

        created
    }
}

/// Recompute a library's aggregate stats from its full game set.
///
/// `finish` runs on the library just before it is saved. Returns `None` when
/// the user has no library.
pub(crate) async fn recompute_library_stats<F>(
    libraries: &dyn LibraryRepository,
    games: &dyn GameRepository,
    event_bus: &EventBus,
    user_id: &str,
    now: i64,
    finish: F,
) -> Result<Option<Library>>
where
    F: FnOnce(&mut Library),
{
    let Some(mut library) = libraries.find_by_user_id(user_id).await? else {
        warn!(user_id, "No library to recompute stats for");
        return Ok(None);
    };

    let all_games = games.find_by_user_id(user_id).await?;
    let stats = LibraryStats::from_games(&all_games);
    library.apply_stats(&stats, now);
    finish(&mut library);
    libraries.update(&library).await?;

    event_bus
        .emit(CoreEvent::Library(LibraryEvent::StatsRecomputed {
            user_id: user_id.to_string(),
            total_games: stats.total_games,
            total_playtime: stats.total_playtime,
        }))
        .ok();

    Ok(Some(library))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictStatus, ResolutionStrategy};
    use crate::conflict_resolver::{ConflictFilter, SYSTEM_RESOLVER};
    use bridge_traits::time::ManualClock;
    use core_library::db::create_test_pool;
    use core_library::{SqliteGameRepository, SqliteLibraryRepository};

    struct Fixture {
        merger: GameMerger,
        resolver: Arc<ConflictResolver>,
        games: Arc<SqliteGameRepository>,
    }

    async fn fixture(field_policies: HashMap<GameField, FieldPolicy>) -> Fixture {
        let pool = create_test_pool().await.unwrap();
        let games = Arc::new(SqliteGameRepository::new(pool.clone()));
        let libraries = Arc::new(SqliteLibraryRepository::new(pool));
        let bus = EventBus::new(64);
        let resolver = Arc::new(ConflictResolver::new(
            games.clone(),
            libraries,
            Arc::new(ManualClock::new(1_000)),
            bus.clone(),
            100,
        ));
        let merger = GameMerger::new(games.clone(), resolver.clone(), bus, field_policies);
        Fixture {
            merger,
            resolver,
            games,
        }
    }

    fn remote(app_id: i64, playtime: i64) -> RemoteGame {
        RemoteGame {
            app_id,
            name: format!("Game {}", app_id),
            playtime_forever: playtime,
            playtime_recent: 0,
            icon_url: None,
        }
    }

    async fn stored(games: &SqliteGameRepository, app_id: i64, playtime: i64) -> Game {
        let game = Game::from_remote("u1", &remote(app_id, playtime), 0);
        games.insert(&game).await.unwrap();
        game
    }

    #[tokio::test]
    async fn test_new_remote_game_is_added_without_conflict() {
        let f = fixture(HashMap::new()).await;

        let report = f
            .merger
            .merge_game("u1", &remote(10, 5), None, 100)
            .await
            .unwrap();

        assert_eq!(report.outcome, MergeOutcome::Added);
        assert_eq!(report.conflicts, 0);
        assert_eq!(f.games.count_by_user_id("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_untouched_field_is_overwritten() {
        let f = fixture(HashMap::new()).await;
        let game = stored(&f.games, 10, 100).await;

        let report = f
            .merger
            .merge_game("u1", &remote(10, 150), None, 100)
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            MergeOutcome::Updated {
                fields: vec![GameField::PlaytimeForever]
            }
        );
        let found = f.games.find(&game.id).await.unwrap().unwrap();
        assert_eq!(found.playtime_forever, 150);
        assert_eq!(found.synced_playtime_forever, Some(150));
        assert_eq!(found.last_remote_sync, Some(100));
        assert!(f.resolver.get_conflicts(&ConflictFilter::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_divergent_edit_raises_conflict_and_keeps_local() {
        let f = fixture(HashMap::new()).await;
        let mut game = stored(&f.games, 20, 100).await;
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(40), 5)
            .unwrap();
        f.games.update(&game).await.unwrap();

        let report = f
            .merger
            .merge_game("u1", &remote(20, 200), None, 100)
            .await
            .unwrap();

        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert_eq!(report.conflicts, 1);
        let found = f.games.find(&game.id).await.unwrap().unwrap();
        assert_eq!(found.playtime_forever, 40);

        let conflicts = f.resolver.get_conflicts(&ConflictFilter::default()).await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].local_value, FieldValue::Int(40));
        assert_eq!(conflicts[0].remote_value, FieldValue::Int(200));
        assert_eq!(conflicts[0].status, ConflictStatus::Open);
    }

    #[tokio::test]
    async fn test_local_edit_stands_when_remote_did_not_move() {
        let f = fixture(HashMap::new()).await;
        let mut game = stored(&f.games, 20, 100).await;
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(40), 5)
            .unwrap();
        f.games.update(&game).await.unwrap();

        let report = f
            .merger
            .merge_game("u1", &remote(20, 100), None, 100)
            .await
            .unwrap();

        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert_eq!(report.conflicts, 0);
        assert_eq!(report.game.playtime_forever, 40);
    }

    #[tokio::test]
    async fn test_remote_wins_policy_overrides_local_edit() {
        let mut policies = HashMap::new();
        policies.insert(GameField::PlaytimeForever, FieldPolicy::RemoteWins);
        let f = fixture(policies).await;
        let mut game = stored(&f.games, 20, 100).await;
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(40), 5)
            .unwrap();
        f.games.update(&game).await.unwrap();

        let report = f
            .merger
            .merge_game("u1", &remote(20, 200), None, 100)
            .await
            .unwrap();

        assert_eq!(report.conflicts, 0);
        assert_eq!(report.game.playtime_forever, 200);
    }

    #[tokio::test]
    async fn test_details_only_merged_when_given() {
        let f = fixture(HashMap::new()).await;
        stored(&f.games, 30, 0).await;
        let details = RemoteGameDetails {
            app_id: 30,
            developer: Some("Valve".to_string()),
            ..Default::default()
        };

        let incremental = f
            .merger
            .merge_game("u1", &remote(30, 0), None, 100)
            .await
            .unwrap();
        assert_eq!(incremental.game.developer, None);

        let full = f
            .merger
            .merge_game("u1", &remote(30, 0), Some(&details), 200)
            .await
            .unwrap();
        assert_eq!(full.game.developer.as_deref(), Some("Valve"));
        assert_eq!(
            full.outcome,
            MergeOutcome::Updated {
                fields: vec![GameField::Developer]
            }
        );
    }

    #[tokio::test]
    async fn test_missing_games_are_classified_not_deleted() {
        let f = fixture(HashMap::new()).await;
        let synced = stored(&f.games, 40, 10).await;
        let local_only = Game::new("u1", 41, "Homebrew", 0);
        f.games.insert(&local_only).await.unwrap();
        let present = stored(&f.games, 42, 10).await;

        let manifest: HashSet<i64> = [present.app_id].into_iter().collect();
        let local = vec![synced.clone(), local_only.clone(), present];

        assert_eq!(f.merger.flag_missing_games("u1", &local, &manifest).await, 2);
        // second pass refreshes instead of duplicating
        assert_eq!(f.merger.flag_missing_games("u1", &local, &manifest).await, 0);

        let conflicts = f.resolver.get_conflicts(&ConflictFilter::default()).await;
        assert_eq!(conflicts.len(), 2);
        let deleted = conflicts
            .iter()
            .find(|c| c.entity_id == synced.id)
            .unwrap();
        assert_eq!(deleted.conflict_type, ConflictType::DeletedRemotely);
        let new_locally = conflicts
            .iter()
            .find(|c| c.entity_id == local_only.id)
            .unwrap();
        assert_eq!(new_locally.conflict_type, ConflictType::NewLocally);

        assert_eq!(f.games.count_by_user_id("u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_merge_after_keep_remote_sees_resolved_row() {
        let f = fixture(HashMap::new()).await;
        let mut game = stored(&f.games, 20, 100).await;
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(40), 5)
            .unwrap();
        f.games.update(&game).await.unwrap();
        f.merger
            .merge_game("u1", &remote(20, 200), None, 100)
            .await
            .unwrap();

        let conflict = f.resolver.get_conflicts(&ConflictFilter::default()).await.remove(0);
        f.resolver
            .resolve_conflict(&conflict.id.to_string(), ResolutionStrategy::KeepRemote, "alice")
            .await
            .unwrap();

        let report = f
            .merger
            .merge_game("u1", &remote(20, 200), None, 200)
            .await
            .unwrap();

        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert_eq!(report.conflicts, 0);
        assert_eq!(report.game.playtime_forever, 200);
        assert_eq!(f.resolver.get_statistics().await.total_detected, 1);
    }

    #[tokio::test]
    async fn test_agreeing_values_close_open_mismatch() {
        let f = fixture(HashMap::new()).await;
        let mut game = stored(&f.games, 20, 100).await;
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(40), 5)
            .unwrap();
        f.games.update(&game).await.unwrap();

        f.merger
            .merge_game("u1", &remote(20, 200), None, 100)
            .await
            .unwrap();
        let report = f
            .merger
            .merge_game("u1", &remote(20, 40), None, 200)
            .await
            .unwrap();

        assert_eq!(report.conflicts, 0);
        assert_eq!(report.game.synced_playtime_forever, Some(40));
        let conflicts = f.resolver.get_conflicts(&ConflictFilter::default()).await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].status, ConflictStatus::Resolved);
        let resolution = conflicts[0].resolution.as_ref().unwrap();
        assert_eq!(resolution.resolved_by, SYSTEM_RESOLVER);

        // the disagreement can be raised again later
        f.merger
            .merge_game("u1", &remote(20, 300), None, 300)
            .await
            .unwrap();
        let mut game = f.games.find(&game.id).await.unwrap().unwrap();
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(10), 305)
            .unwrap();
        f.games.update(&game).await.unwrap();
        let report = f
            .merger
            .merge_game("u1", &remote(20, 200), None, 400)
            .await
            .unwrap();
        assert_eq!(report.conflicts, 1);
    }

    #[tokio::test]
    async fn test_returning_game_closes_ownership_conflict() {
        let f = fixture(HashMap::new()).await;
        let game = stored(&f.games, 40, 10).await;

        f.merger
            .flag_missing_games("u1", [&game], &HashSet::new())
            .await;
        let report = f
            .merger
            .merge_game("u1", &remote(40, 10), None, 100)
            .await
            .unwrap();

        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        let open = f
            .resolver
            .get_conflicts(&ConflictFilter::default().with_status(ConflictStatus::Open))
            .await;
        assert!(open.is_empty());

        // gone again: raised anew rather than suppressed
        let created = f
            .merger
            .flag_missing_games("u1", [&report.game], &HashSet::new())
            .await;
        assert_eq!(created, 1);
    }
}
