//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided remote catalog and the SQLite library
//! store into the sync core, and exposes the named operations a request
//! router calls into.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//! use serde_json::json;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/library.db")
//!     .remote_catalog(catalog)
//!     .build()?;
//! let service = CoreService::bootstrap(config).await?;
//!
//! let started = service
//!     .dispatch("sync_library", json!({ "user_id": "u1", "sync_type": "full" }))
//!     .await?;
//! ```
//!
//! `dispatch` owns parameter parsing and validation; the typed methods on
//! [`CoreService`] are the same operations for Rust callers.

pub mod error;
pub mod requests;
pub mod responses;

pub use error::{codes, Result, ServiceError};
pub use requests::{
    GetConflictsParams, IgnoreConflictParams, NoParams, ResolveConflictParams, SyncLibraryParams,
    UserParams,
};
pub use responses::{
    ActiveSyncs, AutoResolveResult, CancelRequested, ConflictClosed, ConflictList,
    ConflictStatisticsResult, ConflictsPurged, SyncHistory, SyncProgress, SyncStarted,
};

use std::sync::Arc;

use core_library::db::{create_pool, DatabaseConfig};
use core_library::{SqliteGameRepository, SqliteLibraryRepository};
use core_runtime::config::{CoreConfig, DatabaseLocation};
use core_runtime::events::{EventBus, EventStream};
use core_sync::{ConflictResolver, SyncConfig, SyncCoordinator};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Every method `dispatch` routes
pub const METHODS: &[&str] = &[
    "sync_library",
    "get_sync_progress",
    "get_sync_history",
    "cancel_sync",
    "get_active_syncs",
    "get_conflicts",
    "resolve_conflict",
    "ignore_conflict",
    "auto_resolve_conflicts",
    "get_conflict_statistics",
    "purge_conflicts",
];

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    coordinator: Arc<SyncCoordinator>,
    resolver: Arc<ConflictResolver>,
    event_bus: EventBus,
}

impl CoreService {
    /// Create a service around an already wired coordinator.
    pub fn new(coordinator: Arc<SyncCoordinator>, event_bus: EventBus) -> Self {
        let resolver = Arc::clone(coordinator.resolver());
        Self {
            coordinator,
            resolver,
            event_bus,
        }
    }

    /// Open the database, apply migrations and wire the sync core.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let sync_config = SyncConfig::from_core_config(&config)?;

        let db_config = match &config.database {
            DatabaseLocation::File(path) => DatabaseConfig::new(path.clone()),
            DatabaseLocation::InMemory => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(db_config).await?;

        let games = Arc::new(SqliteGameRepository::new(pool.clone()));
        let libraries = Arc::new(SqliteLibraryRepository::new(pool));
        let event_bus = EventBus::new(config.event_buffer_size);

        let resolver = Arc::new(ConflictResolver::new(
            games.clone(),
            libraries.clone(),
            config.clock.clone(),
            event_bus.clone(),
            config.closed_conflict_limit,
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            sync_config,
            config.remote_catalog.clone(),
            libraries,
            games,
            resolver,
            event_bus.clone(),
            config.clock.clone(),
        ));

        info!(
            workers = config.max_concurrent_syncs,
            database = ?config.database,
            "Core service ready"
        );

        Ok(Self::new(coordinator, event_bus))
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn resolver(&self) -> Arc<ConflictResolver> {
        Arc::clone(&self.resolver)
    }

    /// Subscribe to sync, conflict and library events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    // ========================================================================
    // Operation Routing
    // ========================================================================

    /// Route a named method with a flat parameter object.
    ///
    /// `null` params are treated as an empty object. Unknown methods fail
    /// with `-32601`, malformed or invalid params with `-32602`.
    #[instrument(skip(self, params))]
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        let result = match method {
            "sync_library" => to_value(self.sync_library(parse(method, params)?).await?),
            "get_sync_progress" => to_value(self.get_sync_progress(parse(method, params)?).await?),
            "get_sync_history" => to_value(self.get_sync_history(parse(method, params)?).await?),
            "cancel_sync" => to_value(self.cancel_sync(parse(method, params)?).await?),
            "get_active_syncs" => {
                parse::<NoParams>(method, params)?;
                to_value(self.get_active_syncs().await)
            }
            "get_conflicts" => to_value(self.get_conflicts(parse(method, params)?).await?),
            "resolve_conflict" => to_value(self.resolve_conflict(parse(method, params)?).await?),
            "ignore_conflict" => to_value(self.ignore_conflict(parse(method, params)?).await?),
            "auto_resolve_conflicts" => {
                parse::<NoParams>(method, params)?;
                to_value(self.auto_resolve_conflicts().await)
            }
            "get_conflict_statistics" => {
                parse::<NoParams>(method, params)?;
                to_value(self.get_conflict_statistics().await)
            }
            "purge_conflicts" => {
                parse::<NoParams>(method, params)?;
                to_value(self.purge_conflicts().await)
            }
            _ => Err(ServiceError::method_not_found(method)),
        };

        if let Err(e) = &result {
            warn!(code = e.code, kind = ?e.kind, "{}", e.message);
        }
        result
    }

    // ========================================================================
    // Sync Operations
    // ========================================================================

    pub async fn sync_library(&self, params: SyncLibraryParams) -> Result<SyncStarted> {
        let (user_id, sync_type) = params.validate()?;
        let job = self.coordinator.start_sync(user_id, sync_type).await?;
        debug!(job_id = %job.id, "Sync submitted");
        Ok(job.into())
    }

    pub async fn get_sync_progress(&self, params: UserParams) -> Result<SyncProgress> {
        let user_id = params.validate()?;
        Ok(self.coordinator.get_sync_progress(user_id).await?.into())
    }

    pub async fn get_sync_history(&self, params: UserParams) -> Result<SyncHistory> {
        let user_id = params.validate()?;
        Ok(SyncHistory {
            user_id: user_id.to_string(),
            entries: self.coordinator.get_sync_history(user_id).await,
        })
    }

    pub async fn cancel_sync(&self, params: UserParams) -> Result<CancelRequested> {
        let user_id = params.validate()?;
        Ok(self.coordinator.cancel_sync(user_id).await?.into())
    }

    pub async fn get_active_syncs(&self) -> ActiveSyncs {
        self.coordinator.get_active_syncs().await.into()
    }

    // ========================================================================
    // Conflict Operations
    // ========================================================================

    pub async fn get_conflicts(&self, params: GetConflictsParams) -> Result<ConflictList> {
        let filter = params.validate()?;
        Ok(self.resolver.get_conflicts(&filter).await.into())
    }

    pub async fn resolve_conflict(&self, params: ResolveConflictParams) -> Result<ConflictClosed> {
        let (conflict_id, strategy, resolved_by) = params.validate()?;
        let conflict = self
            .resolver
            .resolve_conflict(conflict_id, strategy, resolved_by)
            .await?;
        Ok(ConflictClosed { conflict })
    }

    pub async fn ignore_conflict(&self, params: IgnoreConflictParams) -> Result<ConflictClosed> {
        let (conflict_id, resolved_by) = params.validate()?;
        let conflict = self
            .resolver
            .ignore_conflict(conflict_id, resolved_by)
            .await?;
        Ok(ConflictClosed { conflict })
    }

    pub async fn auto_resolve_conflicts(&self) -> AutoResolveResult {
        self.resolver.auto_resolve_conflicts().await
    }

    pub async fn get_conflict_statistics(&self) -> ConflictStatisticsResult {
        self.resolver.get_statistics().await
    }

    pub async fn purge_conflicts(&self) -> ConflictsPurged {
        ConflictsPurged {
            removed: self.resolver.purge_closed_conflicts().await,
        }
    }
}

fn parse<T: DeserializeOwned>(method: &str, params: Value) -> Result<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params)
        .map_err(|e| ServiceError::invalid_params(format!("Invalid params for {}: {}", method, e)))
}

fn to_value<T: Serialize>(result: T) -> Result<Value> {
    serde_json::to_value(result)
        .map_err(|e| ServiceError::internal(format!("Failed to serialize result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::time::ManualClock;
    use bridge_traits::{RemoteCatalog, RemoteGame, RemoteGameDetails, RemoteProfile};
    use serde_json::json;
    use std::time::Duration;

    struct FixedCatalog {
        games: Vec<RemoteGame>,
    }

    #[async_trait]
    impl RemoteCatalog for FixedCatalog {
        async fn fetch_owned_games(&self, _user_id: &str) -> BridgeResult<Vec<RemoteGame>> {
            Ok(self.games.clone())
        }

        async fn fetch_game_details(&self, app_id: i64) -> BridgeResult<RemoteGameDetails> {
            Err(BridgeError::NotFound(format!("app {}", app_id)))
        }

        async fn fetch_profile(&self, user_id: &str) -> BridgeResult<RemoteProfile> {
            Ok(RemoteProfile {
                user_id: user_id.to_string(),
                username: "player".to_string(),
                profile_url: None,
                avatar_url: None,
                is_public: true,
            })
        }
    }

    async fn service(games: Vec<RemoteGame>) -> CoreService {
        let config = CoreConfig::builder()
            .in_memory_database()
            .remote_catalog(Arc::new(FixedCatalog { games }))
            .clock(Arc::new(ManualClock::new(1_700_000_000)))
            .retry_backoff(Duration::from_millis(1))
            .build()
            .unwrap();
        CoreService::bootstrap(config).await.unwrap()
    }

    async fn wait_for_idle(service: &CoreService, user_id: &str) {
        let coordinator = service.coordinator();
        tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.is_sync_active(user_id).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn game(app_id: i64) -> RemoteGame {
        RemoteGame {
            app_id,
            name: format!("Game {}", app_id),
            playtime_forever: 60,
            playtime_recent: 0,
            icon_url: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let service = service(Vec::new()).await;
        let err = service
            .dispatch("delete_everything", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_and_malformed_params() {
        let service = service(Vec::new()).await;

        let err = service.dispatch("sync_library", json!({})).await.unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert!(err.message.starts_with("Invalid params for sync_library"));

        let err = service
            .dispatch("sync_library", json!({ "user_id": 42 }))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);

        let err = service
            .dispatch("sync_library", json!({ "user_id": "u1", "sync_type": "partial" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert_eq!(err.message, "Invalid sync type: partial");
    }

    #[tokio::test]
    async fn test_sync_round_trip_through_dispatch() {
        let service = service(vec![game(10), game(20)]).await;

        let started = service
            .dispatch("sync_library", json!({ "user_id": "u1" }))
            .await
            .unwrap();
        assert_eq!(started["user_id"], "u1");
        assert_eq!(started["sync_type"], "incremental");
        assert_eq!(started["status"], "running");

        wait_for_idle(&service, "u1").await;

        let history = service
            .dispatch("get_sync_history", json!({ "user_id": "u1" }))
            .await
            .unwrap();
        let entries = history["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["job_id"], started["job_id"]);
        assert_eq!(entries[0]["status"], "succeeded");
        assert_eq!(entries[0]["counters"]["games_added"], 2);

        let active = service.dispatch("get_active_syncs", Value::Null).await.unwrap();
        assert_eq!(active["syncs"], json!({}));

        let err = service
            .dispatch("get_sync_progress", json!({ "user_id": "u1" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::JOB_NOT_FOUND);

        let err = service
            .dispatch("cancel_sync", json!({ "user_id": "u1" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::NO_ACTIVE_SYNC);
    }

    #[tokio::test]
    async fn test_conflict_operations_on_empty_registry() {
        let service = service(Vec::new()).await;

        let list = service.dispatch("get_conflicts", json!({})).await.unwrap();
        assert_eq!(list["total"], 0);

        let stats = service
            .dispatch("get_conflict_statistics", Value::Null)
            .await
            .unwrap();
        assert_eq!(stats["total_detected"], 0);
        assert_eq!(stats["by_type"]["value-mismatch"], 0);

        let summary = service
            .dispatch("auto_resolve_conflicts", Value::Null)
            .await
            .unwrap();
        assert_eq!(summary["resolved"], 0);

        let purged = service.dispatch("purge_conflicts", json!({})).await.unwrap();
        assert_eq!(purged["removed"], 0);

        let err = service
            .dispatch(
                "resolve_conflict",
                json!({
                    "conflict_id": "00000000-0000-0000-0000-000000000000",
                    "strategy": "keep-local",
                    "resolved_by": "alice"
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::CONFLICT_NOT_FOUND);

        let err = service
            .dispatch(
                "ignore_conflict",
                json!({ "conflict_id": "not-a-uuid", "resolved_by": "alice" }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::CONFLICT_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_every_listed_method_routes() {
        let service = service(Vec::new()).await;
        for method in METHODS {
            let result = service.dispatch(method, Value::Null).await;
            if let Err(e) = result {
                assert_ne!(e.code, codes::METHOD_NOT_FOUND, "{}", method);
            }
        }
    }
}
