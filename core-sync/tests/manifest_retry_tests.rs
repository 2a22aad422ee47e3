//! Manifest fetch retry behavior against a mocked catalog

use async_trait::async_trait;
use bridge_traits::catalog::{RemoteCatalog, RemoteGame, RemoteGameDetails, RemoteProfile};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::time::ManualClock;
use core_library::db::create_test_pool;
use core_library::{GameRepository, SqliteGameRepository, SqliteLibraryRepository};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_sync::{
    ConflictResolver, SyncConfig, SyncCoordinator, SyncHistoryEntry, SyncStatus, SyncType,
};
use mockall::{mock, Sequence};
use std::sync::Arc;
use std::time::Duration;

mock! {
    Catalog {}

    #[async_trait]
    impl RemoteCatalog for Catalog {
        async fn fetch_owned_games(&self, user_id: &str) -> Result<Vec<RemoteGame>>;
        async fn fetch_game_details(&self, app_id: i64) -> Result<RemoteGameDetails>;
        async fn fetch_profile(&self, user_id: &str) -> Result<RemoteProfile>;
    }
}

fn profile() -> RemoteProfile {
    RemoteProfile {
        user_id: "u1".to_string(),
        username: "player".to_string(),
        profile_url: None,
        avatar_url: None,
        is_public: true,
    }
}

fn catalog_with_profile() -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_fetch_profile().returning(|_| Ok(profile()));
    catalog.expect_fetch_game_details().never();
    catalog
}

async fn run_incremental(
    catalog: MockCatalog,
) -> (SyncHistoryEntry, Arc<SqliteGameRepository>, Vec<SyncEvent>) {
    let pool = create_test_pool().await.unwrap();
    let games = Arc::new(SqliteGameRepository::new(pool.clone()));
    let libraries = Arc::new(SqliteLibraryRepository::new(pool));
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let event_bus = EventBus::new(64);
    let mut events = event_bus.subscribe();

    let resolver = Arc::new(ConflictResolver::new(
        games.clone(),
        libraries.clone(),
        clock.clone(),
        event_bus.clone(),
        100,
    ));
    let config = SyncConfig {
        manifest_retry_attempts: 3,
        retry_backoff: Duration::from_millis(1),
        ..SyncConfig::default()
    };
    let coordinator = SyncCoordinator::new(
        config,
        Arc::new(catalog),
        libraries,
        games.clone(),
        resolver,
        event_bus,
        clock,
    );

    coordinator
        .start_sync("u1", SyncType::Incremental)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while coordinator.is_sync_active("u1").await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sync did not finish in time");

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Sync(event) = event {
            received.push(event);
        }
    }

    let entry = coordinator.get_sync_history("u1").await.remove(0);
    (entry, games, received)
}

#[tokio::test]
async fn test_transient_manifest_failures_are_retried() {
    let mut catalog = catalog_with_profile();
    let mut seq = Sequence::new();
    catalog
        .expect_fetch_owned_games()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_| Err(BridgeError::Network("connection reset".to_string())));
    catalog
        .expect_fetch_owned_games()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(vec![RemoteGame {
                app_id: 10,
                name: "Game 10".to_string(),
                playtime_forever: 30,
                playtime_recent: 0,
                icon_url: None,
            }])
        });

    let (entry, games, _) = run_incremental(catalog).await;

    assert_eq!(entry.status, SyncStatus::Succeeded);
    assert_eq!(entry.counters.errors, 2);
    assert_eq!(entry.counters.games_added, 1);
    assert_eq!(games.count_by_user_id("u1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_permanent_manifest_failure_is_not_retried() {
    let mut catalog = catalog_with_profile();
    catalog
        .expect_fetch_owned_games()
        .times(1)
        .returning(|_| Err(BridgeError::NotFound("user u1".to_string())));

    let (entry, _, events) = run_incremental(catalog).await;

    assert_eq!(entry.status, SyncStatus::Failed);
    assert_eq!(entry.counters.errors, 1);
    assert!(matches!(
        events.last(),
        Some(SyncEvent::Failed { recoverable: false, .. })
    ));
}

#[tokio::test]
async fn test_manifest_retries_stop_after_configured_attempts() {
    let mut catalog = catalog_with_profile();
    catalog
        .expect_fetch_owned_games()
        .times(3)
        .returning(|_| Err(BridgeError::RateLimited { retry_after_secs: 1 }));

    let (entry, games, events) = run_incremental(catalog).await;

    assert_eq!(entry.status, SyncStatus::Failed);
    assert_eq!(entry.counters.errors, 3);
    assert!(entry.error_message.is_some());
    assert_eq!(games.count_by_user_id("u1").await.unwrap(), 0);
    assert!(matches!(
        events.last(),
        Some(SyncEvent::Failed { recoverable: true, .. })
    ));
}
