//! Remote Catalog Abstraction
//!
//! The remote catalog is the source of truth for what a user owns and how long
//! they have played it. The sync core only consumes the three lookups below;
//! HTTP transport, authentication and rate limiting live in the implementor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry of a user's owned-game manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGame {
    /// Remote catalog identifier
    pub app_id: i64,
    /// Display name
    pub name: String,
    /// Lifetime playtime in minutes
    pub playtime_forever: i64,
    /// Playtime within the recent window (two weeks) in minutes
    pub playtime_recent: i64,
    /// Icon URL, if the catalog exposes one
    pub icon_url: Option<String>,
}

/// Per-game metadata only fetched during full syncs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGameDetails {
    pub app_id: i64,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub release_date: Option<String>,
}

/// Public profile of a remote user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub user_id: String,
    pub username: String,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    /// Whether the library is publicly visible on the remote service
    pub is_public: bool,
}

/// Remote catalog client trait
///
/// Implementations must be cheap to share; the sync coordinator holds a single
/// instance behind an `Arc` and calls it from every background job. Callers
/// impose their own deadline on each call, so implementations do not need to
/// time out on their own.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::RemoteCatalog;
///
/// async fn count_owned(catalog: &dyn RemoteCatalog, user: &str) -> usize {
///     catalog.fetch_owned_games(user).await.map(|g| g.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Fetch the complete owned-game manifest for a user
    async fn fetch_owned_games(&self, user_id: &str) -> Result<Vec<RemoteGame>>;

    /// Fetch extended metadata for a single game
    async fn fetch_game_details(&self, app_id: i64) -> Result<RemoteGameDetails>;

    /// Fetch the public profile for a user
    async fn fetch_profile(&self, user_id: &str) -> Result<RemoteProfile>;
}
