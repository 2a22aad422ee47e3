//! Domain models for the game library
//!
//! Rich domain models with validation and database mapping, plus the typed
//! field/value vocabulary the sync engine uses to compare local and remote
//! records.

use bridge_traits::catalog::{RemoteGame, RemoteGameDetails, RemoteProfile};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a local game record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(pub Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Field vocabulary
// =============================================================================

/// A syncable field of [`Game`]
///
/// `Owned` is a pseudo-field: it never maps to a column and is only used to
/// describe a game that disappeared from (or never appeared in) the remote
/// manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameField {
    Name,
    PlaytimeForever,
    PlaytimeRecent,
    IconUrl,
    Developer,
    Publisher,
    ReleaseDate,
    Owned,
}

impl GameField {
    /// Fields compared on every sync
    pub const MANIFEST_FIELDS: [GameField; 4] = [
        GameField::Name,
        GameField::PlaytimeForever,
        GameField::PlaytimeRecent,
        GameField::IconUrl,
    ];

    /// Fields only refreshed by full syncs
    pub const DETAIL_FIELDS: [GameField; 3] = [
        GameField::Developer,
        GameField::Publisher,
        GameField::ReleaseDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameField::Name => "name",
            GameField::PlaytimeForever => "playtime_forever",
            GameField::PlaytimeRecent => "playtime_recent",
            GameField::IconUrl => "icon_url",
            GameField::Developer => "developer",
            GameField::Publisher => "publisher",
            GameField::ReleaseDate => "release_date",
            GameField::Owned => "owned",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, GameField::PlaytimeForever | GameField::PlaytimeRecent)
    }

    pub fn full_sync_only(&self) -> bool {
        Self::DETAIL_FIELDS.contains(self)
    }
}

impl fmt::Display for GameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(GameField::Name),
            "playtime_forever" => Ok(GameField::PlaytimeForever),
            "playtime_recent" => Ok(GameField::PlaytimeRecent),
            "icon_url" => Ok(GameField::IconUrl),
            "developer" => Ok(GameField::Developer),
            "publisher" => Ok(GameField::Publisher),
            "release_date" => Ok(GameField::ReleaseDate),
            "owned" => Ok(GameField::Owned),
            _ => Err(format!("Unknown game field: {}", s)),
        }
    }
}

/// Value of a single field, as compared and stored by the sync engine
///
/// Serializes untagged, so `Missing` becomes JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Missing,
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn into_text(self, field: GameField) -> Result<Option<String>, String> {
        match self {
            FieldValue::Text(v) => Ok(Some(v)),
            FieldValue::Missing => Ok(None),
            other => Err(format!("{} expects text, got {}", field, other)),
        }
    }

    fn into_int(self, field: GameField) -> Result<i64, String> {
        match self {
            FieldValue::Int(v) => Ok(v),
            other => Err(format!("{} expects an integer, got {}", field, other)),
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Text)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Int)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{:?}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Missing => f.write_str("<missing>"),
        }
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Local record of one user's game library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Library {
    /// Remote user identity (primary key)
    pub user_id: String,
    pub username: String,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,

    // Aggregate stats, recomputed from the full game set
    pub total_games: i64,
    /// Lifetime playtime across all games, in minutes
    pub total_playtime: i64,
    pub recently_played_count: i64,
    pub never_played_count: i64,

    // Sync bookkeeping
    pub last_library_sync: Option<i64>,
    pub last_full_sync: Option<i64>,
    pub sync_in_progress: bool,

    /// Whether the remote profile is publicly visible
    pub is_public: bool,
    /// Reference into the host's credential store, never the credential itself
    pub credential_ref: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Library {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, now: i64) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            profile_url: None,
            avatar_url: None,
            total_games: 0,
            total_playtime: 0,
            recently_played_count: 0,
            never_played_count: 0,
            last_library_sync: None,
            last_full_sync: None,
            sync_in_progress: false,
            is_public: true,
            credential_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a library from the remote profile of its owner.
    pub fn from_profile(profile: &RemoteProfile, now: i64) -> Self {
        let mut library = Self::new(profile.user_id.clone(), profile.username.clone(), now);
        library.apply_profile(profile, now);
        library
    }

    /// Refresh display metadata from the remote profile.
    pub fn apply_profile(&mut self, profile: &RemoteProfile, now: i64) {
        self.username = profile.username.clone();
        self.profile_url = profile.profile_url.clone();
        self.avatar_url = profile.avatar_url.clone();
        self.is_public = profile.is_public;
        self.updated_at = now;
    }

    pub fn apply_stats(&mut self, stats: &LibraryStats, now: i64) {
        self.total_games = stats.total_games;
        self.total_playtime = stats.total_playtime;
        self.recently_played_count = stats.recently_played_count;
        self.never_played_count = stats.never_played_count;
        self.updated_at = now;
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            total_games: self.total_games,
            total_playtime: self.total_playtime,
            recently_played_count: self.recently_played_count,
            never_played_count: self.never_played_count,
        }
    }

    /// Validate library data
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("Library user_id cannot be empty".to_string());
        }

        if self.total_games < 0
            || self.total_playtime < 0
            || self.recently_played_count < 0
            || self.never_played_count < 0
        {
            return Err("Library statistics cannot be negative".to_string());
        }

        Ok(())
    }
}

/// Aggregate statistics of a library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_games: i64,
    pub total_playtime: i64,
    /// Games with playtime in the recent window
    pub recently_played_count: i64,
    /// Games with zero lifetime playtime
    pub never_played_count: i64,
}

impl LibraryStats {
    pub fn from_games(games: &[Game]) -> Self {
        games.iter().fold(Self::default(), |mut stats, game| {
            stats.total_games += 1;
            stats.total_playtime += game.playtime_forever;
            if game.playtime_recent > 0 {
                stats.recently_played_count += 1;
            }
            if game.playtime_forever == 0 {
                stats.never_played_count += 1;
            }
            stats
        })
    }
}

/// One owned game of a user
///
/// Every syncable column has a `synced_*` twin holding the remote value
/// accepted at the previous sync. A field whose current value differs from
/// its baseline has been modified locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Game {
    /// Unique identifier
    pub id: String,
    /// Owning library
    pub user_id: String,
    /// Remote catalog identifier
    pub app_id: i64,

    pub name: String,
    /// Lifetime playtime in minutes
    pub playtime_forever: i64,
    /// Recent-window playtime in minutes
    pub playtime_recent: i64,
    pub icon_url: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub release_date: Option<String>,

    // Sync baselines
    pub synced_name: Option<String>,
    pub synced_playtime_forever: Option<i64>,
    pub synced_playtime_recent: Option<i64>,
    pub synced_icon_url: Option<String>,
    pub synced_developer: Option<String>,
    pub synced_publisher: Option<String>,
    pub synced_release_date: Option<String>,

    /// Last time this game was seen in the remote manifest
    pub last_remote_sync: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Game {
    /// A game created locally by the user; it has no sync baseline.
    pub fn new(user_id: impl Into<String>, app_id: i64, name: impl Into<String>, now: i64) -> Self {
        Self {
            id: GameId::new().to_string(),
            user_id: user_id.into(),
            app_id,
            name: name.into(),
            playtime_forever: 0,
            playtime_recent: 0,
            icon_url: None,
            developer: None,
            publisher: None,
            release_date: None,
            synced_name: None,
            synced_playtime_forever: None,
            synced_playtime_recent: None,
            synced_icon_url: None,
            synced_developer: None,
            synced_publisher: None,
            synced_release_date: None,
            last_remote_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A game first seen in the remote manifest, baselined to the remote values.
    pub fn from_remote(user_id: impl Into<String>, remote: &RemoteGame, now: i64) -> Self {
        let mut game = Self::new(user_id, remote.app_id, remote.name.clone(), now);
        game.playtime_forever = remote.playtime_forever;
        game.playtime_recent = remote.playtime_recent;
        game.icon_url = remote.icon_url.clone();

        game.synced_name = Some(game.name.clone());
        game.synced_playtime_forever = Some(game.playtime_forever);
        game.synced_playtime_recent = Some(game.playtime_recent);
        game.synced_icon_url = game.icon_url.clone();
        game.last_remote_sync = Some(now);
        game
    }

    /// Copy full-sync metadata in, baselining it as well.
    pub fn apply_details(&mut self, details: &RemoteGameDetails) {
        self.developer = details.developer.clone();
        self.publisher = details.publisher.clone();
        self.release_date = details.release_date.clone();
        self.synced_developer = self.developer.clone();
        self.synced_publisher = self.publisher.clone();
        self.synced_release_date = self.release_date.clone();
    }

    /// Current local value of a field.
    pub fn field_value(&self, field: GameField) -> FieldValue {
        match field {
            GameField::Name => FieldValue::Text(self.name.clone()),
            GameField::PlaytimeForever => FieldValue::Int(self.playtime_forever),
            GameField::PlaytimeRecent => FieldValue::Int(self.playtime_recent),
            GameField::IconUrl => self.icon_url.clone().into(),
            GameField::Developer => self.developer.clone().into(),
            GameField::Publisher => self.publisher.clone().into(),
            GameField::ReleaseDate => self.release_date.clone().into(),
            GameField::Owned => FieldValue::Bool(true),
        }
    }

    /// Value accepted at the previous sync, `Missing` if never synced.
    pub fn baseline_value(&self, field: GameField) -> FieldValue {
        match field {
            GameField::Name => self.synced_name.clone().into(),
            GameField::PlaytimeForever => self.synced_playtime_forever.into(),
            GameField::PlaytimeRecent => self.synced_playtime_recent.into(),
            GameField::IconUrl => self.synced_icon_url.clone().into(),
            GameField::Developer => self.synced_developer.clone().into(),
            GameField::Publisher => self.synced_publisher.clone().into(),
            GameField::ReleaseDate => self.synced_release_date.clone().into(),
            GameField::Owned => FieldValue::Bool(self.last_remote_sync.is_some()),
        }
    }

    /// Whether the local value of `field` moved away from its baseline.
    pub fn is_locally_modified(&self, field: GameField) -> bool {
        self.field_value(field) != self.baseline_value(field)
    }

    /// Overwrite the local value of a field. Baselines are untouched.
    pub fn set_field(&mut self, field: GameField, value: FieldValue) -> Result<(), String> {
        match field {
            GameField::Name => match value {
                FieldValue::Text(name) => self.name = name,
                other => return Err(format!("name expects text, got {}", other)),
            },
            GameField::PlaytimeForever => self.playtime_forever = value.into_int(field)?,
            GameField::PlaytimeRecent => self.playtime_recent = value.into_int(field)?,
            GameField::IconUrl => self.icon_url = value.into_text(field)?,
            GameField::Developer => self.developer = value.into_text(field)?,
            GameField::Publisher => self.publisher = value.into_text(field)?,
            GameField::ReleaseDate => self.release_date = value.into_text(field)?,
            GameField::Owned => return Err("owned is not a stored field".to_string()),
        }
        Ok(())
    }

    /// Record the remote value accepted for a field.
    pub fn set_baseline(&mut self, field: GameField, value: FieldValue) -> Result<(), String> {
        match field {
            GameField::Name => self.synced_name = value.into_text(field)?,
            GameField::PlaytimeForever => {
                self.synced_playtime_forever = match value {
                    FieldValue::Missing => None,
                    other => Some(other.into_int(field)?),
                }
            }
            GameField::PlaytimeRecent => {
                self.synced_playtime_recent = match value {
                    FieldValue::Missing => None,
                    other => Some(other.into_int(field)?),
                }
            }
            GameField::IconUrl => self.synced_icon_url = value.into_text(field)?,
            GameField::Developer => self.synced_developer = value.into_text(field)?,
            GameField::Publisher => self.synced_publisher = value.into_text(field)?,
            GameField::ReleaseDate => self.synced_release_date = value.into_text(field)?,
            GameField::Owned => return Err("owned has no baseline".to_string()),
        }
        Ok(())
    }

    /// Record a user edit. The baseline keeps the last synced value, which
    /// is what marks the field as locally modified.
    pub fn apply_local_edit(
        &mut self,
        field: GameField,
        value: FieldValue,
        now: i64,
    ) -> Result<(), String> {
        self.set_field(field, value)?;
        self.updated_at = now;
        Ok(())
    }

    /// Validate game data
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("Game user_id cannot be empty".to_string());
        }

        if self.app_id <= 0 {
            return Err(format!("Game app_id {} must be positive", self.app_id));
        }

        if self.name.trim().is_empty() {
            return Err("Game name cannot be empty".to_string());
        }

        if self.playtime_forever < 0 || self.playtime_recent < 0 {
            return Err("Game playtime cannot be negative".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(app_id: i64, playtime: i64) -> RemoteGame {
        RemoteGame {
            app_id,
            name: format!("Game {}", app_id),
            playtime_forever: playtime,
            playtime_recent: 0,
            icon_url: Some(format!("https://cdn.example/{}.jpg", app_id)),
        }
    }

    #[test]
    fn test_game_from_remote_is_baselined() {
        let game = Game::from_remote("u1", &remote(440, 100), 1_000);

        assert_eq!(game.app_id, 440);
        assert_eq!(game.last_remote_sync, Some(1_000));
        for field in GameField::MANIFEST_FIELDS {
            assert!(!game.is_locally_modified(field), "{} modified", field);
        }
        assert!(game.validate().is_ok());
    }

    #[test]
    fn test_local_edit_marks_field_modified() {
        let mut game = Game::from_remote("u1", &remote(440, 100), 1_000);
        game.apply_local_edit(GameField::PlaytimeForever, FieldValue::Int(40), 2_000)
            .unwrap();

        assert_eq!(game.playtime_forever, 40);
        assert_eq!(game.synced_playtime_forever, Some(100));
        assert_eq!(game.updated_at, 2_000);
        assert!(game.is_locally_modified(GameField::PlaytimeForever));
        assert!(!game.is_locally_modified(GameField::Name));
    }

    #[test]
    fn test_set_field_rejects_wrong_type() {
        let mut game = Game::new("u1", 10, "Counter-Strike", 0);
        assert!(game
            .set_field(GameField::PlaytimeForever, FieldValue::Text("x".into()))
            .is_err());
        assert!(game.set_field(GameField::Name, FieldValue::Missing).is_err());
        assert!(game.set_field(GameField::Owned, FieldValue::Bool(false)).is_err());

        game.set_field(GameField::IconUrl, FieldValue::Missing).unwrap();
        assert_eq!(game.icon_url, None);
    }

    #[test]
    fn test_locally_created_game_has_no_baseline() {
        let game = Game::new("u1", 10, "Counter-Strike", 0);
        assert_eq!(game.baseline_value(GameField::Name), FieldValue::Missing);
        assert_eq!(game.baseline_value(GameField::Owned), FieldValue::Bool(false));
        assert!(game.is_locally_modified(GameField::Name));
    }

    #[test]
    fn test_game_validation() {
        let mut game = Game::new("u1", 10, "Counter-Strike", 0);
        assert!(game.validate().is_ok());

        game.name = "  ".to_string();
        assert!(game.validate().is_err());

        game.name = "Counter-Strike".to_string();
        game.app_id = 0;
        assert!(game.validate().is_err());

        game.app_id = 10;
        game.playtime_recent = -1;
        assert!(game.validate().is_err());
    }

    #[test]
    fn test_field_round_trips_through_str() {
        for field in GameField::MANIFEST_FIELDS
            .iter()
            .chain(GameField::DETAIL_FIELDS.iter())
        {
            assert_eq!(field.as_str().parse::<GameField>().unwrap(), *field);
        }
        assert!("playtime".parse::<GameField>().is_err());
        assert!(GameField::PlaytimeRecent.is_numeric());
        assert!(!GameField::Name.is_numeric());
        assert!(GameField::Publisher.full_sync_only());
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&FieldValue::Int(40)).unwrap(), "40");
        assert_eq!(serde_json::to_string(&FieldValue::Missing).unwrap(), "null");
        let parsed: FieldValue = serde_json::from_str("\"Valve\"").unwrap();
        assert_eq!(parsed, FieldValue::Text("Valve".to_string()));
    }

    #[test]
    fn test_library_stats_from_games() {
        let mut played = Game::from_remote("u1", &remote(1, 300), 0);
        played.playtime_recent = 30;
        let idle = Game::from_remote("u1", &remote(2, 50), 0);
        let unplayed = Game::from_remote("u1", &remote(3, 0), 0);

        let stats = LibraryStats::from_games(&[played, idle, unplayed]);
        assert_eq!(stats.total_games, 3);
        assert_eq!(stats.total_playtime, 350);
        assert_eq!(stats.recently_played_count, 1);
        assert_eq!(stats.never_played_count, 1);
    }

    #[test]
    fn test_library_from_profile() {
        let profile = RemoteProfile {
            user_id: "76561198000000000".to_string(),
            username: "gaben".to_string(),
            profile_url: Some("https://example.com/id/gaben".to_string()),
            avatar_url: None,
            is_public: false,
        };
        let library = Library::from_profile(&profile, 5);

        assert_eq!(library.user_id, profile.user_id);
        assert_eq!(library.username, "gaben");
        assert!(!library.is_public);
        assert!(!library.sync_in_progress);
        assert!(library.validate().is_ok());
    }
}
