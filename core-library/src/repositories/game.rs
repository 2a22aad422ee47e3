//! Game repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Game;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Game repository interface
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Find a game by its ID
    async fn find(&self, id: &str) -> Result<Option<Game>>;

    /// Find a user's game by its catalog id
    async fn find_by_app_id(&self, user_id: &str, app_id: i64) -> Result<Option<Game>>;

    /// All games of a user, ordered by `app_id`
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Game>>;

    /// Insert a new game
    ///
    /// # Errors
    /// Returns error if the user already has a game with the same `app_id`,
    /// validation fails or a database error occurs.
    async fn insert(&self, game: &Game) -> Result<()>;

    /// Update an existing game
    ///
    /// # Returns
    /// - `Ok(true)` if the game was updated
    /// - `Ok(false)` if the game was not found
    async fn update(&self, game: &Game) -> Result<bool>;

    /// Delete a game by ID
    ///
    /// # Returns
    /// - `Ok(true)` if the game was deleted
    /// - `Ok(false)` if the game was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Number of games owned by a user
    async fn count_by_user_id(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of GameRepository
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn invalid(message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: "game".to_string(),
        message,
    }
}

#[async_trait]
impl GameRepository for SqliteGameRepository {
    async fn find(&self, id: &str) -> Result<Option<Game>> {
        let game = query_as::<_, Game>("SELECT * FROM games WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(game)
    }

    async fn find_by_app_id(&self, user_id: &str, app_id: i64) -> Result<Option<Game>> {
        let game = query_as::<_, Game>("SELECT * FROM games WHERE user_id = ? AND app_id = ?")
            .bind(user_id)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(game)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Game>> {
        let games = query_as::<_, Game>("SELECT * FROM games WHERE user_id = ? ORDER BY app_id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(games)
    }

    async fn insert(&self, game: &Game) -> Result<()> {
        game.validate().map_err(invalid)?;

        sqlx::query(
            r#"
            INSERT INTO games (
                id, user_id, app_id,
                name, playtime_forever, playtime_recent, icon_url,
                developer, publisher, release_date,
                synced_name, synced_playtime_forever, synced_playtime_recent, synced_icon_url,
                synced_developer, synced_publisher, synced_release_date,
                last_remote_sync, created_at, updated_at
            ) VALUES (
                ?, ?, ?,
                ?, ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?
            )
            "#,
        )
        .bind(&game.id)
        .bind(&game.user_id)
        .bind(game.app_id)
        .bind(&game.name)
        .bind(game.playtime_forever)
        .bind(game.playtime_recent)
        .bind(&game.icon_url)
        .bind(&game.developer)
        .bind(&game.publisher)
        .bind(&game.release_date)
        .bind(&game.synced_name)
        .bind(game.synced_playtime_forever)
        .bind(game.synced_playtime_recent)
        .bind(&game.synced_icon_url)
        .bind(&game.synced_developer)
        .bind(&game.synced_publisher)
        .bind(&game.synced_release_date)
        .bind(game.last_remote_sync)
        .bind(game.created_at)
        .bind(game.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, game: &Game) -> Result<bool> {
        game.validate().map_err(invalid)?;

        let result = sqlx::query(
            r#"
            UPDATE games SET
                name = ?, playtime_forever = ?, playtime_recent = ?, icon_url = ?,
                developer = ?, publisher = ?, release_date = ?,
                synced_name = ?, synced_playtime_forever = ?, synced_playtime_recent = ?,
                synced_icon_url = ?, synced_developer = ?, synced_publisher = ?,
                synced_release_date = ?,
                last_remote_sync = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&game.name)
        .bind(game.playtime_forever)
        .bind(game.playtime_recent)
        .bind(&game.icon_url)
        .bind(&game.developer)
        .bind(&game.publisher)
        .bind(&game.release_date)
        .bind(&game.synced_name)
        .bind(game.synced_playtime_forever)
        .bind(game.synced_playtime_recent)
        .bind(&game.synced_icon_url)
        .bind(&game.synced_developer)
        .bind(&game.synced_publisher)
        .bind(&game.synced_release_date)
        .bind(game.last_remote_sync)
        .bind(game.updated_at)
        .bind(&game.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_user_id(&self, user_id: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM games WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
