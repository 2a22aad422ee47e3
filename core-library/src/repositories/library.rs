//! Library repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Library;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Library repository interface
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Find the library of a user
    ///
    /// # Returns
    /// - `Ok(Some(library))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Library>>;

    /// Insert a new library
    ///
    /// # Errors
    /// Returns error if a library already exists for the user, validation
    /// fails or a database error occurs.
    async fn insert(&self, library: &Library) -> Result<()>;

    /// Update an existing library
    ///
    /// # Returns
    /// - `Ok(true)` if the library was updated
    /// - `Ok(false)` if no library exists for the user
    async fn update(&self, library: &Library) -> Result<bool>;

    /// Flip the `sync_in_progress` flag without touching anything else
    ///
    /// # Returns
    /// `Ok(false)` if no library exists for the user
    async fn set_sync_in_progress(&self, user_id: &str, in_progress: bool, now: i64)
        -> Result<bool>;
}

/// SQLite implementation of LibraryRepository
pub struct SqliteLibraryRepository {
    pool: SqlitePool,
}

impl SqliteLibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn invalid(message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: "library".to_string(),
        message,
    }
}

#[async_trait]
impl LibraryRepository for SqliteLibraryRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Library>> {
        let library = query_as::<_, Library>("SELECT * FROM libraries WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(library)
    }

    async fn insert(&self, library: &Library) -> Result<()> {
        library.validate().map_err(invalid)?;

        sqlx::query(
            r#"
            INSERT INTO libraries (
                user_id, username, profile_url, avatar_url,
                total_games, total_playtime, recently_played_count, never_played_count,
                last_library_sync, last_full_sync, sync_in_progress,
                is_public, credential_ref, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&library.user_id)
        .bind(&library.username)
        .bind(&library.profile_url)
        .bind(&library.avatar_url)
        .bind(library.total_games)
        .bind(library.total_playtime)
        .bind(library.recently_played_count)
        .bind(library.never_played_count)
        .bind(library.last_library_sync)
        .bind(library.last_full_sync)
        .bind(library.sync_in_progress)
        .bind(library.is_public)
        .bind(&library.credential_ref)
        .bind(library.created_at)
        .bind(library.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, library: &Library) -> Result<bool> {
        library.validate().map_err(invalid)?;

        let result = sqlx::query(
            r#"
            UPDATE libraries SET
                username = ?, profile_url = ?, avatar_url = ?,
                total_games = ?, total_playtime = ?,
                recently_played_count = ?, never_played_count = ?,
                last_library_sync = ?, last_full_sync = ?, sync_in_progress = ?,
                is_public = ?, credential_ref = ?, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&library.username)
        .bind(&library.profile_url)
        .bind(&library.avatar_url)
        .bind(library.total_games)
        .bind(library.total_playtime)
        .bind(library.recently_played_count)
        .bind(library.never_played_count)
        .bind(library.last_library_sync)
        .bind(library.last_full_sync)
        .bind(library.sync_in_progress)
        .bind(library.is_public)
        .bind(&library.credential_ref)
        .bind(library.updated_at)
        .bind(&library.user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_sync_in_progress(
        &self,
        user_id: &str,
        in_progress: bool,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE libraries SET sync_in_progress = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(in_progress)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
