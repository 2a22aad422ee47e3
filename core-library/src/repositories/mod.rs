//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface the sync engine consumes
//! - SQLite implementations use sqlx for async database access
//! - Absence is a value (`Ok(None)`, `Ok(false)`), never an error; `Err` is
//!   reserved for backing-store failures
//!
//! ## Available Repositories
//!
//! - `LibraryRepository` - one library record per remote user
//! - `GameRepository` - owned games, scoped to a user

pub mod game;
pub mod library;

pub use game::{GameRepository, SqliteGameRepository};
pub use library::{LibraryRepository, SqliteLibraryRepository};
