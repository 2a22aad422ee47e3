//! # Library Management Module
//!
//! Owns the local game-library database and provides repository patterns
//! for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pooling and embedded migrations
//! - `Library` and `Game` models, including the per-field sync baselines
//! - Repository traits and their SQLite implementations
//!
//! Every repository write is committed on its own; there is no cross-record
//! transaction, so a sync that stops halfway leaves its finished games behind.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{FieldValue, Game, GameField, GameId, Library, LibraryStats};
pub use repositories::{
    GameRepository, LibraryRepository, SqliteGameRepository, SqliteLibraryRepository,
};
