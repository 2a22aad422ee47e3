//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the game-library sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other core crate depends on this one for its logging conventions,
//! its configuration and its event broadcasting.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
