//! # Collaborator Bridge Traits
//!
//! Contracts between the sync core and the things it does not own.
//!
//! ## Overview
//!
//! The sync engine never talks to the remote catalog service or the host's
//! logging pipeline directly. Each of those capabilities is expressed as a
//! trait here and injected at construction time, so the core can be driven by
//! a real client in production and by fakes in tests.
//!
//! ## Traits
//!
//! - [`RemoteCatalog`](catalog::RemoteCatalog) - Owned-game manifest, per-game
//!   details and profile lookups against the remote source of truth
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map transport failures onto the transient variants
//! (`Timeout`, `RateLimited`, `Network`) so the core can decide whether a
//! retry makes sense via [`BridgeError::is_transient`].
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! by every background sync task.

pub mod catalog;
pub mod error;
pub mod time;

pub use error::BridgeError;

pub use catalog::{RemoteCatalog, RemoteGame, RemoteGameDetails, RemoteProfile};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
