//! Workspace umbrella crate.
//!
//! Hosts that only need the operation surface can depend on
//! `gamesync-workspace` and get `core-service` re-exported under the
//! `service` feature, without wiring the individual crates themselves.

#[cfg(feature = "service")]
pub use core_service::*;
