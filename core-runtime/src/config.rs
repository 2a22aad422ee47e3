//! # Core Configuration Module
//!
//! Builder-based configuration for the game-library sync core.
//!
//! ## Overview
//!
//! [`CoreConfig`] carries the injected collaborators (the remote catalog
//! client and the clock) together with the tunables of the sync engine:
//! worker-pool size, fetch deadlines, retry policy, retention caps and the
//! per-field conflict policy. `build()` validates everything up front so a
//! misconfigured core fails at startup instead of mid-sync.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, FieldPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/gamesync/library.db")
//!     .remote_catalog(Arc::new(MyCatalogClient::new()))
//!     .max_concurrent_syncs(2)
//!     .fetch_timeout(Duration::from_secs(10))
//!     .field_policy("playtime_recent", FieldPolicy::RemoteWins)
//!     .build()?;
//! ```
//!
//! ## Required Dependencies
//!
//! - `RemoteCatalog` - the remote source of truth; there is no default.
//!
//! ## Optional Dependencies
//!
//! - `Clock` - defaults to [`SystemClock`].

use crate::error::{Error, Result};
use bridge_traits::{Clock, RemoteCatalog, SystemClock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How a locally modified field reacts to a diverging remote value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldPolicy {
    /// Keep the local edit and raise a value-mismatch conflict.
    #[default]
    Protect,
    /// Overwrite the local edit with the remote value, no conflict.
    RemoteWins,
}

/// Where the SQLite library database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

/// Core configuration for the sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// SQLite database location
    pub database: DatabaseLocation,

    /// Remote catalog client (required)
    pub remote_catalog: Arc<dyn RemoteCatalog>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Worker-pool size: how many user syncs may run at once
    pub max_concurrent_syncs: usize,

    /// Deadline applied to every individual remote fetch
    pub fetch_timeout: Duration,

    /// Attempts for the initial manifest fetch (first try included)
    pub manifest_retry_attempts: u32,

    /// Base backoff between manifest attempts, doubled after each retry
    pub retry_backoff: Duration,

    /// Deadline for a whole sync job
    pub sync_timeout: Duration,

    /// Per-user sync history retention cap
    pub history_limit: usize,

    /// Resolved/ignored conflicts kept when purging
    pub closed_conflict_limit: usize,

    /// Event bus channel capacity
    pub event_buffer_size: usize,

    /// Per-field overrides keyed by field name; absent fields are `Protect`
    pub field_policies: HashMap<String, FieldPolicy>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database", &self.database)
            .field("remote_catalog", &"RemoteCatalog { ... }")
            .field("clock", &"Clock { ... }")
            .field("max_concurrent_syncs", &self.max_concurrent_syncs)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("manifest_retry_attempts", &self.manifest_retry_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("sync_timeout", &self.sync_timeout)
            .field("history_limit", &self.history_limit)
            .field("closed_conflict_limit", &self.closed_conflict_limit)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("field_policies", &self.field_policies)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Policy for a field by name, `Protect` unless overridden.
    pub fn field_policy(&self, field: &str) -> FieldPolicy {
        self.field_policies.get(field).copied().unwrap_or_default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Worker pool, retry attempts and retention caps are non-zero
    /// - Deadlines are non-zero and the job deadline covers a single fetch
    pub fn validate(&self) -> Result<()> {
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.max_concurrent_syncs == 0 {
            return Err(Error::Config(
                "max_concurrent_syncs must be at least 1".to_string(),
            ));
        }

        if self.manifest_retry_attempts == 0 {
            return Err(Error::Config(
                "manifest_retry_attempts must be at least 1 (the first attempt counts)"
                    .to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(Error::Config(
                "fetch_timeout must be greater than zero".to_string(),
            ));
        }

        if self.sync_timeout < self.fetch_timeout {
            return Err(Error::Config(format!(
                "sync_timeout ({:?}) must not be shorter than fetch_timeout ({:?})",
                self.sync_timeout, self.fetch_timeout
            )));
        }

        if self.history_limit == 0 {
            return Err(Error::Config(
                "history_limit must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn remote_catalog_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "RemoteCatalog".to_string(),
        message: "A RemoteCatalog implementation is required to fetch owned games. \
                 Inject the catalog client with .remote_catalog(...)."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database: Option<DatabaseLocation>,
    remote_catalog: Option<Arc<dyn RemoteCatalog>>,
    clock: Option<Arc<dyn Clock>>,
    max_concurrent_syncs: Option<usize>,
    fetch_timeout: Option<Duration>,
    manifest_retry_attempts: Option<u32>,
    retry_backoff: Option<Duration>,
    sync_timeout: Option<Duration>,
    history_limit: Option<usize>,
    closed_conflict_limit: Option<usize>,
    event_buffer_size: Option<usize>,
    field_policies: HashMap<String, FieldPolicy>,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database file.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/var/lib/gamesync/library.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database = Some(DatabaseLocation::File(path.into()));
        self
    }

    /// Uses a private in-memory database (tests, ephemeral hosts).
    pub fn in_memory_database(mut self) -> Self {
        self.database = Some(DatabaseLocation::InMemory);
        self
    }

    pub fn remote_catalog(mut self, catalog: Arc<dyn RemoteCatalog>) -> Self {
        self.remote_catalog = Some(catalog);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn max_concurrent_syncs(mut self, workers: usize) -> Self {
        self.max_concurrent_syncs = Some(workers);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn manifest_retry_attempts(mut self, attempts: u32) -> Self {
        self.manifest_retry_attempts = Some(attempts);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn closed_conflict_limit(mut self, limit: usize) -> Self {
        self.closed_conflict_limit = Some(limit);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Overrides the conflict policy of one syncable field.
    pub fn field_policy(mut self, field: impl Into<String>, policy: FieldPolicy) -> Self {
        self.field_policies.insert(field.into(), policy);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Fails with `Error::Config` when the database location is missing or
    /// a value is out of range, and with `Error::CapabilityMissing` when no
    /// remote catalog was injected.
    pub fn build(self) -> Result<CoreConfig> {
        let database = self.database.ok_or_else(|| {
            Error::Config(
                "Database location is required. Use .database_path() or .in_memory_database()."
                    .to_string(),
            )
        })?;

        let remote_catalog = self.remote_catalog.ok_or_else(remote_catalog_missing_error)?;

        let config = CoreConfig {
            database,
            remote_catalog,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            max_concurrent_syncs: self.max_concurrent_syncs.unwrap_or(4),
            fetch_timeout: self.fetch_timeout.unwrap_or(Duration::from_secs(30)),
            manifest_retry_attempts: self.manifest_retry_attempts.unwrap_or(3),
            retry_backoff: self.retry_backoff.unwrap_or(Duration::from_millis(500)),
            sync_timeout: self.sync_timeout.unwrap_or(Duration::from_secs(3600)),
            history_limit: self.history_limit.unwrap_or(20),
            closed_conflict_limit: self.closed_conflict_limit.unwrap_or(500),
            event_buffer_size: self.event_buffer_size.unwrap_or(100),
            field_policies: self.field_policies,
        };

        config.validate()?;

        Ok(config)
    }
}
