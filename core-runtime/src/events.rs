//! # Event Bus System
//!
//! Typed, broadcast-based notifications for the sync core, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: one enum per domain (sync jobs, conflicts, library
//!   contents) wrapped in [`CoreEvent`]
//! - **EventBus**: central broadcast channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────────┐  emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ Sync coordinator ├────────>│          ├────────────>│ Host UI    │
//! └──────────────────┘         │ EventBus │             └────────────┘
//! ┌──────────────────┐  emit   │          │  subscribe  ┌────────────┐
//! │ Conflict resolver├────────>│          ├────────────>│ Telemetry  │
//! └──────────────────┘         └──────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Sync(SyncEvent::Cancelled {
//!     job_id: "job-1".to_string(),
//!     user_id: "76561198000000000".to_string(),
//!     games_processed: 12,
//! })).ok();
//!
//! assert!(receiver.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers in the core ignore
//! it, an event nobody listens to is not a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync job lifecycle
    Sync(SyncEvent),
    /// Conflict detection and resolution
    Conflict(ConflictEvent),
    /// Local library changes
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Conflict(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Conflict(ConflictEvent::Detected { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Info,
            CoreEvent::Conflict(ConflictEvent::Resolved { .. }) => EventSeverity::Info,
            CoreEvent::Conflict(ConflictEvent::AutoResolved { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Lifecycle of one user's sync job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        job_id: String,
        user_id: String,
        /// Whether per-game metadata is refreshed as well
        is_full_sync: bool,
    },
    Progress {
        job_id: String,
        user_id: String,
        games_processed: u64,
        games_total: u64,
        /// Progress percentage (0-100)
        percent: u8,
    },
    Completed {
        job_id: String,
        user_id: String,
        games_processed: u64,
        games_added: u64,
        games_updated: u64,
        conflicts_detected: u64,
        errors: u64,
        duration_secs: u64,
    },
    Failed {
        job_id: String,
        user_id: String,
        message: String,
        games_processed: u64,
        /// Whether retrying the sync could succeed (transient remote failure)
        recoverable: bool,
    },
    Cancelled {
        job_id: String,
        user_id: String,
        games_processed: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }
}

// ============================================================================
// Conflict Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConflictEvent {
    Detected {
        conflict_id: String,
        user_id: String,
        entity_id: String,
        field: String,
        conflict_type: String,
    },
    Resolved {
        conflict_id: String,
        strategy: String,
        resolved_by: String,
    },
    AutoResolved {
        resolved: u64,
        failed: u64,
    },
}

impl ConflictEvent {
    fn description(&self) -> &str {
        match self {
            ConflictEvent::Detected { .. } => "Conflict detected",
            ConflictEvent::Resolved { .. } => "Conflict resolved",
            ConflictEvent::AutoResolved { .. } => "Open conflicts auto-resolved",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Changes applied to the local library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    GameAdded {
        user_id: String,
        app_id: i64,
        name: String,
    },
    GameUpdated {
        user_id: String,
        app_id: i64,
        /// Names of the fields that changed
        fields: Vec<String>,
    },
    GameRemoved {
        user_id: String,
        app_id: i64,
    },
    StatsRecomputed {
        user_id: String,
        total_games: i64,
        total_playtime: i64,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::GameAdded { .. } => "Game added to library",
            LibraryEvent::GameUpdated { .. } => "Game updated from remote",
            LibraryEvent::GameRemoved { .. } => "Game removed from library",
            LibraryEvent::StatsRecomputed { .. } => "Library statistics recomputed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus. Cloning is cheap and every clone publishes to the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus; `capacity` is the per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber; past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let conflicts_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Conflict(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn started(job: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Started {
            job_id: job.to_string(),
            user_id: "u1".to_string(),
            is_full_sync: false,
        })
    }

    fn detected(id: &str) -> CoreEvent {
        CoreEvent::Conflict(ConflictEvent::Detected {
            conflict_id: id.to_string(),
            user_id: "u1".to_string(),
            entity_id: "440".to_string(),
            field: "playtime_forever".to_string(),
            conflict_type: "value-mismatch".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(started("job-1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(started("job-1")).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), started("job-1"));
        assert_eq!(second.recv().await.unwrap(), started("job-1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Conflict(_)));

        bus.emit(started("job-1")).unwrap();
        bus.emit(detected("c-1")).unwrap();

        assert_eq!(stream.recv().await.unwrap(), detected("c-1"));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(started(&format!("job-{}", i))).unwrap();
        }

        assert!(matches!(stream.recv().await, Err(RecvError::Lagged(_))));
        assert!(stream.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = Arc::new(EventBus::new(100));
        let mut receiver = bus.subscribe();

        let mut handles = Vec::new();
        for i in 0..10 {
            let bus = Arc::clone(&bus);
            handles.push(tokio::spawn(async move {
                bus.emit(started(&format!("job-{}", i))).ok();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut count = 0;
        while receiver.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            job_id: "job-1".to_string(),
            user_id: "u1".to_string(),
            message: "manifest unavailable".to_string(),
            games_processed: 0,
            recoverable: true,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(detected("c-1").severity(), EventSeverity::Warning);
        assert_eq!(started("job-1").severity(), EventSeverity::Debug);
        assert_eq!(failed.description(), "Sync failed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Library(LibraryEvent::GameRemoved {
            user_id: "u1".to_string(),
            app_id: 440,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Library");
        assert_eq!(json["payload"]["event"], "GameRemoved");
        assert_eq!(json["payload"]["app_id"], 440);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
