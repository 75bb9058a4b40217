//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the event log requires from its collaborators: durable
//! ordered storage and a clock.

use shared_types::{Event, Timestamp, TrialError};

/// Abstract interface to the storage collaborator.
///
/// The core treats storage as an ordered, durable, append-only record
/// stream and is agnostic to its physical representation.
///
/// Production: `JsonFileEventStore` (adapters/json_file.rs)
/// Testing: `InMemoryEventStore` (adapters/memory.rs)
pub trait EventStore: Send + Sync {
    /// Durably persist one event at the end of the stream.
    ///
    /// Must be atomic: on error, no partial record may become visible to a
    /// later [`load`](Self::load).
    fn append(&mut self, event: &Event) -> Result<(), TrialError>;

    /// Return every persisted event, oldest first.
    fn load(&self) -> Result<Vec<Event>, TrialError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}

/// Default time source using system time.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Constant time source for deterministic tests.
pub struct FixedTimeSource(pub Timestamp);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        self.0
    }
}
