//! In-memory event store for unit tests and ephemeral trials.

use shared_types::{Event, TrialError};

use crate::ports::outbound::EventStore;

/// Volatile `EventStore` backed by a vector.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Vec<Event>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with pre-existing history, for load-path tests.
    pub fn with_events(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&mut self, event: &Event) -> Result<(), TrialError> {
        self.events.push(event.clone());
        Ok(())
    }

    fn load(&self) -> Result<Vec<Event>, TrialError> {
        Ok(self.events.clone())
    }
}
