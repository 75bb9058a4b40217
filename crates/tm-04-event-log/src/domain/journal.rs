//! The ordered in-memory journal for one trial.
//!
//! Wraps the event vector together with a cached projection of its head.
//! The cache is a read-through optimisation only; it is rebuilt from the
//! events on load and updated by the same `apply` fold that a full
//! projection would run, so it can never drift from the log.

use shared_types::{Event, SequenceNumber, TrialError, TrialState};

use crate::domain::projector::{apply, project, project_prefix};

/// Append-only journal plus the projection of its full prefix.
#[derive(Debug)]
pub struct EventJournal {
    events: Vec<Event>,
    state: TrialState,
}

impl EventJournal {
    /// Rebuild a journal from a persisted event sequence.
    ///
    /// Fails with an integrity error (offending sequence included) if the
    /// sequence has gaps, is out of order, or does not fold cleanly.
    pub fn from_events(events: Vec<Event>) -> Result<Self, TrialError> {
        let state = project(&events)?;
        Ok(Self { events, state })
    }

    /// Sequence number of the newest event.
    pub fn head(&self) -> SequenceNumber {
        self.state.head
    }

    /// Sequence number the next appended event must carry.
    pub fn next_sequence(&self) -> SequenceNumber {
        self.head() + 1
    }

    /// The full event history, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Projection of the complete log.
    pub fn state(&self) -> &TrialState {
        &self.state
    }

    /// Validate an event against the current head without committing it.
    ///
    /// Returns the state the journal would hold after the event. The
    /// journal itself is untouched, which makes append all-or-nothing:
    /// callers persist the event first and only then [`commit`](Self::commit)
    /// the staged state.
    pub fn stage(&self, event: &Event) -> Result<TrialState, TrialError> {
        let mut next = self.state.clone();
        apply(&mut next, event)?;
        Ok(next)
    }

    /// Commit a previously staged event and its resulting state.
    ///
    /// Panics in debug builds if `state` was not staged from the current
    /// head; callers must not interleave stage and commit across appends.
    pub fn commit(&mut self, event: Event, state: TrialState) {
        debug_assert_eq!(event.sequence, self.state.head + 1);
        debug_assert_eq!(state.head, event.sequence);
        self.events.push(event);
        self.state = state;
    }

    /// Stage and commit in one step, for callers without external storage.
    pub fn append(&mut self, event: Event) -> Result<&TrialState, TrialError> {
        let next = self.stage(&event)?;
        self.commit(event, next);
        Ok(&self.state)
    }

    /// Point-in-time view: the state as of sequence `up_to`.
    ///
    /// A pure read. Later events stay in the log and subsequent appends
    /// continue from the true head.
    pub fn state_as_of(&self, up_to: SequenceNumber) -> Result<TrialState, TrialError> {
        project_prefix(&self.events, up_to)
    }
}
