//! # Error Types
//!
//! The shared error taxonomy for the trial-minimisation core.
//!
//! Four families, all typed and distinguishable by the caller:
//! configuration errors (fatal to the requested configuration change),
//! validation errors (reject one operation, log untouched), concurrency
//! errors (safe to retry against the now-current state), and integrity
//! errors (fatal to the whole trial's projection).

use thiserror::Error;

use crate::entities::{ArmId, PatientId, SequenceNumber};

/// Errors that can occur anywhere in the allocation core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrialError {
    /// Arm identifier not in the trial's configured arm set.
    #[error("Invalid arm: {arm} is not one of the trial arms")]
    InvalidArm { arm: ArmId },

    /// Covariate level not permitted by the schema.
    #[error("Invalid value {level} for covariate {name}")]
    InvalidCovariate { name: String, level: String },

    /// Covariate name not declared in the schema.
    #[error("Unknown covariate: {name}")]
    UnknownCovariate { name: String },

    /// Declared covariate missing from the supplied set.
    #[error("Missing covariate: {name}")]
    MissingCovariate { name: String },

    /// Patient identifier already allocated in this trial.
    #[error("Duplicate patient: {id} already allocated")]
    DuplicatePatient { id: PatientId },

    /// Patient identifier not present in the projected state.
    #[error("Unknown patient: {id}")]
    UnknownPatient { id: PatientId },

    /// Configuration rejected at creation or change time.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Manual arm selection (override or reassignment) attempted in a mode
    /// that forbids it.
    #[error("Manual arm selection not permitted in strict minimisation mode")]
    OverrideNotPermitted,

    /// Event rejected before it reached the log (bad ordering or payload).
    #[error("Malformed event at sequence {sequence}: {reason}")]
    MalformedEvent {
        sequence: SequenceNumber,
        reason: String,
    },

    /// Per-trial lock could not be acquired within the timeout.
    #[error("Concurrent modification: trial lock not acquired within {timeout_ms}ms")]
    ConcurrentModification { timeout_ms: u64 },

    /// Persisted history failed verification during load or projection.
    /// The trial must not be served from a possibly-incorrect state.
    #[error("Integrity failure at sequence {sequence}: {reason}")]
    Integrity {
        sequence: SequenceNumber,
        reason: String,
    },

    /// The storage collaborator failed to persist or return events.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TrialError {
    /// Whether the caller may safely retry the whole operation.
    ///
    /// True only for concurrency errors: no partial state was written, and
    /// a retry observes the now-current projection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrialError::ConcurrentModification { .. })
    }
}
