//! # Trial Events
//!
//! The immutable, ordered record types that make up a trial's history.
//!
//! Events are the sole source of truth; every other structure is derived by
//! folding them. They are never mutated or deleted once appended.

use serde::{Deserialize, Serialize};

use crate::entities::{
    ActorId, ArmId, ConfigPatch, Covariates, PatientId, SequenceNumber, StoredTrialConfig,
    Timestamp, TrialId,
};

/// How an allocated arm was chosen.
///
/// A tagged result rather than a flag, so manual overrides are visible in
/// the audit record and cannot be confused with algorithmic selections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "arm")]
pub enum Decision {
    /// Selected by the allocation engine (minimisation or random draw).
    AlgorithmSelected(ArmId),
    /// Supplied verbatim by the caller, bypassing the scorer.
    ManualOverride(ArmId),
}

impl Decision {
    pub fn arm(&self) -> &ArmId {
        match self {
            Decision::AlgorithmSelected(arm) | Decision::ManualOverride(arm) => arm,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Decision::ManualOverride(_))
    }
}

/// One immutable entry in a trial's append-only history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonically increasing, gap-free, starting at 1.
    pub sequence: SequenceNumber,
    pub timestamp: Timestamp,
    /// Opaque acting-user identifier supplied by the access-control
    /// collaborator; stored verbatim, never interpreted.
    pub actor: ActorId,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(
        sequence: SequenceNumber,
        timestamp: Timestamp,
        actor: impl Into<ActorId>,
        payload: EventPayload,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            actor: actor.into(),
            payload,
        }
    }
}

/// Kind-specific event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Sets the configuration; only valid as the first event of a trial.
    /// Carries the seed fingerprint, never the seed itself.
    TrialCreated {
        trial_id: TrialId,
        config: StoredTrialConfig,
    },
    /// A patient entered the trial and received an arm.
    PatientAdded {
        patient_id: PatientId,
        covariates: Covariates,
        decision: Decision,
        /// True when the minimisation branch (not a random draw or a manual
        /// override) chose the arm.
        minimisation_driven: bool,
    },
    /// An existing patient was moved to a different arm.
    ArmReassigned {
        patient_id: PatientId,
        previous_arm: ArmId,
        new_arm: ArmId,
    },
    /// An existing patient was deactivated or reactivated.
    StatusChanged { patient_id: PatientId, active: bool },
    /// Named configuration fields were replaced (partial update).
    ConfigChanged { patch: ConfigPatch },
}

impl EventPayload {
    /// Stable kind tag, used in serialized form and event file names.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::TrialCreated { .. } => "trial_created",
            EventPayload::PatientAdded { .. } => "patient_added",
            EventPayload::ArmReassigned { .. } => "arm_reassigned",
            EventPayload::StatusChanged { .. } => "status_changed",
            EventPayload::ConfigChanged { .. } => "config_changed",
        }
    }
}
