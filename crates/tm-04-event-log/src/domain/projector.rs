//! The pure fold from event sequences to trial state.
//!
//! `init` consumes the `TrialCreated` event; `apply` folds each later event
//! into the state. Both are deterministic and side-effect-free. `project`
//! wraps them for whole-log folds and treats any failure as corruption: a
//! log that was accepted event by event must fold cleanly, so a failure
//! during projection surfaces the offending sequence number as an
//! integrity error instead of serving a guessed state.

use shared_types::{Event, EventPayload, Patient, SequenceNumber, TrialError, TrialState};
use tm_03_allocation_engine::{
    validate_arm, validate_covariates, validate_patch, validate_stored_config,
};

/// Build the initial state from a trial's first event.
///
/// The first event must be `TrialCreated` with sequence 1.
pub fn init(event: &Event) -> Result<TrialState, TrialError> {
    if event.sequence != 1 {
        return Err(malformed(event.sequence, "first event must have sequence 1"));
    }
    match &event.payload {
        EventPayload::TrialCreated { trial_id, config } => {
            validate_stored_config(config)?;
            Ok(TrialState::new(trial_id.clone(), config.clone(), 1))
        }
        other => Err(malformed(
            event.sequence,
            &format!("first event must be trial_created, got {}", other.kind()),
        )),
    }
}

/// Fold one event into the state.
///
/// The event's sequence must be exactly `state.head + 1`. Payloads are
/// validated against the state they apply to; on error the state is left
/// unchanged only if the caller applied to a copy, which is how
/// [`EventJournal`](crate::domain::journal::EventJournal) stages appends.
pub fn apply(state: &mut TrialState, event: &Event) -> Result<(), TrialError> {
    if event.sequence != state.head + 1 {
        return Err(malformed(
            event.sequence,
            &format!("expected sequence {}", state.head + 1),
        ));
    }

    match &event.payload {
        EventPayload::TrialCreated { .. } => {
            return Err(malformed(
                event.sequence,
                "trial_created is only valid as the first event",
            ));
        }
        EventPayload::PatientAdded {
            patient_id,
            covariates,
            decision,
            minimisation_driven: _,
        } => {
            if state.patients.contains_key(patient_id) {
                return Err(TrialError::DuplicatePatient {
                    id: patient_id.clone(),
                });
            }
            validate_covariates(covariates, &state.config.covariates)?;
            validate_arm(decision.arm(), &state.config.arms)?;
            state.patients.insert(
                patient_id.clone(),
                Patient {
                    id: patient_id.clone(),
                    covariates: covariates.clone(),
                    arm: decision.arm().clone(),
                    active: true,
                    provenance: event.sequence,
                },
            );
        }
        EventPayload::ArmReassigned {
            patient_id,
            previous_arm,
            new_arm,
        } => {
            validate_arm(new_arm, &state.config.arms)?;
            let patient = state
                .patients
                .get_mut(patient_id)
                .ok_or_else(|| TrialError::UnknownPatient {
                    id: patient_id.clone(),
                })?;
            if &patient.arm != previous_arm {
                return Err(malformed(
                    event.sequence,
                    &format!(
                        "previous arm {} does not match current arm {}",
                        previous_arm, patient.arm
                    ),
                ));
            }
            patient.arm = new_arm.clone();
            patient.provenance = event.sequence;
        }
        EventPayload::StatusChanged { patient_id, active } => {
            let patient = state
                .patients
                .get_mut(patient_id)
                .ok_or_else(|| TrialError::UnknownPatient {
                    id: patient_id.clone(),
                })?;
            patient.active = *active;
            patient.provenance = event.sequence;
        }
        EventPayload::ConfigChanged { patch } => {
            validate_patch(patch, &state.config.covariates)?;
            if let Some(weight) = patch.minimisation_weight {
                state.config.minimisation_weight = weight;
            }
            if let Some(mode) = patch.mode {
                state.config.mode = mode;
            }
            if let Some(weights) = &patch.covariate_weights {
                state.config.covariate_weights = Some(weights.clone());
            }
        }
    }

    state.head = event.sequence;
    Ok(())
}

/// Fold a complete event sequence into a state.
///
/// Any failure is reported as an integrity error carrying the offending
/// sequence number; the trial must not be served from a partial fold.
pub fn project(events: &[Event]) -> Result<TrialState, TrialError> {
    let first = events.first().ok_or(TrialError::Integrity {
        sequence: 0,
        reason: "event log is empty".to_string(),
    })?;
    let mut state = init(first).map_err(|e| integrity(first.sequence, e))?;
    for event in &events[1..] {
        apply(&mut state, event).map_err(|e| integrity(event.sequence, e))?;
    }
    Ok(state)
}

/// Fold only the events with sequence `<= up_to` (point-in-time view).
pub fn project_prefix(events: &[Event], up_to: SequenceNumber) -> Result<TrialState, TrialError> {
    let end = events.partition_point(|e| e.sequence <= up_to);
    project(&events[..end])
}

fn malformed(sequence: SequenceNumber, reason: &str) -> TrialError {
    TrialError::MalformedEvent {
        sequence,
        reason: reason.to_string(),
    }
}

fn integrity(sequence: SequenceNumber, source: TrialError) -> TrialError {
    match source {
        already @ TrialError::Integrity { .. } => already,
        other => TrialError::Integrity {
            sequence,
            reason: other.to_string(),
        },
    }
}
