//! The per-trial handle and its operations.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, warn};

use shared_types::{
    ActorId, AllocationMode, ArmId, ConfigPatch, Covariates, Event, EventPayload, PatientId,
    Seed, SequenceNumber, TrialConfig, TrialError, TrialId, TrialState,
};
use tm_03_allocation_engine::{decide, validate_config};
use tm_04_event_log::{EventJournal, EventStore, TimeSource};

/// How long a caller waits for the per-trial lock before the operation
/// fails with `ConcurrentModification` instead of deadlocking.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of one `add_patient` call.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationOutcome {
    pub arm: ArmId,
    /// True when the minimisation branch (not a random draw or a manual
    /// override) chose the arm.
    pub minimisation_driven: bool,
    /// Sequence number of the `PatientAdded` event.
    pub sequence: SequenceNumber,
}

struct TrialInner {
    journal: EventJournal,
    store: Box<dyn EventStore>,
}

/// Handle to one trial: its identity, seed, clock, lock, and log.
pub struct Trial {
    id: TrialId,
    seed: Seed,
    time: Box<dyn TimeSource>,
    lock_timeout: Duration,
    inner: RwLock<TrialInner>,
}

impl std::fmt::Debug for Trial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trial")
            .field("id", &self.id)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl Trial {
    /// Create a new trial: validates the configuration and appends
    /// `TrialCreated` as sequence 1.
    ///
    /// The store must be empty; a store with history belongs to an existing
    /// trial and must go through [`Trial::open`].
    pub fn create(
        trial_id: impl Into<TrialId>,
        config: TrialConfig,
        actor: impl Into<ActorId>,
        mut store: Box<dyn EventStore>,
        time: Box<dyn TimeSource>,
    ) -> Result<Self, TrialError> {
        let trial_id = trial_id.into();
        validate_config(&config)?;
        if !store.load()?.is_empty() {
            return Err(TrialError::Storage(format!(
                "trial {trial_id} already has history; open it instead"
            )));
        }

        let event = Event::new(
            1,
            time.now(),
            actor,
            EventPayload::TrialCreated {
                trial_id: trial_id.clone(),
                config: config.stored(),
            },
        );
        store.append(&event)?;
        let journal = EventJournal::from_events(vec![event])?;

        info!(
            "[tm-05] created trial {} ({} arms, seed fingerprint {})",
            trial_id,
            config.arms.len(),
            config.seed.fingerprint()
        );
        Ok(Self {
            id: trial_id,
            seed: config.seed,
            time,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            inner: RwLock::new(TrialInner { journal, store }),
        })
    }

    /// Re-open an existing trial from its persisted history.
    ///
    /// The caller supplies the seed out of band (it is never persisted);
    /// it is checked against the fingerprint recorded at creation so a
    /// wrong seed cannot silently produce a divergent trial.
    pub fn open(
        seed: Seed,
        store: Box<dyn EventStore>,
        time: Box<dyn TimeSource>,
    ) -> Result<Self, TrialError> {
        let journal = EventJournal::from_events(store.load()?)?;
        let state = journal.state();
        if state.config.seed_fingerprint != seed.fingerprint() {
            return Err(TrialError::Integrity {
                sequence: 1,
                reason: "seed fingerprint does not match trial configuration".to_string(),
            });
        }

        let id = state.trial_id.clone();
        info!("[tm-05] opened trial {} at sequence {}", id, journal.head());
        Ok(Self {
            id,
            seed,
            time,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            inner: RwLock::new(TrialInner { journal, store }),
        })
    }

    /// Override the default lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn id(&self) -> &TrialId {
        &self.id
    }

    /// Allocate an arm for a new patient, or record a manual override.
    pub fn add_patient(
        &self,
        actor: impl Into<ActorId>,
        patient_id: impl Into<PatientId>,
        covariates: Covariates,
        override_arm: Option<ArmId>,
    ) -> Result<AllocationOutcome, TrialError> {
        let patient_id = patient_id.into();
        let actor = actor.into();
        self.with_write(|trial, inner| {
            let decision = decide(
                inner.journal.state(),
                &trial.seed,
                &patient_id,
                &covariates,
                override_arm.as_ref(),
            )?;
            let arm = decision.decision.arm().clone();
            let minimisation_driven = decision.minimisation_driven;

            let sequence = trial.append_event(
                inner,
                actor,
                EventPayload::PatientAdded {
                    patient_id: patient_id.clone(),
                    covariates,
                    decision: decision.decision,
                    minimisation_driven,
                },
            )?;

            info!(
                "[tm-05] trial {} allocated patient {} to arm {} \
                 (minimisation_driven={}, sequence={})",
                trial.id, patient_id, arm, minimisation_driven, sequence
            );
            Ok(AllocationOutcome {
                arm,
                minimisation_driven,
                sequence,
            })
        })
    }

    /// Deactivate or reactivate a patient. Deactivated patients stop
    /// counting towards balance for patients added afterwards; historical
    /// allocations are untouched.
    pub fn set_patient_active(
        &self,
        actor: impl Into<ActorId>,
        patient_id: impl Into<PatientId>,
        active: bool,
    ) -> Result<SequenceNumber, TrialError> {
        let patient_id = patient_id.into();
        let actor = actor.into();
        self.with_write(|trial, inner| {
            let sequence = trial.append_event(
                inner,
                actor,
                EventPayload::StatusChanged {
                    patient_id: patient_id.clone(),
                    active,
                },
            )?;
            info!(
                "[tm-05] trial {} set patient {} active={} (sequence={})",
                trial.id, patient_id, active, sequence
            );
            Ok(sequence)
        })
    }

    /// Move an existing patient to a different arm.
    ///
    /// Permitted only in `NonRandomisedBalanced` mode; strict trials treat
    /// allocated arms as final.
    pub fn reassign_arm(
        &self,
        actor: impl Into<ActorId>,
        patient_id: impl Into<PatientId>,
        new_arm: impl Into<ArmId>,
    ) -> Result<SequenceNumber, TrialError> {
        let patient_id = patient_id.into();
        let new_arm = new_arm.into();
        let actor = actor.into();
        self.with_write(|trial, inner| {
            let state = inner.journal.state();
            if state.config.mode != AllocationMode::NonRandomisedBalanced {
                return Err(TrialError::OverrideNotPermitted);
            }
            let previous_arm = state
                .patients
                .get(&patient_id)
                .ok_or_else(|| TrialError::UnknownPatient {
                    id: patient_id.clone(),
                })?
                .arm
                .clone();

            let sequence = trial.append_event(
                inner,
                actor,
                EventPayload::ArmReassigned {
                    patient_id: patient_id.clone(),
                    previous_arm: previous_arm.clone(),
                    new_arm: new_arm.clone(),
                },
            )?;
            info!(
                "[tm-05] trial {} reassigned patient {} from {} to {} (sequence={})",
                trial.id, patient_id, previous_arm, new_arm, sequence
            );
            Ok(sequence)
        })
    }

    /// Apply a partial configuration update (`ConfigChanged`).
    pub fn update_config(
        &self,
        actor: impl Into<ActorId>,
        patch: ConfigPatch,
    ) -> Result<SequenceNumber, TrialError> {
        let actor = actor.into();
        self.with_write(|trial, inner| {
            let sequence =
                trial.append_event(inner, actor, EventPayload::ConfigChanged { patch })?;
            info!(
                "[tm-05] trial {} configuration changed (sequence={})",
                trial.id, sequence
            );
            Ok(sequence)
        })
    }

    /// The state as of the newest event.
    pub fn current_state(&self) -> Result<TrialState, TrialError> {
        self.with_read(|inner| Ok(inner.journal.state().clone()))
    }

    /// Point-in-time view: the state as of `sequence`. A pure read; the
    /// log keeps its full history and appends continue from the true head.
    pub fn state_as_of(&self, sequence: SequenceNumber) -> Result<TrialState, TrialError> {
        self.with_read(|inner| inner.journal.state_as_of(sequence))
    }

    /// The full ordered audit trail.
    pub fn audit_trail(&self) -> Result<Vec<Event>, TrialError> {
        self.with_read(|inner| Ok(inner.journal.events().to_vec()))
    }

    /// Sequence number of the newest event.
    pub fn head(&self) -> Result<SequenceNumber, TrialError> {
        self.with_read(|inner| Ok(inner.journal.head()))
    }

    /// Per-arm counts of each covariate level over active patients.
    pub fn arm_summary(
        &self,
    ) -> Result<BTreeMap<ArmId, BTreeMap<String, BTreeMap<String, usize>>>, TrialError> {
        self.with_read(|inner| Ok(inner.journal.state().arm_summary()))
    }

    /// Stage, persist, and commit one event. All-or-nothing: a failure in
    /// staging or storage leaves journal and store as they were.
    fn append_event(
        &self,
        inner: &mut TrialInner,
        actor: ActorId,
        payload: EventPayload,
    ) -> Result<SequenceNumber, TrialError> {
        let event = Event::new(inner.journal.next_sequence(), self.time.now(), actor, payload);
        let sequence = event.sequence;
        let staged = inner.journal.stage(&event)?;
        inner.store.append(&event)?;
        inner.journal.commit(event, staged);
        Ok(sequence)
    }

    fn with_write<T>(
        &self,
        f: impl FnOnce(&Self, &mut TrialInner) -> Result<T, TrialError>,
    ) -> Result<T, TrialError> {
        match self.inner.try_write_for(self.lock_timeout) {
            Some(mut guard) => f(self, &mut guard),
            None => {
                warn!("[tm-05] trial {} write lock timed out", self.id);
                Err(self.lock_timeout_error())
            }
        }
    }

    fn with_read<T>(
        &self,
        f: impl FnOnce(&TrialInner) -> Result<T, TrialError>,
    ) -> Result<T, TrialError> {
        match self.inner.try_read_for(self.lock_timeout) {
            Some(guard) => f(&guard),
            None => Err(self.lock_timeout_error()),
        }
    }

    fn lock_timeout_error(&self) -> TrialError {
        TrialError::ConcurrentModification {
            timeout_ms: self.lock_timeout.as_millis() as u64,
        }
    }
}
