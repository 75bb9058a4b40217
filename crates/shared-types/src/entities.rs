//! # Domain Entities
//!
//! Core data structures for trials, patients, and configuration.
//!
//! ## Type Decisions
//!
//! - Identifiers are `String`s: patient and trial ids come from external
//!   registries and carry no internal structure worth encoding.
//! - `BTreeMap` everywhere state is derived from the log, so that two
//!   projections of the same event prefix are bit-identical.
//! - `Seed` is a newtype that cannot leak into logs or serialized events;
//!   only its fingerprint is representable outside the process.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type TrialId = String;
pub type PatientId = String;
pub type ArmId = String;
pub type ActorId = String;
pub type SequenceNumber = u64;
/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// A patient's covariate assignment: covariate name -> level.
pub type Covariates = BTreeMap<String, String>;
/// The trial's declared covariate schema: covariate name -> allowed levels.
pub type CovariateSchema = BTreeMap<String, Vec<String>>;

/// Covariate names that collide with internal patient fields.
pub const RESERVED_COVARIATE_NAMES: &[&str] = &["arm", "active"];

/// The secret seed driving all deterministic draws for one trial.
///
/// The raw value never appears in events, logs, or `Debug` output; the only
/// seed-derived value that may leave the process is [`Seed::fingerprint`].
#[derive(Clone, PartialEq, Eq)]
pub struct Seed(String);

impl Seed {
    pub fn new(value: impl Into<String>) -> Self {
        Seed(value.into())
    }

    /// Hex of the first 8 bytes of SHA-256 over the raw seed.
    ///
    /// Stable across runs; safe to persist in `TrialCreated` events so that
    /// a re-opened trial can verify it was given the right seed.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Access the raw seed material for hashing.
    ///
    /// Callers must not persist or log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(fingerprint={})", self.fingerprint())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

/// How arms are selected for incoming patients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationMode {
    /// Gate draw decides between minimisation and pure randomisation;
    /// manual arm selection is rejected.
    StrictMinimisation,
    /// Always minimise, but accept explicit manual overrides and later
    /// arm reassignment.
    NonRandomisedBalanced,
}

/// Full trial configuration as supplied at creation time.
///
/// Holds the live [`Seed`]; the persisted form is [`StoredTrialConfig`],
/// which replaces the seed with its fingerprint.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialConfig {
    /// Ordered, non-empty set of treatment arms (at least 2).
    pub arms: Vec<ArmId>,
    /// Declared covariate schema.
    pub covariates: CovariateSchema,
    pub mode: AllocationMode,
    /// Fraction of allocations driven by minimisation rather than pure
    /// randomisation. Meaningful only in `StrictMinimisation`.
    pub minimisation_weight: f64,
    /// Optional per-covariate scoring weights; equal weighting when absent.
    pub covariate_weights: Option<BTreeMap<String, f64>>,
    pub seed: Seed,
}

impl TrialConfig {
    /// The persistable form of this configuration (seed replaced by its
    /// fingerprint).
    pub fn stored(&self) -> StoredTrialConfig {
        StoredTrialConfig {
            arms: self.arms.clone(),
            covariates: self.covariates.clone(),
            mode: self.mode,
            minimisation_weight: self.minimisation_weight,
            covariate_weights: self.covariate_weights.clone(),
            seed_fingerprint: self.seed.fingerprint(),
        }
    }
}

/// Trial configuration as carried by `TrialCreated` events and projected
/// state. Never contains the raw seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredTrialConfig {
    pub arms: Vec<ArmId>,
    pub covariates: CovariateSchema,
    pub mode: AllocationMode,
    pub minimisation_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covariate_weights: Option<BTreeMap<String, f64>>,
    pub seed_fingerprint: String,
}

impl StoredTrialConfig {
    /// Scoring weight for one covariate (1.0 unless configured otherwise).
    pub fn covariate_weight(&self, name: &str) -> f64 {
        self.covariate_weights
            .as_ref()
            .and_then(|w| w.get(name).copied())
            .unwrap_or(1.0)
    }
}

/// A partial configuration update carried by `ConfigChanged` events.
///
/// Only the named fields are replaced; arms and the covariate schema are
/// fixed for the lifetime of the trial.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimisation_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AllocationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covariate_weights: Option<BTreeMap<String, f64>>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.minimisation_weight.is_none()
            && self.mode.is_none()
            && self.covariate_weights.is_none()
    }
}

/// A single trial participant as derived from the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub covariates: Covariates,
    pub arm: ArmId,
    /// Whether the patient currently counts towards balance calculations.
    pub active: bool,
    /// Sequence number of the event that created or last mutated this
    /// patient.
    pub provenance: SequenceNumber,
}

/// Derived trial state as of some log prefix.
///
/// Never persisted independently of the log; always the result of folding
/// events `1..=head`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialState {
    pub trial_id: TrialId,
    pub config: StoredTrialConfig,
    pub patients: BTreeMap<PatientId, Patient>,
    /// Sequence number of the last folded event.
    pub head: SequenceNumber,
}

impl TrialState {
    pub fn new(trial_id: TrialId, config: StoredTrialConfig, head: SequenceNumber) -> Self {
        Self {
            trial_id,
            config,
            patients: BTreeMap::new(),
            head,
        }
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn active_patient_count(&self) -> usize {
        self.active_patients().count()
    }

    /// Patients currently contributing to balance calculations.
    pub fn active_patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values().filter(|p| p.active)
    }

    /// Per-arm counts of each covariate level over active patients.
    ///
    /// arm -> covariate name -> level -> count
    pub fn arm_summary(&self) -> BTreeMap<ArmId, BTreeMap<String, BTreeMap<String, usize>>> {
        let mut summary: BTreeMap<ArmId, BTreeMap<String, BTreeMap<String, usize>>> =
            BTreeMap::new();
        for arm in &self.config.arms {
            summary.insert(arm.clone(), BTreeMap::new());
        }
        for patient in self.active_patients() {
            let per_arm = summary.entry(patient.arm.clone()).or_default();
            for (name, level) in &patient.covariates {
                *per_arm
                    .entry(name.clone())
                    .or_default()
                    .entry(level.clone())
                    .or_insert(0) += 1;
            }
        }
        summary
    }
}
