//! The mode-dependent arm decision.
//!
//! [`decide`] is a pure function over the projected trial state, the live
//! seed, and the incoming request. It consults no entropy beyond the
//! deterministic random source, so replaying the same inputs reproduces
//! the same decisions.

use shared_types::{
    AllocationMode, ArmId, Covariates, Decision, PatientId, Seed, TrialError, TrialState,
};
use tm_01_rand_source::{draw, draw_index, Purpose};
use tm_02_balance_scorer::best_arms;

use crate::validate::{validate_arm, validate_covariates};

/// The engine's output for one allocation request.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationDecision {
    pub decision: Decision,
    /// True when the minimisation branch chose the arm; false for random
    /// draws and manual overrides.
    pub minimisation_driven: bool,
}

/// Decide an arm for a new patient, or validate a manual override.
///
/// Validates the request against the projected `state` (duplicate id,
/// covariate schema, arm membership) before any draw is made, so a rejected
/// request consumes nothing.
pub fn decide(
    state: &TrialState,
    seed: &Seed,
    patient_id: &PatientId,
    covariates: &Covariates,
    override_arm: Option<&ArmId>,
) -> Result<AllocationDecision, TrialError> {
    if state.patients.contains_key(patient_id) {
        return Err(TrialError::DuplicatePatient {
            id: patient_id.clone(),
        });
    }
    validate_covariates(covariates, &state.config.covariates)?;

    let config = &state.config;
    match (config.mode, override_arm) {
        (AllocationMode::StrictMinimisation, Some(_)) => Err(TrialError::OverrideNotPermitted),
        (AllocationMode::StrictMinimisation, None) => {
            let gate = draw(patient_id, seed, Purpose::Gate);
            if gate < config.minimisation_weight {
                Ok(AllocationDecision {
                    decision: Decision::AlgorithmSelected(minimised_arm(
                        state, seed, patient_id, covariates,
                    )),
                    minimisation_driven: true,
                })
            } else {
                let index = draw_index(patient_id, seed, Purpose::RandomArm, config.arms.len());
                Ok(AllocationDecision {
                    decision: Decision::AlgorithmSelected(config.arms[index].clone()),
                    minimisation_driven: false,
                })
            }
        }
        (AllocationMode::NonRandomisedBalanced, Some(arm)) => {
            validate_arm(arm, &config.arms)?;
            Ok(AllocationDecision {
                decision: Decision::ManualOverride(arm.clone()),
                minimisation_driven: false,
            })
        }
        (AllocationMode::NonRandomisedBalanced, None) => Ok(AllocationDecision {
            // Weight is conceptually 1 in this mode: always balance.
            decision: Decision::AlgorithmSelected(minimised_arm(
                state, seed, patient_id, covariates,
            )),
            minimisation_driven: true,
        }),
    }
}

/// The arm minimising the balance score, with deterministic tie-breaking.
///
/// With zero active patients all arms tie, so even the very first
/// allocation goes through the tie-break draw rather than a hardcoded
/// default.
fn minimised_arm(
    state: &TrialState,
    seed: &Seed,
    patient_id: &PatientId,
    covariates: &Covariates,
) -> ArmId {
    let active: Vec<_> = state.active_patients().collect();
    let mut best = best_arms(&active, covariates, &state.config);
    let index = if best.len() > 1 {
        draw_index(patient_id, seed, Purpose::Tiebreak, best.len())
    } else {
        0
    };
    best.swap_remove(index)
}
