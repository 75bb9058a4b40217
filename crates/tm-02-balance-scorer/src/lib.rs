//! # tm-02-balance-scorer
//!
//! Covariate Balance Scorer subsystem for Trial-Minimisation.
//!
//! ## Role in System
//!
//! Given the currently active patients and a candidate arm for an incoming
//! patient, computes a scalar imbalance metric: for each covariate of the
//! new patient, count active patients per arm sharing that level (with the
//! new patient provisionally placed in the candidate arm) and take the
//! range (max minus min) across arms. Per-covariate ranges are weighted
//! (equal weights unless configured) and summed. Lower is better.
//!
//! Only active patients contribute; deactivated patients drop out of the
//! counts and re-enter on reactivation. Historical allocations are never
//! revisited.
//!
//! Tie-breaking is the caller's job: [`best_arms`] returns every arm within
//! float tolerance of the minimum, in configured arm order, so the
//! allocation engine can resolve ties with a deterministic draw.

use shared_types::{ArmId, Covariates, Patient, StoredTrialConfig};

/// Two scores closer than this are treated as tied. Scores are sums of
/// small integer counts times configured weights, so this comfortably
/// absorbs float noise without merging genuinely different scores.
pub const SCORE_TOLERANCE: f64 = 1e-9;

/// Imbalance score for placing a patient with `covariates` in `candidate`.
///
/// `active` must already be filtered to active patients.
pub fn score(
    active: &[&Patient],
    candidate: &ArmId,
    covariates: &Covariates,
    config: &StoredTrialConfig,
) -> f64 {
    let mut total = 0.0;
    for (name, level) in covariates {
        let mut min = usize::MAX;
        let mut max = 0usize;
        for arm in &config.arms {
            let mut count = active
                .iter()
                .filter(|p| &p.arm == arm && p.covariates.get(name) == Some(level))
                .count();
            if arm == candidate {
                count += 1;
            }
            min = min.min(count);
            max = max.max(count);
        }
        total += config.covariate_weight(name) * (max - min) as f64;
    }
    total
}

/// Arms achieving the minimum score, in configured arm order.
///
/// Always non-empty for a valid configuration. With no active patients all
/// arms score identically, so the very first allocation is a full tie.
pub fn best_arms(
    active: &[&Patient],
    covariates: &Covariates,
    config: &StoredTrialConfig,
) -> Vec<ArmId> {
    let scored: Vec<(ArmId, f64)> = config
        .arms
        .iter()
        .map(|arm| (arm.clone(), score(active, arm, covariates, config)))
        .collect();

    let best = scored
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::INFINITY, f64::min);

    scored
        .into_iter()
        .filter(|(_, s)| *s - best <= SCORE_TOLERANCE)
        .map(|(arm, _)| arm)
        .collect()
}
