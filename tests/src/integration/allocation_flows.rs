//! # Allocation Flow Tests
//!
//! Cross-subsystem behaviour of the balance scorer, allocation engine, and
//! service layer: active-set exclusion, manual overrides, and validation
//! surfacing.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{covs, trial};
    use shared_types::{AllocationMode, Decision, EventPayload, TrialError};
    use std::collections::BTreeMap;

    #[test]
    fn test_deactivated_patient_excluded_from_balance() {
        // Weight 1.0: allocations are purely balance-driven.
        let t = trial(AllocationMode::StrictMinimisation, 1.0);

        let p1 = t.add_patient("i", "p1", covs("M"), None).unwrap();
        t.set_patient_active("coordinator", "p1", false).unwrap();

        // With P1 deactivated the active set is empty again, so Q is a
        // tie-break rather than a forced opposite of P1. Whatever it lands
        // on, the balance scorer must not have seen P1: adding R (same
        // level) must now land opposite Q, not opposite P1.
        let q = t.add_patient("i", "q", covs("M"), None).unwrap();
        let r = t.add_patient("i", "r", covs("M"), None).unwrap();
        assert_ne!(r.arm, q.arm);

        // Reactivate P1 and the counts include it again: with P1 and Q and
        // R all active, the arm holding fewer Ms takes the next patient.
        t.set_patient_active("coordinator", "p1", true).unwrap();
        let state = t.current_state().unwrap();
        let m_in_a = state
            .active_patients()
            .filter(|p| p.arm == "A")
            .count();
        let m_in_b = state.active_patients().count() - m_in_a;
        let expected = if m_in_a < m_in_b { "A" } else { "B" };
        // Skip the check if reactivation re-balanced to a tie.
        if m_in_a != m_in_b {
            let s = t.add_patient("i", "s", covs("M"), None).unwrap();
            assert_eq!(s.arm, expected, "p1 was {}", p1.arm);
        }
    }

    #[test]
    fn test_retrospective_edits_only_affect_later_patients() {
        let t = trial(AllocationMode::StrictMinimisation, 1.0);
        let p1 = t.add_patient("i", "p1", covs("M"), None).unwrap();
        let p2 = t.add_patient("i", "p2", covs("M"), None).unwrap();

        t.set_patient_active("coordinator", "p1", false).unwrap();

        // Historical allocations are untouched by the edit.
        let state = t.current_state().unwrap();
        assert_eq!(state.patients["p1"].arm, p1.arm);
        assert_eq!(state.patients["p2"].arm, p2.arm);

        // But the next patient is scored against the reduced active set:
        // only p2 counts, so p3 lands opposite p2.
        let p3 = t.add_patient("i", "p3", covs("M"), None).unwrap();
        assert_ne!(p3.arm, p2.arm);
    }

    #[test]
    fn test_manual_override_recorded_as_such() {
        let t = trial(AllocationMode::NonRandomisedBalanced, 1.0);
        t.add_patient("i", "p1", covs("M"), Some("A".into())).unwrap();
        t.add_patient("i", "p2", covs("M"), None).unwrap();

        let trail = t.audit_trail().unwrap();
        let decisions: Vec<_> = trail
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::PatientAdded { decision, .. } => Some(decision.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(decisions[0], Decision::ManualOverride("A".into()));
        // The algorithmic follow-up balances against the override.
        assert_eq!(decisions[1], Decision::AlgorithmSelected("B".into()));
    }

    #[test]
    fn test_validation_errors_are_typed_and_non_destructive() {
        let t = trial(AllocationMode::StrictMinimisation, 1.0);
        t.add_patient("i", "p1", covs("M"), None).unwrap();
        let head = t.head().unwrap();

        let unknown_level = t.add_patient("i", "p2", covs("X"), None);
        assert!(matches!(
            unknown_level,
            Err(TrialError::InvalidCovariate { .. })
        ));

        let missing = t.add_patient("i", "p2", BTreeMap::new(), None);
        assert!(matches!(missing, Err(TrialError::MissingCovariate { .. })));

        let extra = {
            let mut c = covs("M");
            c.insert("stage".into(), "I".into());
            t.add_patient("i", "p2", c, None)
        };
        assert!(matches!(extra, Err(TrialError::UnknownCovariate { .. })));

        let duplicate = t.add_patient("i", "p1", covs("M"), None);
        assert!(matches!(duplicate, Err(TrialError::DuplicatePatient { .. })));

        assert_eq!(t.head().unwrap(), head);
    }

    #[test]
    fn test_actor_ids_stored_verbatim() {
        let t = trial(AllocationMode::StrictMinimisation, 1.0);
        t.add_patient("dr-lin@site-3", "p1", covs("M"), None).unwrap();
        t.set_patient_active("audit//bot", "p1", false).unwrap();

        let trail = t.audit_trail().unwrap();
        assert_eq!(trail[1].actor, "dr-lin@site-3");
        assert_eq!(trail[2].actor, "audit//bot");
    }

    #[test]
    fn test_provenance_tracks_last_mutation() {
        let t = trial(AllocationMode::NonRandomisedBalanced, 1.0);
        t.add_patient("i", "p1", covs("M"), Some("A".into())).unwrap();
        assert_eq!(t.current_state().unwrap().patients["p1"].provenance, 2);

        t.reassign_arm("coordinator", "p1", "B").unwrap();
        assert_eq!(t.current_state().unwrap().patients["p1"].provenance, 3);
    }

    #[test]
    fn test_three_arm_trial_spreads_patients() {
        use shared_types::{Seed, TrialConfig};
        use tm_04_event_log::{FixedTimeSource, InMemoryEventStore};
        use tm_05_trial_service::Trial;

        let config = TrialConfig {
            arms: vec!["A".into(), "B".into(), "C".into()],
            covariates: BTreeMap::from([(
                "sex".to_string(),
                vec!["M".to_string(), "F".to_string()],
            )]),
            mode: AllocationMode::StrictMinimisation,
            minimisation_weight: 1.0,
            covariate_weights: None,
            seed: Seed::new("three-arm-seed"),
        };
        let t = Trial::create(
            "t3",
            config,
            "admin",
            Box::new(InMemoryEventStore::new()),
            Box::new(FixedTimeSource(1)),
        )
        .unwrap();

        for i in 0..9 {
            t.add_patient("i", format!("p{i}"), covs("M"), None).unwrap();
        }

        // Pure minimisation over one level keeps the three arms within one
        // patient of each other.
        let state = t.current_state().unwrap();
        let counts: Vec<usize> = ["A", "B", "C"]
            .iter()
            .map(|arm| state.active_patients().filter(|p| &p.arm == arm).count())
            .collect();
        assert_eq!(counts.iter().sum::<usize>(), 9);
        assert_eq!(*counts.iter().max().unwrap() - *counts.iter().min().unwrap(), 0);
    }
}
