pub mod allocation_flows;
pub mod concurrency;
pub mod determinism;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use shared_types::{AllocationMode, Covariates, Seed, TrialConfig};
    use tm_04_event_log::{FixedTimeSource, InMemoryEventStore};
    use tm_05_trial_service::Trial;

    pub fn config(mode: AllocationMode, weight: f64) -> TrialConfig {
        TrialConfig {
            arms: vec!["A".into(), "B".into()],
            covariates: BTreeMap::from([(
                "sex".to_string(),
                vec!["M".to_string(), "F".to_string()],
            )]),
            mode,
            minimisation_weight: weight,
            covariate_weights: None,
            seed: Seed::new("published_test_seed"),
        }
    }

    pub fn covs(sex: &str) -> Covariates {
        BTreeMap::from([("sex".to_string(), sex.to_string())])
    }

    pub fn trial(mode: AllocationMode, weight: f64) -> Trial {
        Trial::create(
            "integration-trial",
            config(mode, weight),
            "admin",
            Box::new(InMemoryEventStore::new()),
            Box::new(FixedTimeSource(1_700_000_000)),
        )
        .unwrap()
    }
}
