//! Input validation shared by the engine and the state projector.
//!
//! All checks reject with a typed error and never correct input silently.

use std::collections::BTreeMap;

use shared_types::{
    ArmId, ConfigPatch, Covariates, CovariateSchema, StoredTrialConfig, TrialConfig, TrialError,
    RESERVED_COVARIATE_NAMES,
};

/// Reject arm identifiers outside the configured set.
pub fn validate_arm(arm: &ArmId, arms: &[ArmId]) -> Result<(), TrialError> {
    if arms.contains(arm) {
        Ok(())
    } else {
        Err(TrialError::InvalidArm { arm: arm.clone() })
    }
}

/// Covariate keys must match the schema exactly; every level must be
/// declared. A patient with a missing covariate cannot be balanced, so
/// missing keys are errors rather than wildcards.
pub fn validate_covariates(
    covariates: &Covariates,
    schema: &CovariateSchema,
) -> Result<(), TrialError> {
    for name in schema.keys() {
        if !covariates.contains_key(name) {
            return Err(TrialError::MissingCovariate { name: name.clone() });
        }
    }
    for (name, level) in covariates {
        match schema.get(name) {
            None => return Err(TrialError::UnknownCovariate { name: name.clone() }),
            Some(levels) if !levels.contains(level) => {
                return Err(TrialError::InvalidCovariate {
                    name: name.clone(),
                    level: level.clone(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Full configuration check, fatal to trial creation on failure.
pub fn validate_config(config: &TrialConfig) -> Result<(), TrialError> {
    validate_config_parts(
        &config.arms,
        &config.covariates,
        config.minimisation_weight,
        config.covariate_weights.as_ref(),
    )
}

/// Same checks against the persisted configuration form, used when folding
/// a `TrialCreated` event back out of the log.
pub fn validate_stored_config(config: &StoredTrialConfig) -> Result<(), TrialError> {
    validate_config_parts(
        &config.arms,
        &config.covariates,
        config.minimisation_weight,
        config.covariate_weights.as_ref(),
    )
}

fn validate_config_parts(
    arms: &[ArmId],
    covariates: &CovariateSchema,
    minimisation_weight: f64,
    covariate_weights: Option<&BTreeMap<String, f64>>,
) -> Result<(), TrialError> {
    if arms.len() < 2 {
        return Err(invalid("at least two arms are required"));
    }
    for (i, arm) in arms.iter().enumerate() {
        if arm.is_empty() {
            return Err(invalid("arm identifiers must be non-empty"));
        }
        if arms[..i].contains(arm) {
            return Err(invalid(&format!("duplicate arm identifier: {arm}")));
        }
    }

    validate_weight(minimisation_weight)?;

    for (name, levels) in covariates {
        if name.is_empty() {
            return Err(invalid("covariate names must be non-empty"));
        }
        if RESERVED_COVARIATE_NAMES.contains(&name.as_str()) {
            return Err(invalid(&format!("covariate name {name} is reserved")));
        }
        if levels.is_empty() {
            return Err(invalid(&format!("covariate {name} declares no levels")));
        }
        for (i, level) in levels.iter().enumerate() {
            if levels[..i].contains(level) {
                return Err(invalid(&format!(
                    "covariate {name} declares duplicate level {level}"
                )));
            }
        }
    }

    if let Some(weights) = covariate_weights {
        validate_covariate_weights(weights, covariates)?;
    }

    Ok(())
}

/// Check a partial configuration update against the covariate schema it
/// will apply to.
pub fn validate_patch(patch: &ConfigPatch, schema: &CovariateSchema) -> Result<(), TrialError> {
    if patch.is_empty() {
        return Err(invalid("configuration patch names no fields"));
    }
    if let Some(weight) = patch.minimisation_weight {
        validate_weight(weight)?;
    }
    if let Some(weights) = &patch.covariate_weights {
        validate_covariate_weights(weights, schema)?;
    }
    Ok(())
}

fn validate_weight(weight: f64) -> Result<(), TrialError> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(invalid(&format!(
            "minimisation weight must be in [0, 1], got {weight}"
        )));
    }
    Ok(())
}

fn validate_covariate_weights(
    weights: &BTreeMap<String, f64>,
    schema: &CovariateSchema,
) -> Result<(), TrialError> {
    for (name, weight) in weights {
        if !schema.contains_key(name) {
            return Err(invalid(&format!(
                "covariate weight names undeclared covariate {name}"
            )));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(invalid(&format!(
                "covariate weight for {name} must be a finite non-negative number"
            )));
        }
    }
    Ok(())
}

fn invalid(reason: &str) -> TrialError {
    TrialError::InvalidConfiguration {
        reason: reason.to_string(),
    }
}
