//! # tm-03-allocation-engine
//!
//! Allocation Engine subsystem for Trial-Minimisation.
//!
//! ## Role in System
//!
//! The mode-dependent decision logic. Given the projected trial state and an
//! incoming patient (or a manual override request), produces a tagged
//! [`shared_types::Decision`] that the service layer turns into a
//! `PatientAdded` event.
//!
//! ## Decision Flow
//!
//! ```text
//! addPatient ──→ validate covariates / duplicate id
//!                      │
//!        StrictMinimisation          NonRandomisedBalanced
//!              │                            │
//!        gate draw < weight?          override supplied?
//!         │            │               │           │
//!      minimise    random arm      accept it    minimise
//!         │                        verbatim    (weight ≡ 1)
//!    scorer + tie-break
//! ```
//!
//! Every branch draws only from the deterministic random source, so a
//! replay of the same patient ids against the same seed reproduces the
//! trial history exactly.

pub mod engine;
pub mod validate;

pub use engine::{decide, AllocationDecision};
pub use validate::{
    validate_arm, validate_config, validate_covariates, validate_patch, validate_stored_config,
};
