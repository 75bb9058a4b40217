//! # Shared Types Crate
//!
//! This crate contains all domain entities, trial events, and the shared
//! error taxonomy for the trial-minimisation workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Log Is Authoritative**: `TrialState` is always derived from the event
//!   sequence; it is never a second store of record.
//! - **Seed Secrecy**: The allocation seed is held in a [`Seed`] newtype that
//!   does not implement `Serialize` and whose `Debug`/`Display` output is
//!   only its fingerprint.

pub mod entities;
pub mod errors;
pub mod events;

pub use entities::*;
pub use errors::*;
pub use events::*;
