//! # tm-05-trial-service
//!
//! Trial Service subsystem for Trial-Minimisation: the public operation
//! surface over one trial.
//!
//! ## Role in System
//!
//! - **Explicit Handle**: a [`Trial`] owns its lock, journal, and storage
//!   reference. There is no process-wide trial registry; callers hold the
//!   handle for each trial they operate on.
//! - **Single Writer**: every mutating operation acquires the per-trial
//!   write lock with a timeout, stages the event against the current
//!   projection, persists it, and only then commits — so concurrent
//!   requests can never both read the same active-set snapshot and append
//!   conflicting sequence numbers.
//! - **Trusted Actor Ids**: the access-control collaborator supplies an
//!   opaque acting-user identifier per mutating call; it is stored verbatim
//!   and never interpreted.
//!
//! Reads fold immutable snapshots and may proceed concurrently; rollback
//! views are prefix projections and never truncate history.

pub mod service;

pub use service::{AllocationOutcome, Trial, DEFAULT_LOCK_TIMEOUT};
