//! # tm-04-event-log
//!
//! Event Log / State Projector subsystem for Trial-Minimisation.
//!
//! ## Role in System
//!
//! - **Canonical History**: the append-only event sequence is the sole
//!   source of truth for a trial; every other structure is derived.
//! - **Pure Projection**: current state is a left fold over events; two
//!   projections of the same prefix are bit-identical.
//! - **Rollback as a Read**: point-in-time state is a projection of a log
//!   prefix. Later events are never deleted; appends always continue from
//!   the true head.
//!
//! ## Structure
//!
//! - `domain::projector` — the pure fold (`init`/`apply`/`project`)
//! - `domain::journal` — ordered in-memory log with all-or-nothing staging
//! - `ports` — `EventStore` and `TimeSource` traits for the storage and
//!   clock collaborators
//! - `adapters` — in-memory store and the file-per-event JSON store

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
