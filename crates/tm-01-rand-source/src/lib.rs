//! # tm-01-rand-source
//!
//! Deterministic Random Source subsystem for Trial-Minimisation.
//!
//! ## Role in System
//!
//! - **Sole entropy source**: every "random" decision in the allocation core
//!   goes through [`draw`], so a trial's entire history is reproducible from
//!   patient ids and the seed alone.
//! - **Purpose separation**: the purpose tag is hashed alongside the inputs,
//!   so the same patient yields independent-looking draws for the gate, the
//!   tie-break, and the random-arm pick.
//!
//! ## Construction
//!
//! SHA-256 over `"{patient_id}:{seed}:{purpose}"`; the first 8 bytes of the
//! digest, read big-endian, divided by 2^64. Output is uniform over [0, 1)
//! and unpredictable without the seed. Pure functions, no side effects.

use sha2::{Digest, Sha256};
use shared_types::Seed;

/// Why a draw is being made. Each purpose is an independent stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    /// Decides minimisation versus pure randomisation for one allocation.
    Gate,
    /// Breaks ties between equally balanced arms.
    Tiebreak,
    /// Picks an arm uniformly when the gate chose randomisation.
    RandomArm,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Gate => "gate",
            Purpose::Tiebreak => "tiebreak",
            Purpose::RandomArm => "randomarm",
        }
    }
}

/// Deterministic uniform draw in [0, 1).
///
/// Same inputs always yield the same output, across runs and platforms.
pub fn draw(patient_id: &str, seed: &Seed, purpose: Purpose) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(patient_id.as_bytes());
    hasher.update(b":");
    hasher.update(seed.expose().as_bytes());
    hasher.update(b":");
    hasher.update(purpose.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    // 2^64 as the divisor keeps the result strictly below 1.0.
    u64::from_be_bytes(prefix) as f64 / (u64::MAX as f64 + 1.0)
}

/// Deterministic uniform index in `0..n`.
///
/// `n` must be non-zero; the clamp guards against the draw rounding up to
/// exactly `n` after the float multiply.
pub fn draw_index(patient_id: &str, seed: &Seed, purpose: Purpose, n: usize) -> usize {
    debug_assert!(n > 0);
    ((draw(patient_id, seed, purpose) * n as f64) as usize).min(n - 1)
}
