//! Core deterministic primitives.
//!
//! Everything the simulation computes flows through these helpers so that a
//! match replays bit-for-bit from its random words.

pub mod fixed;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{scale_pct, scale_permille, PERCENT, PERMILLE};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
