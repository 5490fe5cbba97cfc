//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. The engine itself never draws
//! randomness: every segment consumes words delivered by a randomness
//! provider. This generator backs the in-process provider used by tests,
//! the demo binary, and benchmarks, so their word streams are reproducible.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use kickoff::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Xorshift never leaves the all-zero state
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create the generator that answers one randomness request.
    ///
    /// The stream depends only on the provider seed and the request token.
    pub fn for_request(provider_seed: u64, request_token: &[u8; 32]) -> Self {
        Self::new(derive_request_seed(provider_seed, request_token))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Fill a slice of words.
    pub fn fill_words(&mut self, out: &mut [u64]) {
        for word in out {
            *word = self.next_u64();
        }
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the seed for one request's word stream.
pub fn derive_request_seed(provider_seed: u64, request_token: &[u8; 32]) -> u64 {
    let mut hasher = StateHasher::new(b"KICKOFF_WORDS_V1");
    hasher.update_u64(provider_seed);
    hasher.update_bytes(request_token);
    let digest = hasher.finalize();

    digest[..8]
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

// =============================================================================
// TESTS
// =============================================================================
