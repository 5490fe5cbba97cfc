//! Local Randomness Provider
//!
//! Deterministic in-process stand-in for an external VRF. Tokens are
//! SHA-256 digests of the provider seed, a nonce and the key hash; the words
//! for a token come from a Xorshift128+ stream seeded by the same pair, so a
//! whole match can be reproduced from one `u64`.

use std::collections::VecDeque;

use crate::core::hash::StateHasher;
use crate::core::rng::DeterministicRng;
use crate::oracle::{OracleError, RandomnessConfig, RandomnessOracle, RequestId};
use crate::WORDS_PER_SEGMENT;

/// Seeded provider that queues issued tokens until someone delivers them.
#[derive(Debug, Clone)]
pub struct LocalOracle {
    seed: u64,
    nonce: u64,
    pending: VecDeque<RequestId>,
    failing: Option<String>,
}

impl LocalOracle {
    /// Provider with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            nonce: 0,
            pending: VecDeque::new(),
            failing: None,
        }
    }

    /// Provider seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Make every following request fail with `reason`, or recover with `None`.
    pub fn set_failing(&mut self, reason: Option<String>) {
        self.failing = reason;
    }

    /// Tokens issued so far.
    pub fn issued_count(&self) -> u64 {
        self.nonce
    }

    /// Tokens waiting for delivery.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Take every token waiting for delivery, oldest first.
    pub fn take_pending(&mut self) -> Vec<RequestId> {
        self.pending.drain(..).collect()
    }

    /// The words this provider answers `request_id` with.
    pub fn words_for(&self, request_id: &RequestId) -> [u64; WORDS_PER_SEGMENT] {
        let mut words = [0u64; WORDS_PER_SEGMENT];
        DeterministicRng::for_request(self.seed, request_id.as_bytes()).fill_words(&mut words);
        words
    }

    fn next_token(&mut self, config: &RandomnessConfig) -> RequestId {
        let mut hasher = StateHasher::for_request_token();
        hasher.update_u64(self.seed);
        hasher.update_u64(self.nonce);
        hasher.update_bytes(&config.key_hash);
        self.nonce += 1;
        RequestId::new(hasher.finalize())
    }
}

impl Default for LocalOracle {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RandomnessOracle for LocalOracle {
    fn request_randomness(&mut self, config: &RandomnessConfig) -> Result<RequestId, OracleError> {
        if let Some(reason) = &self.failing {
            tracing::warn!(reason = %reason, "local oracle refusing request");
            return Err(OracleError::Unavailable(reason.clone()));
        }
        config.validate()?;

        let token = self.next_token(config);
        self.pending.push_back(token);
        tracing::debug!(token = %token.short(), nonce = self.nonce, "randomness requested");
        Ok(token)
    }
}
