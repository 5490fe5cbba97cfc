//! Randomness Oracle
//!
//! Two-phase protocol. Phase one asks a provider for randomness and gets back
//! an opaque request token; phase two arrives later, through the controller,
//! carrying the token and the words. The gateway remembers which match and
//! segment each token belongs to.

pub mod gateway;
pub mod local;

use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::WORDS_PER_SEGMENT;

pub use gateway::{Correlation, CorrelationError, RandomnessGateway};
pub use local::LocalOracle;

/// Opaque request token issued by a provider.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub [u8; 32]);

impl RequestId {
    /// Wrap raw token bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.short())
    }
}

/// Parameters sent with every randomness request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessConfig {
    /// Provider key hash
    pub key_hash: [u8; 32],
    /// Confirmations the provider waits before answering
    pub confirmations: u16,
    /// Resource limit for the fulfillment callback
    pub callback_limit: u32,
    /// Words per request (always 7)
    pub word_count: u32,
}

impl Default for RandomnessConfig {
    fn default() -> Self {
        Self {
            key_hash: [0; 32],
            confirmations: 3,
            callback_limit: 500_000,
            word_count: WORDS_PER_SEGMENT as u32,
        }
    }
}

impl RandomnessConfig {
    /// Check the parameters are usable by the engine.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.word_count as usize != WORDS_PER_SEGMENT {
            return Err(OracleError::UnsupportedWordCount(self.word_count));
        }
        Ok(())
    }
}

/// Randomness provider errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Provider refused or could not take the request
    #[error("randomness provider unavailable: {0}")]
    Unavailable(String),

    /// Fulfillment carried the wrong number of words
    #[error("expected {expected} random words, got {got}")]
    WordCount {
        /// Words required
        expected: usize,
        /// Words delivered
        got: usize,
    },

    /// Configuration asks for a word count the engine cannot use
    #[error("unsupported word count {0}")]
    UnsupportedWordCount(u32),

    /// Provider issued a token that is already live
    #[error("provider issued duplicate request token")]
    DuplicateToken,
}

/// Phase one of the randomness protocol.
///
/// Implementations return a token that will later come back with the words.
/// The trait says nothing about how or when the words are delivered.
pub trait RandomnessOracle {
    /// Ask for one batch of random words.
    fn request_randomness(&mut self, config: &RandomnessConfig) -> Result<RequestId, OracleError>;
}

impl<T: RandomnessOracle + ?Sized> RandomnessOracle for Box<T> {
    fn request_randomness(&mut self, config: &RandomnessConfig) -> Result<RequestId, OracleError> {
        (**self).request_randomness(config)
    }
}
