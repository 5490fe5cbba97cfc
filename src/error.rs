//! Engine errors.
//!
//! Every rejected operation leaves the engine exactly as it was.

use thiserror::Error;

use crate::access::{AccessDenied, Operation, Role};
use crate::game::state::{AccountId, MatchId, MatchStatus, PlayerId, Side};
use crate::oracle::{CorrelationError, OracleError};
use crate::registry::RegistryError;

/// Bad match-creation input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Roster outside 1..=11 players
    #[error("{side} roster has {size} players, expected 1 to 11")]
    RosterSize {
        /// Offending side
        side: Side,
        /// Players supplied
        size: usize,
    },

    /// Tactic code not 0, 1 or 2
    #[error("{side} tactic code {code} is invalid")]
    InvalidTactic {
        /// Offending side
        side: Side,
        /// Code supplied
        code: u8,
    },

    /// Strictness above 10
    #[error("referee strictness {0} exceeds 10")]
    RefereeStrictness(u8),

    /// Player not in the registry
    #[error("player {0} does not exist")]
    UnknownPlayer(PlayerId),

    /// Same player listed twice across the two rosters
    #[error("player {0} listed more than once")]
    DuplicatePlayer(PlayerId),
}

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Creation input rejected
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Operation not valid in the match's current state
    #[error("match {match_id} is {status}, cannot {operation}")]
    State {
        /// Match
        match_id: MatchId,
        /// Status at the time of the call
        status: MatchStatus,
        /// Rejected operation
        operation: Operation,
    },

    /// Token unknown or already consumed
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// Match already concluded or failed
    #[error("match {match_id} is terminal ({status})")]
    TerminalState {
        /// Match
        match_id: MatchId,
        /// Terminal status
        status: MatchStatus,
    },

    /// Caller lacks the required role
    #[error("caller {caller} may not {operation} (requires {required:?})")]
    Unauthorized {
        /// Caller
        caller: AccountId,
        /// Rejected operation
        operation: Operation,
        /// Role required
        required: Role,
    },

    /// No match with this id
    #[error("unknown match {0}")]
    UnknownMatch(MatchId),

    /// Randomness provider failure
    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    /// Registry failure
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
}

impl From<AccessDenied> for EngineError {
    fn from(denied: AccessDenied) -> Self {
        EngineError::Unauthorized {
            caller: denied.caller,
            operation: denied.operation,
            required: denied.required,
        }
    }
}

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;
