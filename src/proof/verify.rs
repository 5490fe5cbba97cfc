//! Verification API
//!
//! Verify a match by replaying its transcript through the same segment code
//! the controller runs, comparing state hashes after every segment and the
//! final result.

use thiserror::Error;

use crate::core::hash::StateHash;
use crate::game::reward::compute_rewards;
use crate::game::segment::play_segment;
use crate::game::state::{Match, Side};
use crate::proof::transcript::{MatchTranscript, TRANSCRIPT_VERSION};
use crate::{MAX_REFEREE_STRICTNESS, MAX_ROSTER_SIZE, MIN_ROSTER_SIZE, SEGMENT_COUNT};

/// Verification result.
#[derive(Debug)]
pub struct VerificationResult {
    /// Did verification pass?
    pub valid: bool,

    /// Final state hash from replay.
    pub computed_final_hash: StateHash,

    /// Per-segment checkpoint results, in replay order.
    pub checkpoint_results: Vec<CheckpointResult>,

    /// First failure, if any.
    pub error: Option<VerificationError>,
}

/// Result of checking one segment's hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointResult {
    /// Segment index.
    pub segment: u8,
    /// Hash recorded in the transcript.
    pub expected: StateHash,
    /// Hash from replay.
    pub computed: StateHash,
    /// Did they match?
    pub valid: bool,
}

/// Why a transcript failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Transcript version mismatch.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Supported version.
        expected: u8,
        /// Transcript version.
        got: u8,
    },

    /// Recorded roster could never have been created.
    #[error("{side} roster has {size} players")]
    RosterSize {
        /// Offending side.
        side: Side,
        /// Recorded size.
        size: usize,
    },

    /// Recorded strictness is out of range.
    #[error("referee strictness {0} out of range")]
    RefereeStrictness(u8),

    /// Initial state hash mismatch.
    #[error("initial state hash mismatch")]
    InitialStateMismatch,

    /// Segments out of order or too many.
    #[error("segment {found} recorded where segment {expected} was due")]
    SegmentOrder {
        /// Index due next.
        expected: u8,
        /// Index found.
        found: u8,
    },

    /// Segment hash mismatch.
    #[error("state hash mismatch after segment {segment}")]
    CheckpointMismatch {
        /// Segment index.
        segment: u8,
    },

    /// Recorded goal differs from the replayed one.
    #[error("goal record mismatch in segment {segment}")]
    GoalMismatch {
        /// Segment index.
        segment: u8,
    },

    /// Final score, winner, awards or hash differ.
    #[error("match result mismatch")]
    ResultMismatch,

    /// Transcript has no result.
    #[error("transcript is incomplete")]
    IncompleteTranscript,
}

impl VerificationResult {
    fn failed(
        computed_final_hash: StateHash,
        checkpoint_results: Vec<CheckpointResult>,
        error: VerificationError,
    ) -> Self {
        Self {
            valid: false,
            computed_final_hash,
            checkpoint_results,
            error: Some(error),
        }
    }
}

/// Replay the recorded segments and check each checkpoint.
///
/// Works on incomplete transcripts (in-play or failed matches). Returns the
/// replayed match state and the checkpoint results, or the first error.
pub fn replay_segments(
    transcript: &MatchTranscript,
) -> Result<(Match, Vec<CheckpointResult>), (VerificationError, Vec<CheckpointResult>)> {
    let mut checkpoints = Vec::with_capacity(transcript.segments.len());

    if transcript.version != TRANSCRIPT_VERSION {
        return Err((
            VerificationError::VersionMismatch { expected: TRANSCRIPT_VERSION, got: transcript.version },
            checkpoints,
        ));
    }

    for (side, roster) in [(Side::Home, &transcript.initial_state.home), (Side::Away, &transcript.initial_state.away)] {
        if !(MIN_ROSTER_SIZE..=MAX_ROSTER_SIZE).contains(&roster.players.len()) {
            return Err((VerificationError::RosterSize { side, size: roster.players.len() }, checkpoints));
        }
    }
    if transcript.metadata.referee_strictness > MAX_REFEREE_STRICTNESS {
        return Err((
            VerificationError::RefereeStrictness(transcript.metadata.referee_strictness),
            checkpoints,
        ));
    }

    let mut state = transcript.initial_match();
    if state.compute_hash() != transcript.initial_state.state_hash {
        return Err((VerificationError::InitialStateMismatch, checkpoints));
    }

    for record in &transcript.segments {
        if record.segment != state.current_segment || state.is_finished() {
            return Err((
                VerificationError::SegmentOrder { expected: state.current_segment, found: record.segment },
                checkpoints,
            ));
        }

        let outcome = play_segment(&mut state, &record.words);
        let computed = state.compute_hash();
        let valid = computed == record.state_hash;
        checkpoints.push(CheckpointResult {
            segment: record.segment,
            expected: record.state_hash,
            computed,
            valid,
        });

        if !valid {
            return Err((VerificationError::CheckpointMismatch { segment: record.segment }, checkpoints));
        }
        if outcome.goal != record.goal {
            return Err((VerificationError::GoalMismatch { segment: record.segment }, checkpoints));
        }
    }

    Ok((state, checkpoints))
}

/// Verify a concluded match by full replay.
pub fn verify_transcript(transcript: &MatchTranscript) -> VerificationResult {
    let Some(result) = &transcript.result else {
        return VerificationResult::failed([0; 32], Vec::new(), VerificationError::IncompleteTranscript);
    };

    let (state, checkpoints) = match replay_segments(transcript) {
        Ok(replayed) => replayed,
        Err((error, checkpoints)) => {
            let last = checkpoints.last().map(|c| c.computed).unwrap_or([0; 32]);
            return VerificationResult::failed(last, checkpoints, error);
        }
    };

    let computed_final_hash = state.compute_hash();
    if state.current_segment != SEGMENT_COUNT {
        return VerificationResult::failed(computed_final_hash, checkpoints, VerificationError::IncompleteTranscript);
    }

    let matches_result = computed_final_hash == result.final_state_hash
        && state.score() == (result.home_score, result.away_score)
        && state.winner() == result.winner
        && compute_rewards(&state) == result.awards;

    if !matches_result {
        return VerificationResult::failed(computed_final_hash, checkpoints, VerificationError::ResultMismatch);
    }

    VerificationResult {
        valid: true,
        computed_final_hash,
        checkpoint_results: checkpoints,
        error: None,
    }
}
