//! Match Transcript Recording
//!
//! Everything needed to replay a match from scratch: the frozen rosters, the
//! words delivered for each segment, and a state hash after every segment.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::StateHash;
use crate::game::reward::ExperienceAward;
use crate::game::segment::{GoalRecord, SegmentOutcome, SegmentWords};
use crate::game::state::{AccountId, Match, MatchId, Side, TeamRoster};
use crate::oracle::RequestId;

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Complete record of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTranscript {
    /// Version for forward compatibility.
    pub version: u8,

    /// Who, when, and under which rules.
    pub metadata: MatchMetadata,

    /// Rosters as snapshotted at creation.
    pub initial_state: InitialMatchState,

    /// One record per resolved segment, in order.
    pub segments: Vec<SegmentRecord>,

    /// Final result, once concluded.
    pub result: Option<MatchResult>,
}

/// Match metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchMetadata {
    /// Match identifier.
    pub match_id: MatchId,
    /// Caller that created the match.
    pub initiator: AccountId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Referee strictness (0..=10).
    pub referee_strictness: u8,
}

/// Initial state snapshot at segment 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialMatchState {
    /// Home roster.
    pub home: TeamRoster,
    /// Away roster.
    pub away: TeamRoster,
    /// Hash of the initial state.
    pub state_hash: StateHash,
}

/// One resolved segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Zero-based segment index.
    pub segment: u8,
    /// Token the words arrived under.
    pub request_id: RequestId,
    /// The words.
    pub words: SegmentWords,
    /// Goal scored, if any.
    pub goal: Option<GoalRecord>,
    /// State hash after the segment.
    pub state_hash: StateHash,
}

/// Final match outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Home goals.
    pub home_score: u32,
    /// Away goals.
    pub away_score: u32,
    /// Winner, `None` on a draw.
    pub winner: Option<Side>,
    /// Experience paid, home first.
    pub awards: Vec<ExperienceAward>,
    /// State hash after the last segment.
    pub final_state_hash: StateHash,
}

/// Transcript encoding errors.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Encoding failed
    #[error("serialization failed: {0}")]
    SerializationFailed(String),
    /// Decoding failed
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),
    /// Unsupported version
    #[error("unsupported transcript version {0}")]
    UnsupportedVersion(u8),
}

impl MatchTranscript {
    /// Start a transcript from a freshly created match.
    pub fn begin(state: &Match) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            metadata: MatchMetadata {
                match_id: state.id,
                initiator: state.initiator,
                created_at: state.created_at,
                referee_strictness: state.referee_strictness,
            },
            initial_state: InitialMatchState {
                home: state.home.clone(),
                away: state.away.clone(),
                state_hash: state.compute_hash(),
            },
            segments: Vec::new(),
            result: None,
        }
    }

    /// Record a resolved segment. `state` is the match after the segment.
    pub fn record_segment(
        &mut self,
        request_id: RequestId,
        words: SegmentWords,
        outcome: &SegmentOutcome,
        state: &Match,
    ) {
        self.segments.push(SegmentRecord {
            segment: outcome.segment,
            request_id,
            words,
            goal: outcome.goal,
            state_hash: state.compute_hash(),
        });
    }

    /// Close the transcript with the final result.
    pub fn finalize(&mut self, state: &Match, awards: Vec<ExperienceAward>) {
        self.result = Some(MatchResult {
            home_score: state.home.score,
            away_score: state.away.score,
            winner: state.winner(),
            awards,
            final_state_hash: state.compute_hash(),
        });
    }

    /// Has the match concluded?
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Rebuild the match as it stood at creation.
    pub fn initial_match(&self) -> Match {
        Match::new(
            self.metadata.match_id,
            self.initial_state.home.clone(),
            self.initial_state.away.clone(),
            self.metadata.initiator,
            self.metadata.referee_strictness,
            self.metadata.created_at,
        )
    }

    /// Serialize with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TranscriptError> {
        bincode::serialize(self).map_err(|e| TranscriptError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bincode bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscriptError> {
        let transcript: Self = bincode::deserialize(data)
            .map_err(|e| TranscriptError::DeserializationFailed(e.to_string()))?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(TranscriptError::UnsupportedVersion(transcript.version));
        }
        Ok(transcript)
    }
}
