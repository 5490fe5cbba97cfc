//! Match Events
//!
//! Ordered record of state transitions for indexing and audit. Every record
//! carries a global sequence number; records are appended only when the
//! operation that produced them commits.

use serde::{Serialize, Deserialize};

use crate::game::segment::{SegmentEventKind, ShotResult};
use crate::game::state::{AccountId, MatchId, PlayerId, Side, TacticalStyle};
use crate::oracle::RequestId;

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchEventData {
    /// Match created and rosters frozen
    MatchCreated {
        /// Account that created the match
        initiator: AccountId,
        /// Home lineup in roster order
        home_players: Vec<PlayerId>,
        /// Away lineup in roster order
        away_players: Vec<PlayerId>,
        /// Home tactic
        home_tactic: TacticalStyle,
        /// Away tactic
        away_tactic: TacticalStyle,
        /// Referee strictness (0-10)
        referee_strictness: u8,
    },

    /// Randomness requested for a segment
    SegmentSimulationStarted {
        /// Segment the words will resolve
        segment: u8,
        /// Provider token
        request_id: RequestId,
    },

    /// A segment was resolved
    SegmentResolved {
        /// Zero-based segment index
        segment: u8,
        /// Side that attacked
        attacking: Side,
        /// Classified event
        event: SegmentEventKind,
        /// Shot result, for shots and corners
        shot: Option<ShotResult>,
    },

    /// Goal scored, with the running score
    GoalScored {
        /// Segment of the goal
        segment: u8,
        /// Scoring side
        side: Side,
        /// Scorer
        player_id: PlayerId,
        /// Home score after the goal
        home_score: u32,
        /// Away score after the goal
        away_score: u32,
    },

    /// All segments played
    MatchConcluded {
        /// Final home score
        home_score: u32,
        /// Final away score
        away_score: u32,
        /// Winner, `None` on a draw
        winner: Option<Side>,
    },

    /// Experience written to the registry
    ExperienceAwarded {
        /// Recipient
        player_id: PlayerId,
        /// Experience amount
        amount: u32,
    },

    /// A randomness request was abandoned or could not be issued
    RandomnessRequestFailed {
        /// Abandoned token, `None` when no token was issued
        request_id: Option<RequestId>,
        /// Why
        reason: String,
    },
}

impl MatchEventData {
    /// Short event name for logs and filters.
    pub fn name(&self) -> &'static str {
        match self {
            MatchEventData::MatchCreated { .. } => "match_created",
            MatchEventData::SegmentSimulationStarted { .. } => "segment_simulation_started",
            MatchEventData::SegmentResolved { .. } => "segment_resolved",
            MatchEventData::GoalScored { .. } => "goal_scored",
            MatchEventData::MatchConcluded { .. } => "match_concluded",
            MatchEventData::ExperienceAwarded { .. } => "experience_awarded",
            MatchEventData::RandomnessRequestFailed { .. } => "randomness_request_failed",
        }
    }
}

/// A sequenced event record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Global sequence number (starts at 1)
    pub sequence: u64,
    /// Match the event belongs to
    pub match_id: MatchId,
    /// Event data
    pub data: MatchEventData,
}

/// Events produced by an operation that has not committed yet.
#[derive(Debug, Default)]
pub struct StagedEvents {
    pending: Vec<(MatchId, MatchEventData)>,
}

impl StagedEvents {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an event.
    pub fn push(&mut self, match_id: MatchId, data: MatchEventData) {
        self.pending.push((match_id, data));
    }

    /// Number of staged events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Nothing staged?
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Append-only event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLog {
    next_sequence: u64,
    records: Vec<MatchEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            records: Vec::new(),
        }
    }

    /// Append staged events in order.
    pub fn commit(&mut self, staged: StagedEvents) {
        for (match_id, data) in staged.pending {
            tracing::debug!(match_id, event = data.name(), seq = self.next_sequence, "event");
            self.records.push(MatchEvent {
                sequence: self.next_sequence,
                match_id,
                data,
            });
            self.next_sequence += 1;
        }
    }

    /// All retained records.
    pub fn records(&self) -> &[MatchEvent] {
        &self.records
    }

    /// Records for one match.
    pub fn for_match(&self, match_id: MatchId) -> impl Iterator<Item = &MatchEvent> {
        self.records.iter().filter(move |e| e.match_id == match_id)
    }

    /// Records with a sequence number greater than `sequence`.
    pub fn since(&self, sequence: u64) -> &[MatchEvent] {
        let start = self.records.partition_point(|e| e.sequence <= sequence);
        &self.records[start..]
    }

    /// Take retained records; sequence numbering continues.
    pub fn drain(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.records)
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No retained records?
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Export retained records as JSON lines.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn award(player: u64) -> MatchEventData {
        MatchEventData::ExperienceAwarded {
            player_id: PlayerId(player),
            amount: 100,
        }
    }

    #[test]
    fn test_sequence_is_global_and_monotonic() {
        let mut log = EventLog::new();

        let mut first = StagedEvents::new();
        first.push(1, award(1));
        first.push(2, award(2));
        log.commit(first);

        let mut second = StagedEvents::new();
        second.push(1, award(3));
        log.commit(second);

        let seqs: Vec<u64> = log.records().iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(log.for_match(1).count(), 2);
        assert_eq!(log.since(1).len(), 2);
    }

    #[test]
    fn test_default_log_starts_at_one() {
        let mut log = EventLog::default();
        let mut staged = StagedEvents::new();
        staged.push(3, award(1));
        log.commit(staged);

        assert_eq!(log.records()[0].sequence, 1);
        assert_eq!(log.since(0).len(), 1);
    }

    #[test]
    fn test_drain_keeps_numbering() {
        let mut log = EventLog::new();
        let mut staged = StagedEvents::new();
        staged.push(1, award(1));
        log.commit(staged);

        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());

        let mut staged = StagedEvents::new();
        staged.push(1, award(2));
        log.commit(staged);
        assert_eq!(log.records()[0].sequence, 2);
    }

    #[test]
    fn test_json_lines_export() {
        let mut log = EventLog::new();
        let mut staged = StagedEvents::new();
        staged.push(4, MatchEventData::MatchConcluded {
            home_score: 2,
            away_score: 1,
            winner: Some(Side::Home),
        });
        staged.push(4, award(9));
        log.commit(staged);

        let text = log.to_json_lines().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: MatchEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, log.records()[0]);
    }
}
