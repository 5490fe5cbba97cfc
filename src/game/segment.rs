//! Segment Event Simulation
//!
//! Resolves one segment of play from seven random words and the two sides'
//! current power. Every comparison uses scaled integers so an outcome can be
//! reproduced exactly from the words.
//!
//! ## Word roles
//!
//! ```text
//! ┌──────┬──────────────────────┬──────────────────────────────┐
//! │ word │ role                 │ reduction                    │
//! ├──────┼──────────────────────┼──────────────────────────────┤
//! │  0   │ momentum             │ % 100 < advantage → home     │
//! │  1   │ event type           │ % 100, cumulative weights    │
//! │  2   │ expected-goal jitter │ 900 + % 201 (per mille)      │
//! │  3   │ goal threat          │ % 1000 < success rate        │
//! │  4   │ accuracy             │ % 100: <60 on, <90 off, wood │
//! │  5   │ save check           │ % 100 >= save → goal         │
//! │  6   │ scorer               │ % roster size                │
//! └──────┴──────────────────────┴──────────────────────────────┘
//! ```

use serde::{Serialize, Deserialize};

use crate::core::fixed::{
    scale_permille, JITTER_MIN, JITTER_SPAN, MOMENTUM_BASE, MOMENTUM_DIVISOR, PERCENT,
    SAVE_DEFENSE_REFERENCE, SAVE_PROBABILITY_MAX, SHOT_BASE_RATE, SHOT_RATE_MAX, SHOT_RATE_MIN,
    STRICTNESS_DEFENSE_STEP,
};
use crate::game::state::{Match, PlayerId, Side, TeamPower};
use crate::oracle::OracleError;
use crate::WORDS_PER_SEGMENT;

/// Event weights in bucket order: shot, foul, possession change, corner.
pub const EVENT_WEIGHTS: [u64; 4] = [35, 20, 30, 15];

/// Sum of [`EVENT_WEIGHTS`].
pub const EVENT_WEIGHT_TOTAL: u64 = 100;

/// Accuracy rolls below this are on target.
pub const ON_TARGET_BELOW: u64 = 60;

/// Accuracy rolls below this (and not on target) are off target.
pub const OFF_TARGET_BELOW: u64 = 90;

// =============================================================================
// INPUT
// =============================================================================

/// The seven random words that drive one segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentWords(pub [u64; WORDS_PER_SEGMENT]);

impl SegmentWords {
    /// Momentum roll.
    #[inline]
    pub fn momentum(&self) -> u64 {
        self.0[0]
    }

    /// Event-type roll.
    #[inline]
    pub fn event(&self) -> u64 {
        self.0[1]
    }

    /// Expected-goals jitter.
    #[inline]
    pub fn jitter(&self) -> u64 {
        self.0[2]
    }

    /// Goal-threat roll.
    #[inline]
    pub fn threat(&self) -> u64 {
        self.0[3]
    }

    /// Accuracy roll.
    #[inline]
    pub fn accuracy(&self) -> u64 {
        self.0[4]
    }

    /// Save-check roll.
    #[inline]
    pub fn save(&self) -> u64 {
        self.0[5]
    }

    /// Scorer pick.
    #[inline]
    pub fn scorer(&self) -> u64 {
        self.0[6]
    }
}

impl TryFrom<&[u64]> for SegmentWords {
    type Error = OracleError;

    fn try_from(words: &[u64]) -> Result<Self, Self::Error> {
        let words: [u64; WORDS_PER_SEGMENT] =
            words.try_into().map_err(|_| OracleError::WordCount {
                expected: WORDS_PER_SEGMENT,
                got: words.len(),
            })?;
        Ok(Self(words))
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// What happened in a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentEventKind {
    /// Open-play shot
    Shot,
    /// Foul, no score effect
    Foul,
    /// Possession change, no score effect
    PossessionChange,
    /// Corner, resolved as a shot attempt
    Corner,
}

impl SegmentEventKind {
    /// Does this event lead to a shot attempt?
    pub fn attempts_shot(self) -> bool {
        matches!(self, SegmentEventKind::Shot | SegmentEventKind::Corner)
    }
}

/// Where a threatening shot went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotAccuracy {
    /// Forces a save check
    OnTarget,
    /// Missed
    OffTarget,
    /// Hit the post or bar
    Woodwork,
}

/// Final result of a shot attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotResult {
    /// Threat roll failed
    NotThreatening,
    /// Missed the target
    OffTarget,
    /// Hit the woodwork
    Woodwork,
    /// Keeper saved it
    Saved,
    /// Goal
    Goal,
}

/// A shot attempt and the rate it was judged against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShotAttempt {
    /// Applied success rate, per mille (50..=700)
    pub success_rate: u32,
    /// Save probability, percent (only for on-target shots)
    pub save_probability: Option<u32>,
    /// How it ended
    pub result: ShotResult,
}

/// A confirmed goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalRecord {
    /// Scoring side
    pub side: Side,
    /// Scorer
    pub player_id: PlayerId,
    /// Scorer's lineup index
    pub roster_index: usize,
    /// Home score after the goal
    pub home_score: u32,
    /// Away score after the goal
    pub away_score: u32,
}

/// Full account of one simulated segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentOutcome {
    /// Zero-based segment index
    pub segment: u8,
    /// Home momentum threshold used (0..=100)
    pub advantage: u32,
    /// Side that attacked
    pub attacking: Side,
    /// Classified event
    pub event: SegmentEventKind,
    /// Shot attempt, for shots and corners
    pub shot: Option<ShotAttempt>,
    /// Goal, if one was scored
    pub goal: Option<GoalRecord>,
}

// =============================================================================
// RESOLUTION STEPS
// =============================================================================

/// Home momentum threshold: `clamp(50 + (hA - aD)/5 - (aA - hD)/5, 0, 100)`.
pub fn home_advantage(home: TeamPower, away: TeamPower) -> u32 {
    let home_edge = (home.attack as i64 - away.defense as i64) / MOMENTUM_DIVISOR;
    let away_edge = (away.attack as i64 - home.defense as i64) / MOMENTUM_DIVISOR;
    (MOMENTUM_BASE + home_edge - away_edge).clamp(0, PERCENT) as u32
}

/// Bucket an event roll by cumulative weight.
pub fn classify_event(roll: u64) -> SegmentEventKind {
    const KINDS: [SegmentEventKind; 4] = [
        SegmentEventKind::Shot,
        SegmentEventKind::Foul,
        SegmentEventKind::PossessionChange,
        SegmentEventKind::Corner,
    ];

    let mut bucket = roll % EVENT_WEIGHT_TOTAL;
    for (kind, weight) in KINDS.iter().zip(EVENT_WEIGHTS) {
        if bucket < weight {
            return *kind;
        }
        bucket -= weight;
    }
    // Weights sum to the total, so the loop always returns
    SegmentEventKind::Corner
}

/// Applied shot success rate, per mille, clamped to 50..=700.
pub fn shot_success_rate(attack: u32, defense: u32, referee_strictness: u8, jitter_word: u64) -> u32 {
    let effective_defense =
        (defense as i64 + referee_strictness as i64 * STRICTNESS_DEFENSE_STEP).max(1);
    let jitter = (JITTER_MIN + jitter_word % JITTER_SPAN) as i64;

    let base = (SHOT_BASE_RATE + (attack as i64 - effective_defense) / 2)
        .clamp(SHOT_RATE_MIN, SHOT_RATE_MAX);
    scale_permille(base, jitter).clamp(SHOT_RATE_MIN, SHOT_RATE_MAX) as u32
}

/// Classify an accuracy roll.
pub fn classify_accuracy(roll: u64) -> ShotAccuracy {
    match roll % 100 {
        r if r < ON_TARGET_BELOW => ShotAccuracy::OnTarget,
        r if r < OFF_TARGET_BELOW => ShotAccuracy::OffTarget,
        _ => ShotAccuracy::Woodwork,
    }
}

/// Keeper save probability in percent, capped at 85.
pub fn save_probability(defense: u32) -> u32 {
    (defense as i64 * PERCENT / SAVE_DEFENSE_REFERENCE).min(SAVE_PROBABILITY_MAX) as u32
}

fn resolve_shot(attacker: TeamPower, defender: TeamPower, strictness: u8, words: &SegmentWords) -> ShotAttempt {
    let success_rate = shot_success_rate(attacker.attack, defender.defense, strictness, words.jitter());

    if words.threat() % 1000 >= success_rate as u64 {
        return ShotAttempt { success_rate, save_probability: None, result: ShotResult::NotThreatening };
    }

    match classify_accuracy(words.accuracy()) {
        ShotAccuracy::OffTarget => {
            ShotAttempt { success_rate, save_probability: None, result: ShotResult::OffTarget }
        }
        ShotAccuracy::Woodwork => {
            ShotAttempt { success_rate, save_probability: None, result: ShotResult::Woodwork }
        }
        ShotAccuracy::OnTarget => {
            let save = save_probability(defender.defense);
            let result = if words.save() % 100 >= save as u64 {
                ShotResult::Goal
            } else {
                ShotResult::Saved
            };
            ShotAttempt { success_rate, save_probability: Some(save), result }
        }
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Simulate one segment against the match's current power values.
///
/// Mutates only scores and per-player goal counters. Does not touch the
/// segment counter or status.
pub fn simulate_segment(state: &mut Match, words: &SegmentWords) -> SegmentOutcome {
    let advantage = home_advantage(state.home.power, state.away.power);
    let attacking = if words.momentum() % 100 < advantage as u64 {
        Side::Home
    } else {
        Side::Away
    };

    let event = classify_event(words.event());
    let mut outcome = SegmentOutcome {
        segment: state.current_segment,
        advantage,
        attacking,
        event,
        shot: None,
        goal: None,
    };

    if !event.attempts_shot() {
        return outcome;
    }

    let attacker = state.roster(attacking).power;
    let defender = state.roster(attacking.opposite()).power;
    let shot = resolve_shot(attacker, defender, state.referee_strictness, words);
    outcome.shot = Some(shot);

    if shot.result == ShotResult::Goal {
        let roster = state.roster_mut(attacking);
        roster.score += 1;

        let roster_index = (words.scorer() % roster.players.len() as u64) as usize;
        let scorer = &mut roster.players[roster_index];
        scorer.goals_scored += 1;
        let player_id = scorer.player_id;

        outcome.goal = Some(GoalRecord {
            side: attacking,
            player_id,
            roster_index,
            home_score: state.home.score,
            away_score: state.away.score,
        });
    }

    outcome
}

/// Play the next segment: recompute powers, simulate, advance the counter.
///
/// The single code path shared by live fulfillment and transcript replay.
pub fn play_segment(state: &mut Match, words: &SegmentWords) -> SegmentOutcome {
    state.recompute_powers();
    let outcome = simulate_segment(state, words);
    state.current_segment += 1;
    outcome
}

// =============================================================================
// TESTS
// =============================================================================
