//! Match State Definitions
//!
//! Rosters are frozen snapshots taken at match creation. The only fields that
//! change during play are scores, per-player goal counters, derived team
//! power, the segment counter, status, and the outstanding request token.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::fixed::{TACTIC_BOOST_PCT, TACTIC_PENALTY_PCT, PERCENT};
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::power::team_power;
use crate::oracle::RequestId;
use crate::SEGMENT_COUNT;

/// Match identifier (monotonic, starting at 1).
pub type MatchId = u64;

// =============================================================================
// IDENTITIES
// =============================================================================

/// Registry token id of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a caller or asset owner (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct AccountId(pub [u8; 16]);

impl AccountId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random account (UUID v4).
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

// =============================================================================
// PLAYER SNAPSHOT
// =============================================================================

/// Attribute record read from the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerAttributes {
    /// Attacking quality
    pub attack: u32,
    /// Defending quality
    pub defense: u32,
    /// Stamina (carried for the registry, unused by the segment model)
    pub stamina: u32,
    /// Current form, 0..=100 with 50 neutral
    pub form: u32,
    /// Morale (carried for the registry, unused by the segment model)
    pub morale: u32,
}

impl PlayerAttributes {
    /// Neutral form, stamina and morale with the given attack and defense.
    pub const fn new(attack: u32, defense: u32) -> Self {
        Self {
            attack,
            defense,
            stamina: 50,
            form: 50,
            morale: 50,
        }
    }

    /// Same attributes with a different form value.
    pub const fn with_form(mut self, form: u32) -> Self {
        self.form = form;
        self
    }
}

/// A player's attributes frozen at match creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Registry reference
    pub player_id: PlayerId,
    /// Owner at snapshot time
    pub owner: AccountId,
    /// Frozen attributes
    pub attributes: PlayerAttributes,
    /// Goals scored in this match
    pub goals_scored: u32,
}

impl PlayerSnapshot {
    /// Snapshot a player with no goals.
    pub fn new(player_id: PlayerId, owner: AccountId, attributes: PlayerAttributes) -> Self {
        Self {
            player_id,
            owner,
            attributes,
            goals_scored: 0,
        }
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.player_id.0);
        hasher.update_bytes(self.owner.as_bytes());
        hasher.update_u32(self.attributes.attack);
        hasher.update_u32(self.attributes.defense);
        hasher.update_u32(self.attributes.form);
        hasher.update_u32(self.goals_scored);
    }
}

// =============================================================================
// TACTICS AND SIDES
// =============================================================================

/// Tactical profile trading attack for defense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum TacticalStyle {
    /// No modifier
    #[default]
    Balanced = 0,
    /// Attack ×1.10, defense ×0.85
    Aggressive = 1,
    /// Attack ×0.85, defense ×1.10
    Defensive = 2,
}

impl TacticalStyle {
    /// Decode a tactic code (0-2).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TacticalStyle::Balanced),
            1 => Some(TacticalStyle::Aggressive),
            2 => Some(TacticalStyle::Defensive),
            _ => None,
        }
    }

    /// Wire code of this tactic.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Attack multiplier (percent).
    #[inline]
    pub fn attack_pct(self) -> i64 {
        match self {
            TacticalStyle::Balanced => PERCENT,
            TacticalStyle::Aggressive => TACTIC_BOOST_PCT,
            TacticalStyle::Defensive => TACTIC_PENALTY_PCT,
        }
    }

    /// Defense multiplier (percent).
    #[inline]
    pub fn defense_pct(self) -> i64 {
        match self {
            TacticalStyle::Balanced => PERCENT,
            TacticalStyle::Aggressive => TACTIC_PENALTY_PCT,
            TacticalStyle::Defensive => TACTIC_BOOST_PCT,
        }
    }
}

/// Home or away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Receives home advantage
    Home,
    /// No advantage
    Away,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    /// Is this the home side?
    pub fn is_home(self) -> bool {
        matches!(self, Side::Home)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => f.write_str("home"),
            Side::Away => f.write_str("away"),
        }
    }
}

// =============================================================================
// TEAM ROSTER
// =============================================================================

/// Effective team power for one segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamPower {
    /// Attack power
    pub attack: u32,
    /// Defense power
    pub defense: u32,
}

impl TeamPower {
    /// Create a power pair.
    pub const fn new(attack: u32, defense: u32) -> Self {
        Self { attack, defense }
    }
}

/// One side of a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    /// Snapshots in lineup order (scorer picks index into this)
    pub players: Vec<PlayerSnapshot>,
    /// Tactical style for the whole match
    pub tactic: TacticalStyle,
    /// Derived power, recomputed every segment
    pub power: TeamPower,
    /// Goals scored
    pub score: u32,
}

impl TeamRoster {
    /// Build a roster with zero power and score.
    pub fn new(players: Vec<PlayerSnapshot>, tactic: TacticalStyle) -> Self {
        Self {
            players,
            tactic,
            power: TeamPower::default(),
            score: 0,
        }
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Is the roster empty?
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Recompute derived power from the frozen snapshots.
    pub fn recompute_power(&mut self, side: Side) {
        self.power = team_power(&self.players, self.tactic, side.is_home());
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.tactic.code());
        hasher.update_u32(self.power.attack);
        hasher.update_u32(self.power.defense);
        hasher.update_u32(self.score);
        hasher.update_u32(self.players.len() as u32);
        for player in &self.players {
            player.hash_into(hasher);
        }
    }
}

// =============================================================================
// MATCH STATUS
// =============================================================================

/// Lifecycle state of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum MatchStatus {
    /// Placeholder, never entered
    #[default]
    Pending,
    /// Rosters snapshotted, no request issued yet
    Setup,
    /// Waiting on randomness, progressing automatically
    Active,
    /// Parked between segments, resumed manually
    Cooldown,
    /// All segments played, rewards paid
    Concluded,
    /// Administratively failed, no rewards
    Failed,
}

impl MatchStatus {
    /// Concluded or Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Concluded | MatchStatus::Failed)
    }

    /// Active or Cooldown.
    pub fn is_in_play(self) -> bool {
        matches!(self, MatchStatus::Active | MatchStatus::Cooldown)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Setup => "setup",
            MatchStatus::Active => "active",
            MatchStatus::Cooldown => "cooldown",
            MatchStatus::Concluded => "concluded",
            MatchStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

// =============================================================================
// MATCH
// =============================================================================

/// A match between two frozen rosters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Match {
    /// Match identifier
    pub id: MatchId,
    /// Lifecycle state
    pub status: MatchStatus,
    /// Home roster
    pub home: TeamRoster,
    /// Away roster
    pub away: TeamRoster,
    /// Segments completed (0..=SEGMENT_COUNT)
    pub current_segment: u8,
    /// Outstanding randomness request, if any
    pub last_request_id: Option<RequestId>,
    /// Caller that created the match
    pub initiator: AccountId,
    /// Creation time (not part of the state hash)
    pub created_at: DateTime<Utc>,
    /// Referee strictness, 0..=10
    pub referee_strictness: u8,
}

impl Match {
    /// Create a match in Setup with initial powers computed.
    pub fn new(
        id: MatchId,
        home: TeamRoster,
        away: TeamRoster,
        initiator: AccountId,
        referee_strictness: u8,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut new_match = Self {
            id,
            status: MatchStatus::Setup,
            home,
            away,
            current_segment: 0,
            last_request_id: None,
            initiator,
            created_at,
            referee_strictness,
        };
        new_match.recompute_powers();
        new_match
    }

    /// Get a roster by side.
    pub fn roster(&self, side: Side) -> &TeamRoster {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// Get a roster mutably by side.
    pub fn roster_mut(&mut self, side: Side) -> &mut TeamRoster {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    /// Recompute both sides' power.
    pub fn recompute_powers(&mut self) {
        self.home.recompute_power(Side::Home);
        self.away.recompute_power(Side::Away);
    }

    /// Has the segment budget been used up?
    pub fn is_finished(&self) -> bool {
        self.current_segment >= SEGMENT_COUNT
    }

    /// Segments still to play.
    pub fn segments_remaining(&self) -> u8 {
        SEGMENT_COUNT.saturating_sub(self.current_segment)
    }

    /// Winning side, `None` on a draw.
    pub fn winner(&self) -> Option<Side> {
        match self.home.score.cmp(&self.away.score) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// (home, away) score.
    pub fn score(&self) -> (u32, u32) {
        (self.home.score, self.away.score)
    }

    /// Compute hash of current state for verification.
    ///
    /// Covers everything the simulation reads or writes. Status, request
    /// token, initiator and timestamp are bookkeeping and stay out.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.id, self.current_segment, |hasher| {
            hasher.update_u8(self.referee_strictness);
            self.home.hash_into(hasher);
            self.away.hash_into(hasher);
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
