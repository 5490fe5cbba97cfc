//! Player Registry
//!
//! The engine reads attributes and owners at match creation and writes
//! experience at conclusion. Nothing else crosses this boundary.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::{AccountId, PlayerAttributes, PlayerId};

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No player with this id
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// Experience counter would overflow
    #[error("experience overflow for player {0}")]
    ExperienceOverflow(PlayerId),
}

/// Narrow view of the player-attribute and ownership registry.
pub trait PlayerRegistry {
    /// Current attributes of a player.
    fn attributes(&self, id: PlayerId) -> Result<PlayerAttributes, RegistryError>;

    /// Does the player exist?
    fn exists(&self, id: PlayerId) -> bool;

    /// Current owner of a player.
    fn owner_of(&self, id: PlayerId) -> Result<AccountId, RegistryError>;

    /// Would `add_experience(id, amount)` succeed right now?
    ///
    /// Checked for every recipient before the first write of a reward batch.
    fn can_add_experience(&self, id: PlayerId, amount: u64) -> Result<(), RegistryError> {
        let _ = amount;
        if self.exists(id) {
            Ok(())
        } else {
            Err(RegistryError::UnknownPlayer(id))
        }
    }

    /// Credit experience to a player.
    fn add_experience(&mut self, id: PlayerId, amount: u64) -> Result<(), RegistryError>;
}

// =============================================================================
// IN-MEMORY REGISTRY
// =============================================================================

/// Experience needed to reach each tier above Rookie.
pub const TIER_THRESHOLDS: [u64; 4] = [100, 300, 600, 1000];

/// Progression tier derived from accumulated experience.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum Tier {
    /// Tier 1
    #[default]
    Rookie = 0,
    /// Tier 2
    Regular = 1,
    /// Tier 3
    Starter = 2,
    /// Tier 4
    Star = 3,
    /// Tier 5
    Legend = 4,
}

impl Tier {
    /// Tier for an experience total.
    pub fn for_experience(experience: u64) -> Tier {
        let reached = TIER_THRESHOLDS.iter().filter(|&&t| experience >= t).count();
        Tier::from_index(reached as u8).unwrap_or(Tier::Legend)
    }

    /// Get tier from index (0-4).
    pub fn from_index(index: u8) -> Option<Tier> {
        match index {
            0 => Some(Tier::Rookie),
            1 => Some(Tier::Regular),
            2 => Some(Tier::Starter),
            3 => Some(Tier::Star),
            4 => Some(Tier::Legend),
            _ => None,
        }
    }

    /// Next tier, if not max.
    pub fn next(self) -> Option<Tier> {
        Tier::from_index(self as u8 + 1)
    }
}

/// A registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Owner
    pub owner: AccountId,
    /// Attributes
    pub attributes: PlayerAttributes,
    /// Accumulated experience
    pub experience: u64,
    /// Tier reached
    pub tier: Tier,
}

/// BTreeMap-backed registry for tests, the demo and local hosting.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegistry {
    players: BTreeMap<PlayerId, PlayerRecord>,
    next_id: u64,
}

impl InMemoryRegistry {
    /// Empty registry. Ids are issued from 1.
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Create a player and return its id.
    pub fn mint(&mut self, owner: AccountId, attributes: PlayerAttributes) -> PlayerId {
        let id = PlayerId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.players.insert(
            id,
            PlayerRecord {
                owner,
                attributes,
                experience: 0,
                tier: Tier::Rookie,
            },
        );
        id
    }

    /// Overwrite a player's attributes. Snapshots already taken are unaffected.
    pub fn set_attributes(&mut self, id: PlayerId, attributes: PlayerAttributes) -> Result<(), RegistryError> {
        self.record_mut(id)?.attributes = attributes;
        Ok(())
    }

    /// Move a player to a new owner.
    pub fn transfer(&mut self, id: PlayerId, owner: AccountId) -> Result<(), RegistryError> {
        self.record_mut(id)?.owner = owner;
        Ok(())
    }

    /// Remove a player from the registry.
    pub fn burn(&mut self, id: PlayerId) -> Result<PlayerRecord, RegistryError> {
        self.players.remove(&id).ok_or(RegistryError::UnknownPlayer(id))
    }

    /// Accumulated experience.
    pub fn experience(&self, id: PlayerId) -> Option<u64> {
        self.players.get(&id).map(|r| r.experience)
    }

    /// Current tier.
    pub fn tier(&self, id: PlayerId) -> Option<Tier> {
        self.players.get(&id).map(|r| r.tier)
    }

    /// Full record.
    pub fn record(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Registry empty?
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn record_mut(&mut self, id: PlayerId) -> Result<&mut PlayerRecord, RegistryError> {
        self.players.get_mut(&id).ok_or(RegistryError::UnknownPlayer(id))
    }
}

impl PlayerRegistry for InMemoryRegistry {
    fn attributes(&self, id: PlayerId) -> Result<PlayerAttributes, RegistryError> {
        self.players
            .get(&id)
            .map(|r| r.attributes)
            .ok_or(RegistryError::UnknownPlayer(id))
    }

    fn exists(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    fn owner_of(&self, id: PlayerId) -> Result<AccountId, RegistryError> {
        self.players
            .get(&id)
            .map(|r| r.owner)
            .ok_or(RegistryError::UnknownPlayer(id))
    }

    fn can_add_experience(&self, id: PlayerId, amount: u64) -> Result<(), RegistryError> {
        let record = self.players.get(&id).ok_or(RegistryError::UnknownPlayer(id))?;
        record
            .experience
            .checked_add(amount)
            .map(|_| ())
            .ok_or(RegistryError::ExperienceOverflow(id))
    }

    fn add_experience(&mut self, id: PlayerId, amount: u64) -> Result<(), RegistryError> {
        let record = self.record_mut(id)?;
        record.experience = record
            .experience
            .checked_add(amount)
            .ok_or(RegistryError::ExperienceOverflow(id))?;

        let tier = Tier::for_experience(record.experience);
        if tier != record.tier {
            tracing::info!(player = %id, from = ?record.tier, to = ?tier, "player promoted");
            record.tier = tier;
        }
        Ok(())
    }
}
