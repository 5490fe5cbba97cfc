//! Experience Rewards
//!
//! Paid once, when a match concludes. Failed matches never reach this code.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};

use crate::game::state::{Match, PlayerId, Side};
use crate::registry::{PlayerRegistry, RegistryError};
use crate::SEGMENT_COUNT;

/// Experience per segment played.
pub const XP_PER_SEGMENT: u32 = 10;

/// Experience per goal scored.
pub const XP_PER_GOAL: u32 = 100;

/// Bonus for every player when the match is drawn.
pub const XP_DRAW_BONUS: u32 = 20;

/// Bonus for every player on the winning side.
pub const XP_WIN_BONUS: u32 = 50;

/// Experience owed to one player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperienceAward {
    /// Recipient
    pub player_id: PlayerId,
    /// Side the player was on
    pub side: Side,
    /// Experience amount
    pub amount: u32,
}

/// Result bonus for a side given both scores.
pub fn result_bonus(own_score: u32, other_score: u32) -> u32 {
    match own_score.cmp(&other_score) {
        std::cmp::Ordering::Greater => XP_WIN_BONUS,
        std::cmp::Ordering::Equal => XP_DRAW_BONUS,
        std::cmp::Ordering::Less => 0,
    }
}

/// Compute awards for every player on both rosters, home first.
pub fn compute_rewards(state: &Match) -> Vec<ExperienceAward> {
    let participation = SEGMENT_COUNT as u32 * XP_PER_SEGMENT;
    let mut awards = Vec::with_capacity(state.home.len() + state.away.len());

    for side in [Side::Home, Side::Away] {
        let roster = state.roster(side);
        let bonus = result_bonus(roster.score, state.roster(side.opposite()).score);

        for player in &roster.players {
            let amount = participation
                .saturating_add(player.goals_scored.saturating_mul(XP_PER_GOAL))
                .saturating_add(bonus);
            awards.push(ExperienceAward {
                player_id: player.player_id,
                side,
                amount,
            });
        }
    }

    awards
}

/// Check every outstanding award would be accepted before writing anything.
///
/// Players in `paid` are skipped.
pub fn check_recipients<R: PlayerRegistry + ?Sized>(
    registry: &R,
    awards: &[ExperienceAward],
    paid: &BTreeSet<PlayerId>,
) -> Result<(), RegistryError> {
    awards
        .iter()
        .filter(|a| a.amount > 0 && !paid.contains(&a.player_id))
        .try_for_each(|a| registry.can_add_experience(a.player_id, a.amount as u64))
}

/// Submit non-zero awards to the registry.
///
/// `paid` is the ledger of players already credited for this match. Each
/// successful write is added to it before the next one is attempted, so a
/// batch interrupted by a registry failure can be retried without paying
/// anyone twice. Returns every non-zero award of the batch, in order, once
/// all of them are paid.
pub fn distribute<R: PlayerRegistry + ?Sized>(
    registry: &mut R,
    awards: &[ExperienceAward],
    paid: &mut BTreeSet<PlayerId>,
) -> Result<Vec<ExperienceAward>, RegistryError> {
    check_recipients(registry, awards, paid)?;

    let mut credited = Vec::with_capacity(awards.len());
    for award in awards.iter().filter(|a| a.amount > 0) {
        if paid.insert(award.player_id) {
            if let Err(e) = registry.add_experience(award.player_id, award.amount as u64) {
                paid.remove(&award.player_id);
                return Err(e);
            }
        }
        credited.push(*award);
    }
    Ok(credited)
}
