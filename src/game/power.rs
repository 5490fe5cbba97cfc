//! Team Power
//!
//! Effective attack/defense of a side for one segment. A pure function of
//! the frozen roster, the tactic, and whether the side plays at home.
//!
//! ```text
//! per player   : attr × form_factor / 1000        (form_factor 750..1250)
//! team         : floor(mean(adjusted))
//! tactic       : × attack_pct / 100, × defense_pct / 100
//! home         : × 105 / 100
//! ```

use crate::core::fixed::{
    form_factor, scale_pct, scale_permille, to_u32_saturating, HOME_ADVANTAGE_PCT,
};
use crate::game::state::{PlayerSnapshot, TacticalStyle, TeamPower};

/// Form-adjusted (attack, defense) of one player.
#[inline]
pub fn form_adjusted(player: &PlayerSnapshot) -> (i64, i64) {
    let factor = form_factor(player.attributes.form);
    (
        scale_permille(player.attributes.attack as i64, factor),
        scale_permille(player.attributes.defense as i64, factor),
    )
}

/// Compute a side's power.
///
/// An empty roster has zero power; rosters built by the controller always
/// hold at least one player.
pub fn team_power(players: &[PlayerSnapshot], tactic: TacticalStyle, is_home: bool) -> TeamPower {
    if players.is_empty() {
        return TeamPower::default();
    }

    let (attack_sum, defense_sum) = players
        .iter()
        .map(form_adjusted)
        .fold((0i64, 0i64), |(a, d), (pa, pd)| (a + pa, d + pd));

    let count = players.len() as i64;
    let mut attack = scale_pct(attack_sum / count, tactic.attack_pct());
    let mut defense = scale_pct(defense_sum / count, tactic.defense_pct());

    if is_home {
        attack = scale_pct(attack, HOME_ADVANTAGE_PCT);
        defense = scale_pct(defense, HOME_ADVANTAGE_PCT);
    }

    TeamPower::new(to_u32_saturating(attack), to_u32_saturating(defense))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{AccountId, PlayerAttributes, PlayerId};
    use proptest::prelude::*;

    fn player(attack: u32, defense: u32, form: u32) -> PlayerSnapshot {
        PlayerSnapshot::new(
            PlayerId(attack as u64),
            AccountId::default(),
            PlayerAttributes::new(attack, defense).with_form(form),
        )
    }

    #[test]
    fn test_neutral_form_balanced_away_is_identity() {
        let power = team_power(&[player(80, 60, 50)], TacticalStyle::Balanced, false);
        assert_eq!(power, TeamPower::new(80, 60));
    }

    #[test]
    fn test_form_adjustment() {
        // form 90: factor 1200
        assert_eq!(form_adjusted(&player(100, 55, 90)), (120, 66));
        // form 10: factor 800
        assert_eq!(form_adjusted(&player(100, 55, 10)), (80, 44));
    }

    #[test]
    fn test_mean_floors() {
        let players = [player(10, 10, 50), player(11, 12, 50)];
        let power = team_power(&players, TacticalStyle::Balanced, false);
        assert_eq!(power, TeamPower::new(10, 11));
    }

    #[test]
    fn test_tactical_modifiers() {
        let players = [player(100, 100, 50)];
        assert_eq!(
            team_power(&players, TacticalStyle::Aggressive, false),
            TeamPower::new(110, 85)
        );
        assert_eq!(
            team_power(&players, TacticalStyle::Defensive, false),
            TeamPower::new(85, 110)
        );
    }

    #[test]
    fn test_home_advantage_applied_after_tactic() {
        let players = [player(100, 100, 50)];
        // 110 * 1.05 = 115.5 -> 115, 85 * 1.05 = 89.25 -> 89
        assert_eq!(
            team_power(&players, TacticalStyle::Aggressive, true),
            TeamPower::new(115, 89)
        );
    }

    #[test]
    fn test_empty_roster_is_zero() {
        assert_eq!(
            team_power(&[], TacticalStyle::Aggressive, true),
            TeamPower::default()
        );
    }

    proptest! {
        #[test]
        fn prop_home_never_weaker_than_away(
            attrs in prop::collection::vec((0u32..2_000, 0u32..2_000, 0u32..=100), 1..=11),
            tactic_code in 0u8..3,
        ) {
            let players: Vec<_> = attrs.iter().map(|&(a, d, f)| player(a, d, f)).collect();
            let tactic = TacticalStyle::from_code(tactic_code).unwrap();

            let home = team_power(&players, tactic, true);
            let away = team_power(&players, tactic, false);

            prop_assert!(home.attack >= away.attack);
            prop_assert!(home.defense >= away.defense);
        }

        #[test]
        fn prop_power_is_stable(
            attrs in prop::collection::vec((0u32..u16::MAX as u32, 0u32..u16::MAX as u32, 0u32..=150), 1..=11),
            is_home in any::<bool>(),
        ) {
            let players: Vec<_> = attrs.iter().map(|&(a, d, f)| player(a, d, f)).collect();
            let first = team_power(&players, TacticalStyle::Defensive, is_home);
            let second = team_power(&players, TacticalStyle::Defensive, is_home);
            prop_assert_eq!(first, second);
        }
    }
}
