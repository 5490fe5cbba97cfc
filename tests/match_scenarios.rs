//! End-to-end match scenarios against the public API.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kickoff::game::events::MatchEventData;
use kickoff::game::segment::shot_success_rate;
use kickoff::oracle::{CorrelationError, LocalOracle};
use kickoff::proof::{verify_transcript, MatchTranscript};
use kickoff::{
    AccessPolicy, AccountId, EngineConfig, EngineError, InMemoryRegistry, MatchController, MatchId,
    MatchStatus, PlayerAttributes, PlayerId, RequestId,
};

const ADMIN: AccountId = AccountId::new([0xa0; 16]);
const ORACLE: AccountId = AccountId::new([0x0a; 16]);

/// Home attacks, shoots, hits the target and beats the keeper.
const HOME_GOAL: [u64; 7] = [0, 0, 200, 0, 0, 99, 0];

type Controller = MatchController<LocalOracle, InMemoryRegistry>;

fn controller_with(rosters: &[(u32, u32)]) -> (Controller, Vec<PlayerId>) {
    let mut registry = InMemoryRegistry::new();
    let ids = rosters
        .iter()
        .enumerate()
        .map(|(i, &(attack, defense))| registry.mint(AccountId::new([i as u8; 16]), PlayerAttributes::new(attack, defense)))
        .collect();
    let controller = MatchController::new(
        EngineConfig::default(),
        AccessPolicy::new(ADMIN, ORACLE),
        LocalOracle::new(5),
        registry,
    );
    (controller, ids)
}

fn token(c: &Controller, id: MatchId) -> RequestId {
    c.outstanding_request(id).expect("match should be waiting on randomness")
}

fn play_all(c: &mut Controller, id: MatchId, words: &[[u64; 7]]) {
    for batch in words {
        let t = token(c, id);
        c.supply_randomness(&ORACLE, t, batch).unwrap();
    }
}

#[test]
fn scenario_a_home_goal_every_segment() {
    let (mut c, ids) = controller_with(&[(200, 100), (100, 200)]);
    let id = c.create_match(&ADMIN, &[ids[0]], &[ids[1]], 0, 0, 0).unwrap();

    play_all(&mut c, id, &[HOME_GOAL; 10]);

    let m = c.get_match(id).unwrap();
    assert_eq!(m.status, MatchStatus::Concluded);
    assert_eq!(m.score(), (10, 0));
    assert_eq!(m.home.players[0].goals_scored, 10);
    assert_eq!(c.registry().experience(ids[0]), Some(1150));
    assert_eq!(c.registry().experience(ids[1]), Some(100));
}

#[test]
fn scenario_b_no_shots_is_a_goalless_draw() {
    let (mut c, ids) = controller_with(&[(100, 100), (100, 100), (100, 100), (100, 100)]);
    let id = c.create_match(&ADMIN, &ids[..2], &ids[2..], 0, 0, 0).unwrap();

    // Alternate fouls and possession changes
    let words: Vec<[u64; 7]> = (0..10)
        .map(|i| if i % 2 == 0 { [7, 40, 0, 0, 0, 0, 0] } else { [93, 70, 0, 0, 0, 0, 0] })
        .collect();
    play_all(&mut c, id, &words);

    let m = c.get_match(id).unwrap();
    assert_eq!(m.score(), (0, 0));
    assert_eq!(m.winner(), None);
    for player in &ids {
        assert_eq!(c.registry().experience(*player), Some(120));
    }
    let awarded = c
        .events()
        .iter()
        .filter(|e| matches!(e.data, MatchEventData::ExperienceAwarded { amount: 120, .. }))
        .count();
    assert_eq!(awarded, 4);
}

#[test]
fn exactly_ten_fulfillments_conclude() {
    let (mut c, ids) = controller_with(&[(150, 150), (150, 150)]);
    let id = c.create_match(&ADMIN, &[ids[0]], &[ids[1]], 2, 1, 5).unwrap();

    for segment in 0..10u8 {
        let report = c.supply_randomness(&ORACLE, token(&c, id), &[u64::from(segment); 7]).unwrap();
        assert_eq!(report.outcome.segment, segment);
        let expected = if segment == 9 { MatchStatus::Concluded } else { MatchStatus::Active };
        assert_eq!(report.status, expected);
    }

    assert!(c.outstanding_request(id).is_none());
    assert!(c.gateway().is_empty());
    assert!(matches!(
        c.trigger_next_segment(&ADMIN, id),
        Err(EngineError::TerminalState { status: MatchStatus::Concluded, .. })
    ));
}

#[test]
fn replayed_token_changes_nothing() {
    let (mut c, ids) = controller_with(&[(200, 100), (100, 200)]);
    let id = c.create_match(&ADMIN, &[ids[0]], &[ids[1]], 0, 0, 0).unwrap();

    let first = token(&c, id);
    c.supply_randomness(&ORACLE, first, &HOME_GOAL).unwrap();
    let snapshot = c.get_match(id).unwrap().clone();
    let sequence = c.events().last().map(|e| e.sequence);

    let err = c.supply_randomness(&ORACLE, first, &HOME_GOAL).unwrap_err();
    assert_eq!(err, EngineError::Correlation(CorrelationError::Consumed(first)));

    let after = c.get_match(id).unwrap();
    assert_eq!(after.compute_hash(), snapshot.compute_hash());
    assert_eq!(after.last_request_id, snapshot.last_request_id);
    assert_eq!(c.events().last().map(|e| e.sequence), sequence);
}

#[test]
fn force_fail_blocks_completion_and_rewards() {
    let (mut c, ids) = controller_with(&[(200, 100), (100, 200)]);
    let id = c.create_match(&ADMIN, &[ids[0]], &[ids[1]], 0, 0, 0).unwrap();
    play_all(&mut c, id, &[HOME_GOAL; 3]);

    let outstanding = token(&c, id);
    c.force_fail(&ADMIN, id, outstanding).unwrap();

    assert_eq!(c.get_match(id).unwrap().status, MatchStatus::Failed);
    assert_eq!(
        c.supply_randomness(&ORACLE, outstanding, &HOME_GOAL).unwrap_err(),
        EngineError::Correlation(CorrelationError::Consumed(outstanding))
    );
    assert_eq!(c.registry().experience(ids[0]), Some(0));
    assert!(!c.events().iter().any(|e| matches!(e.data, MatchEventData::ExperienceAwarded { .. })));
    assert!(!c.transcript(id).unwrap().is_complete());
}

#[test]
fn identical_inputs_give_identical_matches() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let words: Vec<[u64; 7]> = (0..10).map(|_| rng.gen()).collect();
    let rosters = [(180, 120), (140, 160), (160, 140), (120, 180), (150, 150), (170, 130)];

    let run = || {
        let (mut c, ids) = controller_with(&rosters);
        let id = c.create_match(&ADMIN, &ids[..3], &ids[3..], 1, 2, 6).unwrap();
        play_all(&mut c, id, &words);
        let m = c.get_match(id).unwrap().clone();
        let xp: Vec<_> = ids.iter().map(|p| c.registry().experience(*p)).collect();
        let transcript = c.transcript(id).unwrap().clone();
        (m, xp, transcript)
    };

    let (first, first_xp, first_transcript) = run();
    let (second, second_xp, second_transcript) = run();

    assert_eq!(first.score(), second.score());
    assert_eq!(first.home.players, second.home.players);
    assert_eq!(first.away.players, second.away.players);
    assert_eq!(first_xp, second_xp);
    assert_eq!(first.compute_hash(), second.compute_hash());
    assert_eq!(
        first_transcript.result.as_ref().map(|r| r.final_state_hash),
        second_transcript.result.as_ref().map(|r| r.final_state_hash)
    );

    let bytes = first_transcript.to_bytes().unwrap();
    assert!(verify_transcript(&MatchTranscript::from_bytes(&bytes).unwrap()).valid);
}

#[test]
fn success_rate_bounds_are_exact() {
    assert_eq!(shot_success_rate(0, 5_000, 10, 0), 50);
    assert_eq!(shot_success_rate(5_000, 0, 0, 200), 700);
}

#[test]
fn events_export_as_json_lines() {
    let (mut c, ids) = controller_with(&[(200, 100), (100, 200)]);
    let id = c.create_match(&ADMIN, &[ids[0]], &[ids[1]], 0, 0, 0).unwrap();
    play_all(&mut c, id, &[HOME_GOAL; 10]);

    let text = c.event_log().to_json_lines().unwrap();
    assert_eq!(text.lines().count(), c.events().len());

    let sequences: Vec<u64> = c.events().iter().map(|e| e.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_word_stream_concludes_and_replays(
        words in prop::collection::vec(any::<[u64; 7]>(), 10),
        home_tactic in 0u8..3,
        away_tactic in 0u8..3,
        strictness in 0u8..=10,
    ) {
        let (mut c, ids) = controller_with(&[(120, 90), (95, 130), (110, 110), (140, 80)]);
        let id = c.create_match(&ADMIN, &ids[..2], &ids[2..], home_tactic, away_tactic, strictness).unwrap();
        play_all(&mut c, id, &words);

        let m = c.get_match(id).unwrap();
        prop_assert_eq!(m.status, MatchStatus::Concluded);
        prop_assert!(m.home.score + m.away.score <= 10);

        let goals: u32 = m.home.players.iter().chain(&m.away.players).map(|p| p.goals_scored).sum();
        prop_assert_eq!(goals, m.home.score + m.away.score);
        prop_assert!(verify_transcript(c.transcript(id).unwrap()).valid);
    }
}
