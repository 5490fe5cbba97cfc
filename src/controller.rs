//! Match Lifecycle Controller
//!
//! Owns every match and drives it through its states:
//!
//! ```text
//! Setup ──create──▶ Active ◀──fulfil (auto)──┐
//!                     │  └──fulfil (manual)─▶ Cooldown ──trigger──┐
//!                     │                          │                │
//!                     ├──fulfil #10─▶ Concluded  └──fulfil #10──▶ Concluded
//!                     └──force_fail─▶ Failed  ◀──force_fail── Cooldown
//! ```
//!
//! Each operation works on copies of the match, its transcript and its
//! events, and writes them back only once nothing else can fail. A rejected
//! call leaves the controller untouched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Serialize, Deserialize};

use crate::access::{AccessPolicy, Operation};
use crate::config::{EngineConfig, ProgressionPolicy};
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::game::events::{EventLog, MatchEvent, MatchEventData, StagedEvents};
use crate::game::reward::{compute_rewards, distribute, ExperienceAward};
use crate::game::segment::{play_segment, SegmentOutcome, SegmentWords};
use crate::game::state::{
    AccountId, Match, MatchId, MatchStatus, PlayerId, PlayerSnapshot, Side, TacticalStyle,
    TeamRoster,
};
use crate::oracle::{
    Correlation, OracleError, RandomnessConfig, RandomnessGateway, RandomnessOracle, RequestId,
};
use crate::proof::transcript::MatchTranscript;
use crate::registry::PlayerRegistry;
use crate::{MAX_REFEREE_STRICTNESS, MAX_ROSTER_SIZE, MIN_ROSTER_SIZE};

/// What a successful fulfillment did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentReport {
    /// Match that advanced
    pub match_id: MatchId,
    /// Segment just resolved
    pub outcome: SegmentOutcome,
    /// Status after the call
    pub status: MatchStatus,
    /// Token issued for the next segment, under auto progression
    pub next_request: Option<RequestId>,
    /// Experience written, when the match concluded
    pub awards: Vec<ExperienceAward>,
}

/// The match state machine.
pub struct MatchController<O, R> {
    config: EngineConfig,
    policy: AccessPolicy,
    oracle: O,
    registry: R,
    gateway: RandomnessGateway,
    matches: BTreeMap<MatchId, Match>,
    transcripts: BTreeMap<MatchId, MatchTranscript>,
    /// Players already credited for a match whose final fulfillment has not
    /// committed yet. Survives a rejected call so a redelivery pays nobody twice.
    payouts: BTreeMap<MatchId, BTreeSet<PlayerId>>,
    events: EventLog,
    next_match_id: MatchId,
}

impl<O: RandomnessOracle, R: PlayerRegistry> MatchController<O, R> {
    /// Create a controller with no matches.
    pub fn new(config: EngineConfig, policy: AccessPolicy, oracle: O, registry: R) -> Self {
        Self {
            config,
            policy,
            oracle,
            registry,
            gateway: RandomnessGateway::new(),
            matches: BTreeMap::new(),
            transcripts: BTreeMap::new(),
            payouts: BTreeMap::new(),
            events: EventLog::new(),
            next_match_id: 1,
        }
    }

    // =========================================================================
    // MUTATING OPERATIONS
    // =========================================================================

    /// Snapshot two rosters, start the match and request its first segment.
    pub fn create_match(
        &mut self,
        caller: &AccountId,
        home_ids: &[PlayerId],
        away_ids: &[PlayerId],
        home_tactic_code: u8,
        away_tactic_code: u8,
        referee_strictness: u8,
    ) -> EngineResult<MatchId> {
        self.policy.authorize(caller, Operation::CreateMatch)?;

        for (side, ids) in [(Side::Home, home_ids), (Side::Away, away_ids)] {
            if !(MIN_ROSTER_SIZE..=MAX_ROSTER_SIZE).contains(&ids.len()) {
                return Err(ValidationError::RosterSize { side, size: ids.len() }.into());
            }
        }
        let home_tactic = TacticalStyle::from_code(home_tactic_code)
            .ok_or(ValidationError::InvalidTactic { side: Side::Home, code: home_tactic_code })?;
        let away_tactic = TacticalStyle::from_code(away_tactic_code)
            .ok_or(ValidationError::InvalidTactic { side: Side::Away, code: away_tactic_code })?;
        if referee_strictness > MAX_REFEREE_STRICTNESS {
            return Err(ValidationError::RefereeStrictness(referee_strictness).into());
        }

        let mut seen = BTreeSet::new();
        for id in home_ids.iter().chain(away_ids) {
            if !seen.insert(*id) {
                return Err(ValidationError::DuplicatePlayer(*id).into());
            }
        }

        let home = TeamRoster::new(self.snapshot(home_ids)?, home_tactic);
        let away = TeamRoster::new(self.snapshot(away_ids)?, away_tactic);

        let match_id = self.next_match_id;
        let mut staged = Match::new(match_id, home, away, *caller, referee_strictness, Utc::now());
        let transcript = MatchTranscript::begin(&staged);

        let request_id = self.request_words().map_err(|e| {
            tracing::warn!(match_id, error = %e, "randomness request failed, match not created");
            EngineError::Oracle(e)
        })?;
        staged.status = MatchStatus::Active;
        staged.last_request_id = Some(request_id);

        let mut events = StagedEvents::new();
        events.push(match_id, MatchEventData::MatchCreated {
            initiator: *caller,
            home_players: home_ids.to_vec(),
            away_players: away_ids.to_vec(),
            home_tactic,
            away_tactic,
            referee_strictness,
        });
        events.push(match_id, MatchEventData::SegmentSimulationStarted { segment: 0, request_id });

        // Commit
        self.gateway.register(request_id, Correlation { match_id, segment: 0, requested_at: Utc::now() });
        tracing::info!(
            match_id,
            home = home_ids.len(),
            away = away_ids.len(),
            strictness = referee_strictness,
            request = %request_id.short(),
            "match created"
        );
        self.matches.insert(match_id, staged);
        self.transcripts.insert(match_id, transcript);
        self.events.commit(events);
        self.next_match_id += 1;

        Ok(match_id)
    }

    /// Deliver the words for an outstanding request and play one segment.
    pub fn supply_randomness(
        &mut self,
        caller: &AccountId,
        request_id: RequestId,
        words: &[u64],
    ) -> EngineResult<FulfillmentReport> {
        self.policy.authorize(caller, Operation::SupplyRandomness)?;

        let correlation = self.gateway.lookup(&request_id).map_err(|e| {
            tracing::warn!(request = %request_id.short(), error = %e, "fulfillment rejected");
            EngineError::Correlation(e)
        })?;
        let words = SegmentWords::try_from(words)?;

        let match_id = correlation.match_id;
        let current = self.get_match(match_id).ok_or(EngineError::UnknownMatch(match_id))?;

        let expected = match current.status {
            MatchStatus::Active | MatchStatus::Cooldown => current.last_request_id == Some(request_id),
            _ => false,
        };
        if !expected || correlation.segment != current.current_segment {
            return Err(status_error(current, Operation::SupplyRandomness));
        }

        let mut staged = current.clone();
        let mut transcript = self
            .transcripts
            .get(&match_id)
            .cloned()
            .unwrap_or_else(|| MatchTranscript::begin(current));
        let mut events = StagedEvents::new();

        staged.last_request_id = None;
        let outcome = play_segment(&mut staged, &words);
        transcript.record_segment(request_id, words, &outcome, &staged);

        events.push(match_id, MatchEventData::SegmentResolved {
            segment: outcome.segment,
            attacking: outcome.attacking,
            event: outcome.event,
            shot: outcome.shot.map(|s| s.result),
        });
        if let Some(goal) = outcome.goal {
            tracing::info!(match_id, segment = outcome.segment, side = %goal.side, scorer = %goal.player_id, "goal");
            events.push(match_id, MatchEventData::GoalScored {
                segment: outcome.segment,
                side: goal.side,
                player_id: goal.player_id,
                home_score: goal.home_score,
                away_score: goal.away_score,
            });
        }

        let mut next_request = None;
        let mut written = Vec::new();

        if staged.is_finished() {
            let awards = compute_rewards(&staged);
            let paid = self.payouts.entry(match_id).or_default();
            written = distribute(&mut self.registry, &awards, paid).map_err(|e| {
                tracing::warn!(match_id, credited = paid.len(), error = %e, "reward batch interrupted");
                EngineError::Registry(e)
            })?;
            for award in &written {
                events.push(match_id, MatchEventData::ExperienceAwarded {
                    player_id: award.player_id,
                    amount: award.amount,
                });
            }

            staged.status = MatchStatus::Concluded;
            transcript.finalize(&staged, awards);
            events.push(match_id, MatchEventData::MatchConcluded {
                home_score: staged.home.score,
                away_score: staged.away.score,
                winner: staged.winner(),
            });
            tracing::info!(match_id, home = staged.home.score, away = staged.away.score, "match concluded");
        } else {
            match self.config.progression {
                ProgressionPolicy::AutoProgress => match self.request_words() {
                    Ok(next) => {
                        staged.status = MatchStatus::Active;
                        staged.last_request_id = Some(next);
                        next_request = Some(next);
                        events.push(match_id, MatchEventData::SegmentSimulationStarted {
                            segment: staged.current_segment,
                            request_id: next,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(match_id, error = %e, "auto re-request failed, parking match");
                        staged.status = MatchStatus::Cooldown;
                        events.push(match_id, MatchEventData::RandomnessRequestFailed {
                            request_id: None,
                            reason: e.to_string(),
                        });
                    }
                },
                ProgressionPolicy::ManualResume => {
                    staged.status = MatchStatus::Cooldown;
                }
            }
        }

        // Commit
        self.gateway.consume(&request_id)?;
        self.payouts.remove(&match_id);
        if let Some(next) = next_request {
            self.gateway.register(next, Correlation {
                match_id,
                segment: staged.current_segment,
                requested_at: Utc::now(),
            });
        }
        tracing::debug!(
            match_id,
            segment = outcome.segment,
            status = %staged.status,
            score = ?staged.score(),
            "segment resolved"
        );

        let report = FulfillmentReport {
            match_id,
            outcome,
            status: staged.status,
            next_request,
            awards: written,
        };
        self.matches.insert(match_id, staged);
        self.transcripts.insert(match_id, transcript);
        self.events.commit(events);

        Ok(report)
    }

    /// Request randomness for a match parked in Cooldown.
    pub fn trigger_next_segment(&mut self, caller: &AccountId, match_id: MatchId) -> EngineResult<RequestId> {
        self.policy.authorize(caller, Operation::TriggerNextSegment)?;

        let current = self.get_match(match_id).ok_or(EngineError::UnknownMatch(match_id))?;
        if current.status != MatchStatus::Cooldown || current.last_request_id.is_some() {
            return Err(status_error(current, Operation::TriggerNextSegment));
        }
        let segment = current.current_segment;

        let request_id = self.request_words()?;

        // Commit
        self.gateway.register(request_id, Correlation { match_id, segment, requested_at: Utc::now() });
        if let Some(m) = self.matches.get_mut(&match_id) {
            m.last_request_id = Some(request_id);
        }
        let mut events = StagedEvents::new();
        events.push(match_id, MatchEventData::SegmentSimulationStarted { segment, request_id });
        self.events.commit(events);
        tracing::info!(match_id, segment, request = %request_id.short(), "next segment triggered");

        Ok(request_id)
    }

    /// Abandon an in-play match. Irrecoverable; no experience is paid.
    pub fn force_fail(&mut self, caller: &AccountId, match_id: MatchId, request_id: RequestId) -> EngineResult<()> {
        self.policy.authorize(caller, Operation::ForceFail)?;

        let current = self.get_match(match_id).ok_or(EngineError::UnknownMatch(match_id))?;
        if !current.status.is_in_play() {
            return Err(status_error(current, Operation::ForceFail));
        }
        let outstanding = current.last_request_id;

        // Commit
        if self.gateway.lookup(&request_id).is_ok_and(|c| c.match_id == match_id) {
            self.gateway.purge(&request_id);
        }
        if let Some(own) = outstanding {
            self.gateway.purge(&own);
        }
        if let Some(paid) = self.payouts.remove(&match_id) {
            tracing::warn!(match_id, credited = paid.len(), "failed match had a partial reward batch");
        }
        if let Some(m) = self.matches.get_mut(&match_id) {
            m.status = MatchStatus::Failed;
            m.last_request_id = None;
        }
        let mut events = StagedEvents::new();
        events.push(match_id, MatchEventData::RandomnessRequestFailed {
            request_id: Some(request_id),
            reason: "forced failure".into(),
        });
        self.events.commit(events);
        tracing::warn!(match_id, request = %request_id.short(), "match force-failed");

        Ok(())
    }

    /// Replace the parameters used for subsequent randomness requests.
    pub fn configure_randomness(&mut self, caller: &AccountId, config: RandomnessConfig) -> EngineResult<()> {
        self.policy.authorize(caller, Operation::ConfigureRandomness)?;
        config.validate()?;

        tracing::info!(
            key_hash = %hex::encode(&config.key_hash[..4]),
            confirmations = config.confirmations,
            callback_limit = config.callback_limit,
            "randomness configuration updated"
        );
        self.config.randomness = config;
        Ok(())
    }

    /// Forget the retired tokens of every concluded or failed match.
    ///
    /// Late redeliveries for those matches are then rejected as unknown
    /// tokens. Returns how many entries were dropped.
    pub fn prune_retired_tokens(&mut self) -> usize {
        let finished: Vec<MatchId> = self
            .matches
            .values()
            .filter(|m| m.status.is_terminal())
            .map(|m| m.id)
            .collect();
        let dropped: usize = finished.into_iter().map(|id| self.gateway.forget_match(id)).sum();
        if dropped > 0 {
            tracing::debug!(dropped, retained = self.gateway.retired_len(), "retired tokens pruned");
        }
        dropped
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Look up a match.
    pub fn get_match(&self, match_id: MatchId) -> Option<&Match> {
        self.matches.get(&match_id)
    }

    /// The live request a match is waiting on, if any.
    pub fn outstanding_request(&self, match_id: MatchId) -> Option<RequestId> {
        self.matches
            .get(&match_id)
            .and_then(|m| m.last_request_id)
            .filter(|id| self.gateway.is_live(id))
    }

    /// Which match and segment a live token belongs to.
    pub fn correlated_match(&self, request_id: &RequestId) -> Option<Correlation> {
        self.gateway.lookup(request_id).ok()
    }

    /// Matches in play that are waiting on randomness, oldest request first.
    pub fn waiting_matches(&self) -> Vec<(RequestId, Correlation)> {
        let mut waiting: Vec<_> = self.gateway.live().map(|(id, c)| (*id, *c)).collect();
        waiting.sort_by_key(|(_, c)| c.requested_at);
        waiting
    }

    /// Committed events still retained.
    pub fn events(&self) -> &[MatchEvent] {
        self.events.records()
    }

    /// Full event log.
    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Hand retained events to the caller.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        self.events.drain()
    }

    /// Transcript of a match.
    pub fn transcript(&self, match_id: MatchId) -> Option<&MatchTranscript> {
        self.transcripts.get(&match_id)
    }

    /// Number of matches created.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Change the progression policy for subsequent fulfillments.
    pub fn set_progression(&mut self, policy: ProgressionPolicy) {
        tracing::info!(?policy, "progression policy changed");
        self.config.progression = policy;
    }

    /// Access policy.
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Mutable access policy.
    pub fn policy_mut(&mut self) -> &mut AccessPolicy {
        &mut self.policy
    }

    /// Randomness provider.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable randomness provider.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Player registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Mutable player registry.
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    /// Correlation table.
    pub fn gateway(&self) -> &RandomnessGateway {
        &self.gateway
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn snapshot(&self, ids: &[PlayerId]) -> EngineResult<Vec<PlayerSnapshot>> {
        ids.iter()
            .map(|&id| -> EngineResult<PlayerSnapshot> {
                if !self.registry.exists(id) {
                    return Err(ValidationError::UnknownPlayer(id).into());
                }
                let attributes = self.registry.attributes(id)?;
                let owner = self.registry.owner_of(id)?;
                Ok(PlayerSnapshot::new(id, owner, attributes))
            })
            .collect()
    }

    fn request_words(&mut self) -> Result<RequestId, OracleError> {
        let request_id = self.oracle.request_randomness(&self.config.randomness)?;
        if self.gateway.contains(&request_id) {
            return Err(OracleError::DuplicateToken);
        }
        Ok(request_id)
    }
}

fn status_error(m: &Match, operation: Operation) -> EngineError {
    if m.status.is_terminal() {
        EngineError::TerminalState { match_id: m.id, status: m.status }
    } else {
        EngineError::State { match_id: m.id, status: m.status, operation }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::game::state::PlayerAttributes;
    use crate::oracle::{CorrelationError, LocalOracle};
    use crate::registry::{InMemoryRegistry, RegistryError};

    const ADMIN: AccountId = AccountId::new([0xad; 16]);
    const ORACLE: AccountId = AccountId::new([0x0c; 16]);
    const STRANGER: AccountId = AccountId::new([0x55; 16]);

    const HOME_GOAL: [u64; 7] = [0, 0, 200, 0, 0, 99, 0];
    const FOUL: [u64; 7] = [0, 40, 0, 0, 0, 0, 0];

    type Controller = MatchController<LocalOracle, InMemoryRegistry>;

    fn setup(progression: ProgressionPolicy) -> (Controller, PlayerId, PlayerId) {
        let mut registry = InMemoryRegistry::new();
        let home = registry.mint(AccountId::new([1; 16]), PlayerAttributes::new(200, 100));
        let away = registry.mint(AccountId::new([2; 16]), PlayerAttributes::new(100, 200));
        let config = EngineConfig { progression, ..Default::default() };
        let controller = MatchController::new(config, AccessPolicy::new(ADMIN, ORACLE), LocalOracle::new(1), registry);
        (controller, home, away)
    }

    fn started(progression: ProgressionPolicy) -> (Controller, MatchId) {
        let (mut c, home, away) = setup(progression);
        let id = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        (c, id)
    }

    fn pending<R: PlayerRegistry>(c: &MatchController<LocalOracle, R>, id: MatchId) -> RequestId {
        c.outstanding_request(id).unwrap()
    }

    #[test]
    fn test_create_match_starts_active_with_one_request() {
        let (c, id) = started(ProgressionPolicy::AutoProgress);
        let m = c.get_match(id).unwrap();

        assert_eq!(id, 1);
        assert_eq!(m.status, MatchStatus::Active);
        assert_eq!(c.gateway().len(), 1);
        assert_eq!(c.correlated_match(&pending(&c, id)).unwrap().segment, 0);

        let names: Vec<_> = c.events().iter().map(|e| e.data.name()).collect();
        assert_eq!(names, vec!["match_created", "segment_simulation_started"]);
    }

    #[test]
    fn test_create_match_validation() {
        let (mut c, home, away) = setup(ProgressionPolicy::AutoProgress);
        let many: Vec<PlayerId> = (0..12).map(PlayerId).collect();

        assert!(matches!(
            c.create_match(&ADMIN, &[], &[away], 0, 0, 0),
            Err(EngineError::Validation(ValidationError::RosterSize { side: Side::Home, size: 0 }))
        ));
        assert!(matches!(
            c.create_match(&ADMIN, &[home], &many, 0, 0, 0),
            Err(EngineError::Validation(ValidationError::RosterSize { side: Side::Away, size: 12 }))
        ));
        assert!(matches!(
            c.create_match(&ADMIN, &[home], &[away], 0, 3, 0),
            Err(EngineError::Validation(ValidationError::InvalidTactic { side: Side::Away, code: 3 }))
        ));
        assert!(matches!(
            c.create_match(&ADMIN, &[home], &[away], 0, 0, 11),
            Err(EngineError::Validation(ValidationError::RefereeStrictness(11)))
        ));
        assert!(matches!(
            c.create_match(&ADMIN, &[home], &[PlayerId(77)], 0, 0, 0),
            Err(EngineError::Validation(ValidationError::UnknownPlayer(PlayerId(77))))
        ));
        assert!(matches!(
            c.create_match(&ADMIN, &[home], &[home], 0, 0, 0),
            Err(EngineError::Validation(ValidationError::DuplicatePlayer(_)))
        ));

        assert_eq!(c.match_count(), 0);
        assert!(c.events().is_empty());
        assert_eq!(c.oracle().issued_count(), 0);
    }

    #[test]
    fn test_unauthorized_callers() {
        let (mut c, home, away) = setup(ProgressionPolicy::AutoProgress);

        assert!(matches!(
            c.create_match(&STRANGER, &[home], &[away], 0, 0, 0),
            Err(EngineError::Unauthorized { operation: Operation::CreateMatch, .. })
        ));

        let id = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        let token = pending(&c, id);
        assert!(matches!(
            c.supply_randomness(&ADMIN, token, &HOME_GOAL),
            Err(EngineError::Unauthorized { required: Role::Oracle, .. })
        ));
        assert!(matches!(
            c.force_fail(&ORACLE, id, token),
            Err(EngineError::Unauthorized { .. })
        ));
        assert_eq!(c.get_match(id).unwrap().current_segment, 0);
    }

    #[test]
    fn test_oracle_failure_on_create_leaves_no_trace() {
        let (mut c, home, away) = setup(ProgressionPolicy::AutoProgress);
        c.oracle_mut().set_failing(Some("offline".into()));

        assert!(matches!(
            c.create_match(&ADMIN, &[home], &[away], 0, 0, 0),
            Err(EngineError::Oracle(OracleError::Unavailable(_)))
        ));
        assert_eq!(c.match_count(), 0);
        assert!(c.gateway().is_empty());

        c.oracle_mut().set_failing(None);
        assert_eq!(c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap(), 1);
    }

    #[test]
    fn test_fulfillment_advances_and_re_requests() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let first = pending(&c, id);

        let report = c.supply_randomness(&ORACLE, first, &HOME_GOAL).unwrap();
        assert_eq!(report.status, MatchStatus::Active);
        assert_eq!(report.outcome.segment, 0);
        assert!(report.outcome.goal.is_some());

        let next = report.next_request.unwrap();
        assert_ne!(next, first);
        assert_eq!(c.outstanding_request(id), Some(next));
        assert_eq!(c.correlated_match(&next).unwrap().segment, 1);
        assert_eq!(c.gateway().len(), 1);
        assert_eq!(c.get_match(id).unwrap().current_segment, 1);
    }

    #[test]
    fn test_replayed_token_is_rejected_without_mutation() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let first = pending(&c, id);
        c.supply_randomness(&ORACLE, first, &HOME_GOAL).unwrap();

        let before = c.get_match(id).unwrap().compute_hash();
        let events_before = c.events().len();

        assert_eq!(
            c.supply_randomness(&ORACLE, first, &HOME_GOAL),
            Err(EngineError::Correlation(CorrelationError::Consumed(first)))
        );
        assert_eq!(c.get_match(id).unwrap().compute_hash(), before);
        assert_eq!(c.events().len(), events_before);

        let foreign = RequestId::new([0xee; 32]);
        assert_eq!(
            c.supply_randomness(&ORACLE, foreign, &HOME_GOAL),
            Err(EngineError::Correlation(CorrelationError::Unknown(foreign)))
        );
    }

    #[test]
    fn test_wrong_word_count_keeps_token_live() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let token = pending(&c, id);

        assert_eq!(
            c.supply_randomness(&ORACLE, token, &HOME_GOAL[..5]),
            Err(EngineError::Oracle(OracleError::WordCount { expected: 7, got: 5 }))
        );
        assert_eq!(c.outstanding_request(id), Some(token));
        assert!(c.supply_randomness(&ORACLE, token, &HOME_GOAL).is_ok());
    }

    #[test]
    fn test_manual_resume_parks_and_triggers() {
        let (mut c, id) = started(ProgressionPolicy::ManualResume);

        let report = c.supply_randomness(&ORACLE, pending(&c, id), &FOUL).unwrap();
        assert_eq!(report.status, MatchStatus::Cooldown);
        assert!(report.next_request.is_none());
        assert!(c.gateway().is_empty());

        let token = c.trigger_next_segment(&ADMIN, id).unwrap();
        assert_eq!(c.get_match(id).unwrap().status, MatchStatus::Cooldown);
        assert_eq!(c.correlated_match(&token).unwrap().segment, 1);

        // A second trigger while one is outstanding is refused
        assert!(matches!(
            c.trigger_next_segment(&ADMIN, id),
            Err(EngineError::State { status: MatchStatus::Cooldown, .. })
        ));

        let report = c.supply_randomness(&ORACLE, token, &FOUL).unwrap();
        assert_eq!(report.outcome.segment, 1);
        assert_eq!(c.get_match(id).unwrap().current_segment, 2);
    }

    #[test]
    fn test_trigger_rejected_while_active() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        assert!(matches!(
            c.trigger_next_segment(&ADMIN, id),
            Err(EngineError::State { status: MatchStatus::Active, operation: Operation::TriggerNextSegment, .. })
        ));
        assert_eq!(c.trigger_next_segment(&ADMIN, 42), Err(EngineError::UnknownMatch(42)));
    }

    #[test]
    fn test_auto_re_request_failure_parks_in_cooldown() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let token = pending(&c, id);
        c.oracle_mut().set_failing(Some("subscription drained".into()));

        let report = c.supply_randomness(&ORACLE, token, &HOME_GOAL).unwrap();
        assert_eq!(report.status, MatchStatus::Cooldown);
        assert_eq!(c.get_match(id).unwrap().current_segment, 1);
        assert!(c.outstanding_request(id).is_none());
        assert!(matches!(
            c.events().last().map(|e| &e.data),
            Some(MatchEventData::RandomnessRequestFailed { request_id: None, .. })
        ));

        c.oracle_mut().set_failing(None);
        let resumed = c.trigger_next_segment(&ADMIN, id).unwrap();
        assert_eq!(c.outstanding_request(id), Some(resumed));
    }

    #[test]
    fn test_force_fail_purges_and_blocks_later_fulfillment() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let token = pending(&c, id);

        c.force_fail(&ADMIN, id, token).unwrap();
        assert_eq!(c.get_match(id).unwrap().status, MatchStatus::Failed);
        assert!(c.gateway().is_empty());

        assert_eq!(
            c.supply_randomness(&ORACLE, token, &HOME_GOAL),
            Err(EngineError::Correlation(CorrelationError::Consumed(token)))
        );
        assert!(matches!(
            c.force_fail(&ADMIN, id, token),
            Err(EngineError::TerminalState { status: MatchStatus::Failed, .. })
        ));
        assert!(matches!(
            c.trigger_next_segment(&ADMIN, id),
            Err(EngineError::TerminalState { .. })
        ));
        assert!(!c.events().iter().any(|e| matches!(e.data, MatchEventData::ExperienceAwarded { .. })));
    }

    #[test]
    fn test_force_fail_ignores_foreign_token() {
        let (mut c, home, away) = setup(ProgressionPolicy::AutoProgress);
        let first = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        let second = c.create_match(&ADMIN, &[away], &[home], 0, 0, 0).unwrap();
        let second_token = pending(&c, second);

        c.force_fail(&ADMIN, first, second_token).unwrap();

        assert_eq!(c.outstanding_request(second), Some(second_token));
        assert_eq!(c.gateway().len(), 1);
    }

    #[test]
    fn test_full_match_concludes_and_pays() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let (home, away) = {
            let m = c.get_match(id).unwrap();
            (m.home.players[0].player_id, m.away.players[0].player_id)
        };

        for _ in 0..10 {
            let report = c.supply_randomness(&ORACLE, pending(&c, id), &HOME_GOAL).unwrap();
            if report.status == MatchStatus::Concluded {
                assert_eq!(report.awards.len(), 2);
            }
        }

        let m = c.get_match(id).unwrap();
        assert_eq!(m.status, MatchStatus::Concluded);
        assert_eq!(m.score(), (10, 0));
        assert!(c.gateway().is_empty());
        assert_eq!(c.registry().experience(home), Some(1150));
        assert_eq!(c.registry().experience(away), Some(100));
        assert!(c.transcript(id).unwrap().is_complete());

        let names: Vec<_> = c.events().iter().rev().take(3).map(|e| e.data.name()).collect();
        assert_eq!(names, vec!["match_concluded", "experience_awarded", "experience_awarded"]);
    }

    #[test]
    fn test_registry_failure_on_final_segment_rolls_back() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        for _ in 0..9 {
            c.supply_randomness(&ORACLE, pending(&c, id), &FOUL).unwrap();
        }
        let away = c.get_match(id).unwrap().away.players[0].player_id;
        c.registry_mut().burn(away).unwrap();

        let last = pending(&c, id);
        assert_eq!(
            c.supply_randomness(&ORACLE, last, &FOUL),
            Err(EngineError::Registry(RegistryError::UnknownPlayer(away)))
        );
        let m = c.get_match(id).unwrap();
        assert_eq!((m.status, m.current_segment), (MatchStatus::Active, 9));
        assert_eq!(c.outstanding_request(id), Some(last));
    }

    /// Registry that refuses one experience write for a chosen player.
    struct FailsOnce {
        inner: InMemoryRegistry,
        refuse: Option<PlayerId>,
    }

    impl PlayerRegistry for FailsOnce {
        fn attributes(&self, id: PlayerId) -> Result<PlayerAttributes, RegistryError> {
            self.inner.attributes(id)
        }

        fn exists(&self, id: PlayerId) -> bool {
            self.inner.exists(id)
        }

        fn owner_of(&self, id: PlayerId) -> Result<AccountId, RegistryError> {
            self.inner.owner_of(id)
        }

        fn add_experience(&mut self, id: PlayerId, amount: u64) -> Result<(), RegistryError> {
            if self.refuse == Some(id) {
                self.refuse = None;
                return Err(RegistryError::ExperienceOverflow(id));
            }
            self.inner.add_experience(id, amount)
        }
    }

    #[test]
    fn test_interrupted_reward_batch_pays_once_on_redelivery() {
        let mut inner = InMemoryRegistry::new();
        let home = inner.mint(AccountId::new([1; 16]), PlayerAttributes::new(200, 100));
        let away = inner.mint(AccountId::new([2; 16]), PlayerAttributes::new(100, 200));
        let registry = FailsOnce { inner, refuse: Some(away) };
        let mut c = MatchController::new(
            EngineConfig::default(),
            AccessPolicy::new(ADMIN, ORACLE),
            LocalOracle::new(1),
            registry,
        );
        let id = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        for _ in 0..9 {
            c.supply_randomness(&ORACLE, pending(&c, id), &HOME_GOAL).unwrap();
        }

        let last = pending(&c, id);
        assert_eq!(
            c.supply_randomness(&ORACLE, last, &HOME_GOAL),
            Err(EngineError::Registry(RegistryError::ExperienceOverflow(away)))
        );
        assert_eq!(c.registry().inner.experience(home), Some(1150));
        assert_eq!(c.get_match(id).unwrap().status, MatchStatus::Active);
        assert_eq!(c.outstanding_request(id), Some(last));

        let report = c.supply_randomness(&ORACLE, last, &HOME_GOAL).unwrap();
        assert_eq!(report.status, MatchStatus::Concluded);
        assert_eq!(report.awards.len(), 2);
        assert_eq!(c.registry().inner.experience(home), Some(1150));
        assert_eq!(c.registry().inner.experience(away), Some(100));

        let awarded = c
            .events()
            .iter()
            .filter(|e| matches!(e.data, MatchEventData::ExperienceAwarded { .. }))
            .count();
        assert_eq!(awarded, 2);
        assert!(crate::proof::verify_transcript(c.transcript(id).unwrap()).valid);
    }

    #[test]
    fn test_force_fail_from_cooldown() {
        let (mut c, home, away) = setup(ProgressionPolicy::ManualResume);

        // Parked with nothing outstanding
        let idle = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        let spent = pending(&c, idle);
        c.supply_randomness(&ORACLE, spent, &FOUL).unwrap();
        assert_eq!(c.get_match(idle).unwrap().status, MatchStatus::Cooldown);
        assert!(c.outstanding_request(idle).is_none());

        c.force_fail(&ADMIN, idle, spent).unwrap();
        assert_eq!(c.get_match(idle).unwrap().status, MatchStatus::Failed);
        assert!(matches!(
            c.trigger_next_segment(&ADMIN, idle),
            Err(EngineError::TerminalState { status: MatchStatus::Failed, .. })
        ));

        // Parked and resumed, failed before the words arrive
        let resumed = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        c.supply_randomness(&ORACLE, pending(&c, resumed), &FOUL).unwrap();
        let token = c.trigger_next_segment(&ADMIN, resumed).unwrap();
        assert_eq!(c.get_match(resumed).unwrap().status, MatchStatus::Cooldown);

        c.force_fail(&ADMIN, resumed, token).unwrap();
        assert!(c.gateway().is_empty());
        assert_eq!(
            c.supply_randomness(&ORACLE, token, &FOUL),
            Err(EngineError::Correlation(CorrelationError::Consumed(token)))
        );

        let m = c.get_match(resumed).unwrap();
        assert_eq!((m.status, m.current_segment, m.last_request_id), (MatchStatus::Failed, 1, None));
        assert!(!c.events().iter().any(|e| matches!(e.data, MatchEventData::ExperienceAwarded { .. })));
    }

    #[test]
    fn test_prune_retired_tokens_keeps_live_matches() {
        let (mut c, home, away) = setup(ProgressionPolicy::AutoProgress);
        let done = c.create_match(&ADMIN, &[home], &[away], 0, 0, 0).unwrap();
        let playing = c.create_match(&ADMIN, &[away], &[home], 0, 0, 0).unwrap();

        let mut spent = Vec::new();
        for _ in 0..10 {
            let token = pending(&c, done);
            c.supply_randomness(&ORACLE, token, &FOUL).unwrap();
            spent.push(token);
        }
        let early = pending(&c, playing);
        c.supply_randomness(&ORACLE, early, &FOUL).unwrap();
        assert_eq!(c.gateway().retired_len(), 11);

        assert_eq!(c.prune_retired_tokens(), 10);
        assert_eq!(c.gateway().retired_len(), 1);
        assert_eq!(
            c.supply_randomness(&ORACLE, spent[9], &FOUL),
            Err(EngineError::Correlation(CorrelationError::Unknown(spent[9])))
        );
        assert_eq!(
            c.supply_randomness(&ORACLE, early, &FOUL),
            Err(EngineError::Correlation(CorrelationError::Consumed(early)))
        );
        assert!(c.outstanding_request(playing).is_some());
    }

    #[test]
    fn test_duplicate_token_from_provider() {
        struct Stuck;
        impl RandomnessOracle for Stuck {
            fn request_randomness(&mut self, _: &RandomnessConfig) -> Result<RequestId, OracleError> {
                Ok(RequestId::new([9; 32]))
            }
        }

        let mut registry = InMemoryRegistry::new();
        let a = registry.mint(AccountId::default(), PlayerAttributes::new(50, 50));
        let b = registry.mint(AccountId::default(), PlayerAttributes::new(50, 50));
        let mut c = MatchController::new(EngineConfig::default(), AccessPolicy::new(ADMIN, ORACLE), Stuck, registry);

        let id = c.create_match(&ADMIN, &[a], &[b], 0, 0, 0).unwrap();
        let report = c.supply_randomness(&ORACLE, RequestId::new([9; 32]), &FOUL).unwrap();
        assert_eq!(report.status, MatchStatus::Cooldown);

        assert_eq!(
            c.create_match(&ADMIN, &[a], &[b], 0, 0, 0),
            Err(EngineError::Oracle(OracleError::DuplicateToken))
        );
        assert_eq!(c.match_count(), 1);
        assert_eq!(c.get_match(id).unwrap().current_segment, 1);
    }

    #[test]
    fn test_configure_randomness() {
        let (mut c, _, _) = setup(ProgressionPolicy::AutoProgress);
        let config = RandomnessConfig { confirmations: 12, ..Default::default() };

        assert!(matches!(
            c.configure_randomness(&ORACLE, config.clone()),
            Err(EngineError::Unauthorized { .. })
        ));
        c.configure_randomness(&ADMIN, config).unwrap();
        assert_eq!(c.config().randomness.confirmations, 12);

        let bad = RandomnessConfig { word_count: 5, ..Default::default() };
        assert_eq!(
            c.configure_randomness(&ADMIN, bad),
            Err(EngineError::Oracle(OracleError::UnsupportedWordCount(5)))
        );
        assert_eq!(c.config().randomness.word_count, 7);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let (mut c, id) = started(ProgressionPolicy::AutoProgress);
        let home = c.get_match(id).unwrap().home.players[0].player_id;
        c.registry_mut().set_attributes(home, PlayerAttributes::new(1, 1)).unwrap();

        c.supply_randomness(&ORACLE, pending(&c, id), &HOME_GOAL).unwrap();
        let m = c.get_match(id).unwrap();
        assert_eq!(m.home.players[0].attributes.attack, 200);
        assert_eq!(m.score(), (1, 0));
    }
}
