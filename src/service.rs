//! Async Match Service
//!
//! Hosts a controller behind a tokio mutex so concurrent callers are
//! serialized, and relays words from the local randomness provider back into
//! the controller, either on demand or from a background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::auth::{authenticate, AuthConfig, AuthError};
use crate::controller::{FulfillmentReport, MatchController};
use crate::error::{EngineError, EngineResult};
use crate::game::events::MatchEvent;
use crate::game::state::{AccountId, Match, MatchId, MatchStatus, PlayerId};
use crate::oracle::{LocalOracle, RandomnessConfig, RequestId};
use crate::proof::transcript::MatchTranscript;
use crate::registry::PlayerRegistry;

/// Shared controller plus the oracle relay.
pub struct MatchService<R> {
    controller: Arc<Mutex<MatchController<LocalOracle, R>>>,
    relay_account: AccountId,
    auth: AuthConfig,
}

impl<R> Clone for MatchService<R> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            relay_account: self.relay_account,
            auth: self.auth.clone(),
        }
    }
}

impl<R: PlayerRegistry + Send + 'static> MatchService<R> {
    /// Wrap a controller. `relay_account` must hold the Oracle role.
    pub fn new(controller: MatchController<LocalOracle, R>, relay_account: AccountId, auth: AuthConfig) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            relay_account,
            auth,
        }
    }

    /// Resolve a bearer token to the caller's account.
    pub fn authenticate(&self, token: &str) -> Result<AccountId, AuthError> {
        authenticate(token, &self.auth)
    }

    /// See [`MatchController::create_match`].
    pub async fn create_match(
        &self,
        caller: AccountId,
        home_ids: Vec<PlayerId>,
        away_ids: Vec<PlayerId>,
        home_tactic_code: u8,
        away_tactic_code: u8,
        referee_strictness: u8,
    ) -> EngineResult<MatchId> {
        let mut controller = self.controller.lock().await;
        controller.create_match(
            &caller,
            &home_ids,
            &away_ids,
            home_tactic_code,
            away_tactic_code,
            referee_strictness,
        )
    }

    /// See [`MatchController::supply_randomness`].
    pub async fn supply_randomness(
        &self,
        caller: AccountId,
        request_id: RequestId,
        words: Vec<u64>,
    ) -> EngineResult<FulfillmentReport> {
        self.controller.lock().await.supply_randomness(&caller, request_id, &words)
    }

    /// See [`MatchController::trigger_next_segment`].
    pub async fn trigger_next_segment(&self, caller: AccountId, match_id: MatchId) -> EngineResult<RequestId> {
        self.controller.lock().await.trigger_next_segment(&caller, match_id)
    }

    /// See [`MatchController::force_fail`].
    pub async fn force_fail(&self, caller: AccountId, match_id: MatchId, request_id: RequestId) -> EngineResult<()> {
        self.controller.lock().await.force_fail(&caller, match_id, request_id)
    }

    /// See [`MatchController::configure_randomness`].
    pub async fn configure_randomness(&self, caller: AccountId, config: RandomnessConfig) -> EngineResult<()> {
        self.controller.lock().await.configure_randomness(&caller, config)
    }

    /// Copy of a match.
    pub async fn get_match(&self, match_id: MatchId) -> Option<Match> {
        self.controller.lock().await.get_match(match_id).cloned()
    }

    /// Status of a match.
    pub async fn status(&self, match_id: MatchId) -> Option<MatchStatus> {
        self.controller.lock().await.get_match(match_id).map(|m| m.status)
    }

    /// Copy of a match transcript.
    pub async fn transcript(&self, match_id: MatchId) -> Option<MatchTranscript> {
        self.controller.lock().await.transcript(match_id).cloned()
    }

    /// Events with a sequence number above `sequence`.
    pub async fn events_since(&self, sequence: u64) -> Vec<MatchEvent> {
        self.controller.lock().await.event_log().since(sequence).to_vec()
    }

    /// Take retained events.
    pub async fn drain_events(&self) -> Vec<MatchEvent> {
        self.controller.lock().await.drain_events()
    }

    /// Run a closure against the controller while holding the lock.
    pub async fn with_controller<T>(&self, f: impl FnOnce(&mut MatchController<LocalOracle, R>) -> T) -> T {
        let mut controller = self.controller.lock().await;
        f(&mut controller)
    }

    /// Deliver every token the provider has issued so far.
    ///
    /// Tokens issued during this call (auto progression) wait for the next
    /// one. Returns one entry per delivered token.
    pub async fn deliver_pending(&self) -> Vec<(RequestId, EngineResult<FulfillmentReport>)> {
        let mut controller = self.controller.lock().await;
        let tokens = controller.oracle_mut().take_pending();

        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            let words = controller.oracle().words_for(&token);
            let result = controller.supply_randomness(&self.relay_account, token, &words);
            match &result {
                Ok(report) => debug!(
                    match_id = report.match_id,
                    segment = report.outcome.segment,
                    status = %report.status,
                    "relay delivered"
                ),
                Err(EngineError::Correlation(e)) => debug!(error = %e, "relay dropped stale token"),
                Err(e) => warn!(request = %token.short(), error = %e, "relay delivery failed"),
            }
            results.push((token, result));
        }
        results
    }

    /// Keep delivering until the match leaves play or stops making progress.
    pub async fn run_to_completion(&self, match_id: MatchId) -> EngineResult<MatchStatus> {
        loop {
            let delivered = self.deliver_pending().await;
            let status = self.status(match_id).await.ok_or(EngineError::UnknownMatch(match_id))?;
            if !status.is_in_play() || delivered.is_empty() {
                return Ok(status);
            }
        }
    }

    /// See [`MatchController::prune_retired_tokens`].
    pub async fn prune_retired_tokens(&self) -> usize {
        self.controller.lock().await.prune_retired_tokens()
    }

    /// Deliver pending tokens on a fixed period until the handle is aborted.
    ///
    /// Retired tokens of finished matches are pruned after each round.
    pub fn spawn_relay(&self, period: Duration) -> JoinHandle<()> {
        let service = self.clone();
        info!(period_ms = period.as_millis() as u64, "randomness relay started");
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                service.deliver_pending().await;
                service.prune_retired_tokens().await;
            }
        })
    }
}
