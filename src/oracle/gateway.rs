//! Request Correlation
//!
//! Maps each live request token to the match and segment it was issued for.
//! An entry is removed exactly once, by the first fulfillment or by a forced
//! failure. Removed tokens are remembered so a late redelivery can be told
//! apart from a token that was never issued. The retired set grows by one
//! entry per segment played; hosts that run indefinitely drop the entries of
//! finished matches with [`RandomnessGateway::forget_match`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::MatchId;
use crate::oracle::RequestId;

/// Where a token's words belong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Owning match
    pub match_id: MatchId,
    /// Segment the words will resolve
    pub segment: u8,
    /// When the request went out
    pub requested_at: DateTime<Utc>,
}

/// Token lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// Never issued through this gateway
    #[error("unknown request token {0}")]
    Unknown(RequestId),

    /// Already fulfilled or purged
    #[error("request token {0} already consumed")]
    Consumed(RequestId),
}

/// Correlation table for outstanding randomness requests.
#[derive(Debug, Default, Clone)]
pub struct RandomnessGateway {
    live: BTreeMap<RequestId, Correlation>,
    retired: BTreeMap<RequestId, MatchId>,
}

impl RandomnessGateway {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly issued token.
    ///
    /// Returns `false` (and changes nothing) if the token has been seen
    /// before, live or retired.
    pub fn register(&mut self, request_id: RequestId, correlation: Correlation) -> bool {
        if self.contains(&request_id) {
            return false;
        }
        self.live.insert(request_id, correlation);
        true
    }

    /// Remove a live token, returning what it correlated to.
    pub fn consume(&mut self, request_id: &RequestId) -> Result<Correlation, CorrelationError> {
        let correlation = self.lookup(request_id)?;
        self.live.remove(request_id);
        self.retired.insert(*request_id, correlation.match_id);
        Ok(correlation)
    }

    /// Read a live token without removing it.
    pub fn lookup(&self, request_id: &RequestId) -> Result<Correlation, CorrelationError> {
        match self.live.get(request_id) {
            Some(correlation) => Ok(*correlation),
            None if self.retired.contains_key(request_id) => Err(CorrelationError::Consumed(*request_id)),
            None => Err(CorrelationError::Unknown(*request_id)),
        }
    }

    /// Drop a live token without fulfilling it. Returns whether it was live.
    pub fn purge(&mut self, request_id: &RequestId) -> bool {
        match self.live.remove(request_id) {
            Some(correlation) => {
                self.retired.insert(*request_id, correlation.match_id);
                true
            }
            None => false,
        }
    }

    /// Has this token ever been registered?
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.live.contains_key(request_id) || self.retired.contains_key(request_id)
    }

    /// Is this token live?
    pub fn is_live(&self, request_id: &RequestId) -> bool {
        self.live.contains_key(request_id)
    }

    /// Live tokens belonging to one match, in token order.
    pub fn outstanding_for(&self, match_id: MatchId) -> Vec<RequestId> {
        self.live
            .iter()
            .filter(|(_, c)| c.match_id == match_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// All live entries, in token order.
    pub fn live(&self) -> impl Iterator<Item = (&RequestId, &Correlation)> {
        self.live.iter()
    }

    /// Drop the retired tokens of one match. Live tokens are kept.
    ///
    /// A forgotten token is reported as `Unknown` instead of `Consumed` and
    /// is still rejected. Returns how many entries were dropped.
    pub fn forget_match(&mut self, match_id: MatchId) -> usize {
        let before = self.retired.len();
        self.retired.retain(|_, owner| *owner != match_id);
        before - self.retired.len()
    }

    /// Number of retired tokens remembered.
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// No live tokens?
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(n: u8) -> RequestId {
        RequestId::new([n; 32])
    }

    fn corr(match_id: MatchId, segment: u8) -> Correlation {
        Correlation { match_id, segment, requested_at: Utc::now() }
    }

    #[test]
    fn test_consume_removes_exactly_once() {
        let mut gw = RandomnessGateway::new();
        assert!(gw.register(token(1), corr(7, 0)));

        let c = gw.consume(&token(1)).unwrap();
        assert_eq!((c.match_id, c.segment), (7, 0));
        assert!(gw.is_empty());

        assert_eq!(gw.consume(&token(1)), Err(CorrelationError::Consumed(token(1))));
        assert_eq!(gw.consume(&token(2)), Err(CorrelationError::Unknown(token(2))));
    }

    #[test]
    fn test_register_rejects_seen_tokens() {
        let mut gw = RandomnessGateway::new();
        assert!(gw.register(token(1), corr(1, 0)));
        assert!(!gw.register(token(1), corr(2, 0)));
        assert_eq!(gw.lookup(&token(1)).unwrap().match_id, 1);

        gw.consume(&token(1)).unwrap();
        assert!(!gw.register(token(1), corr(1, 1)));
    }

    #[test]
    fn test_purge_and_outstanding() {
        let mut gw = RandomnessGateway::new();
        gw.register(token(1), corr(1, 0));
        gw.register(token(2), corr(2, 4));
        gw.register(token(3), corr(1, 1));

        assert_eq!(gw.outstanding_for(1), vec![token(1), token(3)]);
        assert!(gw.purge(&token(1)));
        assert!(!gw.purge(&token(1)));
        assert_eq!(gw.outstanding_for(1), vec![token(3)]);
        assert_eq!(gw.len(), 2);
        assert!(matches!(gw.lookup(&token(1)), Err(CorrelationError::Consumed(_))));
    }

    #[test]
    fn test_forget_match_drops_only_its_retired_tokens() {
        let mut gw = RandomnessGateway::new();
        gw.register(token(1), corr(1, 0));
        gw.register(token(2), corr(1, 1));
        gw.register(token(3), corr(2, 0));
        gw.consume(&token(1)).unwrap();
        gw.consume(&token(3)).unwrap();
        assert_eq!(gw.retired_len(), 2);

        assert_eq!(gw.forget_match(1), 1);
        assert_eq!(gw.retired_len(), 1);
        assert!(gw.is_live(&token(2)));
        assert_eq!(gw.lookup(&token(1)), Err(CorrelationError::Unknown(token(1))));
        assert_eq!(gw.lookup(&token(3)), Err(CorrelationError::Consumed(token(3))));
    }
}
