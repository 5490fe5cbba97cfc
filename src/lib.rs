//! # Kickoff Match Engine
//!
//! Segment-level football simulation driven by externally supplied, verifiable
//! randomness. Two frozen rosters play ten discrete segments; each segment
//! consumes one batch of seven random words and resolves at most one scoring
//! opportunity. Experience is paid to the player registry when the match
//! concludes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      KICKOFF ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Scaled-integer (x100 / x1000) arithmetic  │
//! │  ├── rng.rs      - Xorshift128+ PRNG for local randomness    │
//! │  └── hash.rs     - SHA-256 state hashing                     │
//! │                                                              │
//! │  game/           - Match logic (deterministic)               │
//! │  ├── state.rs    - Match, rosters, player snapshots          │
//! │  ├── power.rs    - Team attack/defense power                 │
//! │  ├── segment.rs  - Segment event simulation                  │
//! │  ├── reward.rs   - Experience rewards                        │
//! │  └── events.rs   - Ordered event stream                      │
//! │                                                              │
//! │  oracle/         - Two-phase randomness protocol             │
//! │  ├── gateway.rs  - Request token → match correlation         │
//! │  └── local.rs    - Seeded in-process provider                │
//! │                                                              │
//! │  controller.rs   - Match lifecycle state machine             │
//! │  access.rs       - Operation → role policy table             │
//! │  auth.rs         - JWT caller authentication                 │
//! │  registry.rs     - Player registry interface                 │
//! │  proof/          - Transcript recording and replay           │
//! │  service.rs      - Async host with oracle relay              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules use integer arithmetic only, iterate
//! `BTreeMap`s, and never read the clock inside a simulation step. Given the
//! same roster snapshots and the same random words, a match produces the
//! same scores, scorers, experience and state hash on every platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod access;
pub mod auth;
pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod game;
pub mod oracle;
pub mod proof;
pub mod registry;
pub mod service;

// Re-export commonly used types
pub use access::{AccessPolicy, Operation, Role};
pub use config::{EngineConfig, ProgressionPolicy};
pub use controller::{FulfillmentReport, MatchController};
pub use error::{EngineError, ValidationError};
pub use game::state::{
    AccountId, Match, MatchId, MatchStatus, PlayerAttributes, PlayerId, PlayerSnapshot, Side,
    TacticalStyle, TeamPower, TeamRoster,
};
pub use game::segment::{SegmentOutcome, SegmentWords};
pub use oracle::{RandomnessConfig, RandomnessOracle, RequestId};
pub use registry::{InMemoryRegistry, PlayerRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Segments played in every match.
pub const SEGMENT_COUNT: u8 = 10;

/// Random words consumed per segment.
pub const WORDS_PER_SEGMENT: usize = 7;

/// Smallest roster accepted at match creation.
pub const MIN_ROSTER_SIZE: usize = 1;

/// Largest roster accepted at match creation.
pub const MAX_ROSTER_SIZE: usize = 11;

/// Highest referee strictness level.
pub const MAX_REFEREE_STRICTNESS: u8 = 10;
