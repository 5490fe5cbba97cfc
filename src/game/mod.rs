//! Game Logic Module
//!
//! All match simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `state`: Match, rosters, frozen player snapshots
//! - `power`: Team attack/defense power per segment
//! - `segment`: One segment of play from seven random words
//! - `reward`: Experience awarded at conclusion
//! - `events`: Ordered event stream for indexing and audit

pub mod state;
pub mod power;
pub mod segment;
pub mod reward;
pub mod events;

// Re-export key types
pub use state::{Match, MatchId, MatchStatus, PlayerId, Side, TacticalStyle, TeamRoster};
pub use segment::{play_segment, SegmentOutcome, SegmentWords};
pub use reward::ExperienceAward;
pub use events::{EventLog, MatchEvent, MatchEventData};
