//! Match Proof System
//!
//! Provides verifiable match outcomes through:
//! - Transcript recording (rosters, words, per-segment hashes)
//! - Verification by deterministic replay
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  transcript.rs   - Match transcript recording (bincode)     │
//! │  verify.rs       - Verification by replay                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod transcript;
pub mod verify;

// Re-export key types
pub use transcript::{
    InitialMatchState, MatchMetadata, MatchResult, MatchTranscript, SegmentRecord,
    TranscriptError,
};
pub use verify::{
    replay_segments, verify_transcript, CheckpointResult, VerificationError, VerificationResult,
};
