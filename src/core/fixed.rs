//! Scaled-Integer Arithmetic
//!
//! Ratios in the match engine are integers scaled by 100 (percent) or by
//! 1000 (per mille). There is no floating point anywhere in match logic.
//!
//! ## Rules
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  value × ratio / SCALE                                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  - i64 intermediates (attributes are u32, ratios ≤ 1250)    │
//! │  - multiply first, divide last                              │
//! │  - division truncates toward zero (Rust integer semantics)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Truncation toward zero matters for the signed terms in the momentum
//! formula: `-4 / 5 == 0`, not `-1`.

/// Percent scale (1.00 = 100).
pub const PERCENT: i64 = 100;

/// Per-mille scale (1.000 = 1000).
pub const PERMILLE: i64 = 1000;

// =============================================================================
// GAME CONSTANTS (all scaled integers)
// =============================================================================

/// Form value that leaves attributes untouched.
pub const FORM_NEUTRAL: i64 = 50;

/// Highest form value.
pub const FORM_MAX: u32 = 100;

/// Per-mille change in attributes per point of form away from neutral.
pub const FORM_STEP_PERMILLE: i64 = 5;

/// Aggressive/Defensive boost: 1.10
pub const TACTIC_BOOST_PCT: i64 = 110;

/// Aggressive/Defensive penalty: 0.85
pub const TACTIC_PENALTY_PCT: i64 = 85;

/// Home advantage: 1.05
pub const HOME_ADVANTAGE_PCT: i64 = 105;

/// Neutral momentum split between the two sides (percent).
pub const MOMENTUM_BASE: i64 = 50;

/// Divisor applied to power differences in the momentum formula.
pub const MOMENTUM_DIVISOR: i64 = 5;

/// Base shot success rate, per mille (30%).
pub const SHOT_BASE_RATE: i64 = 300;

/// Lowest applied shot success rate, per mille (5%).
pub const SHOT_RATE_MIN: i64 = 50;

/// Highest applied shot success rate, per mille (70%).
pub const SHOT_RATE_MAX: i64 = 700;

/// Lower bound of the expected-goals jitter, per mille (0.90).
pub const JITTER_MIN: u64 = 900;

/// Number of distinct jitter steps (0.90 ..= 1.10).
pub const JITTER_SPAN: u64 = 201;

/// Defense added per referee strictness level.
pub const STRICTNESS_DEFENSE_STEP: i64 = 5;

/// Defense power that maps to a 100% raw save probability.
pub const SAVE_DEFENSE_REFERENCE: i64 = 300;

/// Highest save probability (percent).
pub const SAVE_PROBABILITY_MAX: i64 = 85;

// =============================================================================
// CORE OPERATIONS
// =============================================================================

/// Multiply `value` by a percent ratio, truncating.
///
/// # Example
/// ```
/// use kickoff::core::fixed::scale_pct;
/// assert_eq!(scale_pct(200, 105), 210);
/// assert_eq!(scale_pct(99, 85), 84);
/// ```
#[inline]
pub const fn scale_pct(value: i64, pct: i64) -> i64 {
    value * pct / PERCENT
}

/// Multiply `value` by a per-mille ratio, truncating.
///
/// # Example
/// ```
/// use kickoff::core::fixed::scale_permille;
/// assert_eq!(scale_permille(305, 1100), 335);
/// ```
#[inline]
pub const fn scale_permille(value: i64, permille: i64) -> i64 {
    value * permille / PERMILLE
}

/// Per-mille multiplier for a form value.
///
/// Form is clamped to `0..=100`, giving factors from 750 to 1250.
#[inline]
pub fn form_factor(form: u32) -> i64 {
    let form = form.min(FORM_MAX) as i64;
    PERMILLE + (form - FORM_NEUTRAL) * FORM_STEP_PERMILLE
}

/// Narrow a non-negative i64 into u32, saturating.
#[inline]
pub fn to_u32_saturating(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

// =============================================================================
// TESTS
// =============================================================================
