//! Trivia Blocks - a falling-block puzzle gated by trivia questions
//!
//! Core modules:
//! - `sim`: Deterministic grid simulation (board, pieces, locking, line clears)
//! - `quiz`: Question bank and the challenge gate state machine
//! - `session`: Orchestrator binding the grid engine to the challenge gate
//! - `clock`: Injected scheduler abstraction (virtual clock for tests and drivers)
//! - `highscores`: Score store collaborator and the local leaderboard
//! - `settings`: Player preferences and configuration
//! - `web`: Browser bindings (wasm32 only)

pub mod clock;
pub mod highscores;
pub mod quiz;
pub mod session;
pub mod settings;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use highscores::{Leaderboard, ScoreRecord, ScoreStore, StoreError, SubmitReceipt};
pub use session::{SessionController, SessionEvent, SessionPhase};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Board dimensions
    pub const COLS: usize = 10;
    pub const ROWS: usize = 20;

    /// Gravity interval at level 1 (ms)
    pub const BASE_GRAVITY_MS: u64 = 500;
    /// Gravity speed-up per level (ms)
    pub const GRAVITY_STEP_MS: u64 = 40;
    /// Fastest gravity interval (ms)
    pub const MIN_GRAVITY_MS: u64 = 50;

    /// Lines needed per level
    pub const LINES_PER_LEVEL: u32 = 10;

    /// Points for clearing 0..=4 rows in one lock, multiplied by level
    pub const LINE_CLEAR_POINTS: [u64; 5] = [0, 100, 300, 500, 800];
    /// Points per row fallen during a hard drop
    pub const HARD_DROP_POINTS_PER_ROW: u64 = 2;
    /// Flat bonus for a correct answer
    pub const CORRECT_ANSWER_BONUS: u64 = 50;

    /// Countdown resolution (ms)
    pub const COUNTDOWN_STEP_MS: u64 = 1000;
}

/// Level for a cumulative line count (1-based)
#[inline]
pub fn level_for_lines(lines: u32) -> u32 {
    lines / consts::LINES_PER_LEVEL + 1
}

/// Gravity tick interval for a level, in milliseconds
#[inline]
pub fn gravity_interval_ms(level: u32) -> u64 {
    use consts::*;
    let speedup = u64::from(level.saturating_sub(1)).saturating_mul(GRAVITY_STEP_MS);
    BASE_GRAVITY_MS.saturating_sub(speedup).max(MIN_GRAVITY_MS)
}
