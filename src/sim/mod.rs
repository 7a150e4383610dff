//! Deterministic grid simulation module
//!
//! All falling-block rules live here. This module must be pure and deterministic:
//! - No timers or wall-clock reads (gravity is driven from outside)
//! - Seeded RNG only
//! - No rendering or platform dependencies

pub mod board;
pub mod engine;
pub mod piece;

pub use board::Board;
pub use engine::{
    Direction, GameOverReason, GridEngine, GridEvent, GridSnapshot, PointsSource, RandomShapes,
    ScriptedShapes, ShapeSource, SnapshotCell, clear_points,
};
pub use piece::{CellToken, Mask, Piece, Shape};
