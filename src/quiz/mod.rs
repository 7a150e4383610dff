//! Trivia challenges that gate continued play after a line clear

pub mod gate;
pub mod questions;

pub use gate::{Challenge, ChallengeGate, ChallengeOutcome, GateState, Resolution, Urgency};
pub use questions::{BankError, Difficulty, OPTION_COUNT, Question, QuestionBank};
