//! Challenge gate: the quiz interruption state machine
//!
//! ```text
//! Idle --activate--> Active --answer(correct)----> ResolvedCorrect --close--> Idle
//!                           --answer(wrong)------> ResolvedIncorrect  (terminal)
//!                           --countdown reaches 0-> ResolvedTimeout    (terminal)
//! ```
//!
//! The countdown is the only timer the gate owns. It is cancelled on every
//! exit from `Active`, and fires for any other handle are ignored.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::questions::{Difficulty, Question, QuestionBank};
use crate::clock::{Scheduler, TimerHandle, TimerKind};
use crate::consts::COUNTDOWN_STEP_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Idle,
    Active,
    ResolvedCorrect,
    ResolvedIncorrect,
    ResolvedTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeOutcome {
    Pending,
    Correct,
    Incorrect,
    TimedOut,
}

/// Timer presentation hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Calm,
    Warning,
    Danger,
}

/// One quiz round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub question: Question,
    pub difficulty: Difficulty,
    pub budget_secs: u32,
    pub remaining_secs: u32,
    pub outcome: ChallengeOutcome,
    /// Option picked by the player, if any
    pub chosen: Option<usize>,
}

impl Challenge {
    pub fn urgency(&self) -> Urgency {
        // Integer form of remaining/budget <= 25% / 50%
        let (rem, total) = (self.remaining_secs * 4, self.budget_secs.max(1));
        if rem <= total {
            Urgency::Danger
        } else if rem <= total * 2 {
            Urgency::Warning
        } else {
            Urgency::Calm
        }
    }
}

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: ChallengeOutcome,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone)]
pub struct ChallengeGate {
    bank: QuestionBank,
    state: GateState,
    challenge: Option<Challenge>,
    countdown: Option<TimerHandle>,
}

impl Default for ChallengeGate {
    fn default() -> Self {
        Self::new(QuestionBank::builtin())
    }
}

impl ChallengeGate {
    pub fn new(bank: QuestionBank) -> Self {
        Self {
            bank,
            state: GateState::Idle,
            challenge: None,
            countdown: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == GateState::Active
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Live countdown handle, if any
    pub fn countdown_handle(&self) -> Option<TimerHandle> {
        self.countdown
    }

    pub fn urgency(&self) -> Option<Urgency> {
        self.challenge
            .as_ref()
            .filter(|_| self.is_active())
            .map(Challenge::urgency)
    }

    /// Start a round at the tier for `questions_answered`
    pub fn activate<R, S>(&mut self, questions_answered: u32, rng: &mut R, sched: &mut S) -> &Challenge
    where
        R: Rng + ?Sized,
        S: Scheduler + ?Sized,
    {
        self.cancel_countdown(sched);

        let difficulty = Difficulty::for_answered(questions_answered);
        let question = self.bank.draw(difficulty, rng);
        let budget_secs = difficulty.time_budget_secs();
        log::info!(
            "challenge ({}, {}s): {}",
            difficulty.as_str(),
            budget_secs,
            question.prompt
        );

        self.countdown = Some(sched.schedule_repeating(TimerKind::Countdown, COUNTDOWN_STEP_MS));
        self.state = GateState::Active;
        self.challenge.insert(Challenge {
            question,
            difficulty,
            budget_secs,
            remaining_secs: budget_secs,
            outcome: ChallengeOutcome::Pending,
            chosen: None,
        })
    }

    /// Submit an answer. Outside `Active` this does nothing.
    pub fn answer<S: Scheduler + ?Sized>(&mut self, index: usize, sched: &mut S) -> Option<Resolution> {
        if !self.is_active() {
            return None;
        }
        self.cancel_countdown(sched);

        let challenge = self.challenge.as_mut()?;
        challenge.chosen = Some(index);
        let (state, outcome) = if index == challenge.question.correct_index {
            (GateState::ResolvedCorrect, ChallengeOutcome::Correct)
        } else {
            (GateState::ResolvedIncorrect, ChallengeOutcome::Incorrect)
        };
        challenge.outcome = outcome;
        self.state = state;
        Some(Resolution {
            outcome,
            difficulty: challenge.difficulty,
        })
    }

    /// Handle a countdown fire. Returns the timeout resolution when the
    /// countdown reaches zero; stale handles are ignored.
    pub fn on_countdown<S: Scheduler + ?Sized>(
        &mut self,
        handle: TimerHandle,
        sched: &mut S,
    ) -> Option<Resolution> {
        if !self.is_active() || self.countdown != Some(handle) {
            log::debug!("ignoring stale countdown fire {handle:?}");
            return None;
        }
        let challenge = self.challenge.as_mut()?;
        challenge.remaining_secs = challenge.remaining_secs.saturating_sub(1);
        if challenge.remaining_secs > 0 {
            return None;
        }

        challenge.outcome = ChallengeOutcome::TimedOut;
        let difficulty = challenge.difficulty;
        self.cancel_countdown(sched);
        self.state = GateState::ResolvedTimeout;
        Some(Resolution {
            outcome: ChallengeOutcome::TimedOut,
            difficulty,
        })
    }

    /// Return to `Idle` after a correct answer. Returns whether it closed.
    pub fn close(&mut self) -> bool {
        if self.state != GateState::ResolvedCorrect {
            return false;
        }
        self.state = GateState::Idle;
        self.challenge = None;
        true
    }

    /// Cancel any pending countdown (session teardown). The state is kept.
    pub fn teardown<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        self.cancel_countdown(sched);
    }

    /// Back to `Idle` with no challenge, cancelling the countdown
    pub fn reset<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        self.cancel_countdown(sched);
        self.state = GateState::Idle;
        self.challenge = None;
    }

    fn cancel_countdown<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        if let Some(handle) = self.countdown.take() {
            sched.cancel(handle);
        }
    }
}
