//! Session controller
//!
//! Binds the grid engine to the challenge gate and owns the session-wide
//! accumulators. Every mutating entry point is gated on the macro-state:
//!
//! - `Running`: gravity timer live, commands accepted, no countdown
//! - `ChallengeActive`: countdown live, gravity cancelled, only `answer` matters
//! - `Ended`: no timers, everything ignored until the next `start_session`
//!
//! The score store is called exactly once per finished session.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::clock::{Scheduler, TimerFire, TimerHandle, TimerKind};
use crate::consts::CORRECT_ANSWER_BONUS;
use crate::highscores::{ScoreRecord, ScoreStore, SubmitReceipt};
use crate::quiz::{
    Challenge, ChallengeGate, ChallengeOutcome, Difficulty, QuestionBank, Resolution, Urgency,
};
use crate::sim::{
    Direction, GameOverReason, GridEngine, GridEvent, GridSnapshot, RandomShapes, ShapeSource,
};
use crate::{gravity_interval_ms, level_for_lines};

/// Stream offset so quiz draws and piece draws don't share a sequence
const QUIZ_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Who is playing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Top-level macro-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Constructed, not started
    Ready,
    Running,
    ChallengeActive,
    Ended,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    BoardFull,
    NoSpace,
    WrongAnswer,
    TimedOut,
}

impl EndReason {
    pub fn message(&self) -> &'static str {
        match self {
            EndReason::BoardFull => GameOverReason::BoardFull.message(),
            EndReason::NoSpace => GameOverReason::NoSpace.message(),
            EndReason::WrongAnswer => "You answered incorrectly!",
            EndReason::TimedOut => "You ran out of time!",
        }
    }
}

impl From<GameOverReason> for EndReason {
    fn from(reason: GameOverReason) -> Self {
        match reason {
            GameOverReason::BoardFull => EndReason::BoardFull,
            GameOverReason::NoSpace => EndReason::NoSpace,
        }
    }
}

/// Session-wide accumulators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub score: u64,
    pub lines: u32,
    pub level: u32,
    pub questions_answered: u32,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            score: 0,
            lines: 0,
            level: 1,
            questions_answered: 0,
        }
    }
}

/// Notifications for the surrounding UI, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    Started,
    PointsAwarded { points: u64, total: u64 },
    LinesCleared { count: u32, lines: u32 },
    LevelUp { level: u32 },
    ChallengeStarted { difficulty: Difficulty, budget_secs: u32 },
    CountdownTick { remaining_secs: u32 },
    ChallengeResolved { outcome: ChallengeOutcome },
    /// Terminal event; emitted once per session
    Ended {
        reason: EndReason,
        message: String,
        stats: SessionStats,
        receipt: Option<SubmitReceipt>,
    },
    Abandoned,
}

/// Everything a renderer needs after a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub stats: SessionStats,
    pub grid: GridSnapshot,
    pub challenge: Option<Challenge>,
    pub urgency: Option<Urgency>,
    pub end_reason: Option<EndReason>,
}

/// Construction parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub player: Player,
    pub seed: u64,
    pub bank: QuestionBank,
    pub show_ghost: bool,
}

impl SessionConfig {
    pub fn new(player: Player, seed: u64) -> Self {
        Self {
            player,
            seed,
            bank: QuestionBank::builtin(),
            show_ghost: true,
        }
    }
}

pub struct SessionController<S: Scheduler, T: ScoreStore> {
    engine: GridEngine,
    gate: ChallengeGate,
    clock: S,
    store: T,
    rng: Pcg32,
    player: Player,
    show_ghost: bool,
    phase: SessionPhase,
    stats: SessionStats,
    gravity: Option<TimerHandle>,
    last_difficulty: Option<Difficulty>,
    end_reason: Option<EndReason>,
    submitted: bool,
    events: Vec<SessionEvent>,
}

impl<S: Scheduler, T: ScoreStore> SessionController<S, T> {
    /// Controller with seeded random pieces
    pub fn new(clock: S, store: T, config: SessionConfig) -> Self {
        let shapes = Box::new(RandomShapes::new(config.seed));
        Self::with_shapes(clock, store, config, shapes)
    }

    /// Controller with a custom piece sequence
    pub fn with_shapes(
        clock: S,
        store: T,
        config: SessionConfig,
        shapes: Box<dyn ShapeSource>,
    ) -> Self {
        Self {
            engine: GridEngine::new(shapes),
            gate: ChallengeGate::new(config.bank),
            clock,
            store,
            rng: Pcg32::seed_from_u64(config.seed ^ QUIZ_STREAM),
            player: config.player,
            show_ghost: config.show_ghost,
            phase: SessionPhase::Ready,
            stats: SessionStats::default(),
            gravity: None,
            last_difficulty: None,
            end_reason: None,
            submitted: false,
            events: Vec::new(),
        }
    }

    // --- Accessors ---

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn engine(&self) -> &GridEngine {
        &self.engine
    }

    /// Engine access for setting up positions
    pub fn engine_mut(&mut self) -> &mut GridEngine {
        &mut self.engine
    }

    pub fn gate(&self) -> &ChallengeGate {
        &self.gate
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.gate.challenge()
    }

    pub fn clock(&self) -> &S {
        &self.clock
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Difficulty of the most recent challenge
    pub fn last_difficulty(&self) -> Option<Difficulty> {
        self.last_difficulty
    }

    pub fn is_gravity_active(&self) -> bool {
        self.gravity.is_some_and(|h| self.clock.is_scheduled(h))
    }

    pub fn is_countdown_active(&self) -> bool {
        self.gate
            .countdown_handle()
            .is_some_and(|h| self.clock.is_scheduled(h))
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            stats: self.stats,
            grid: self.engine.snapshot(self.show_ghost),
            challenge: self.gate.challenge().cloned(),
            urgency: self.gate.urgency(),
            end_reason: self.end_reason,
        }
    }

    // --- Lifecycle ---

    /// Reset everything and start falling
    pub fn start_session(&mut self) {
        self.stop_timers();
        self.gate.reset(&mut self.clock);
        if self.phase != SessionPhase::Ready {
            self.engine.reset();
        }
        self.engine.set_level(1);
        self.engine.resume();

        self.stats = SessionStats::default();
        self.last_difficulty = None;
        self.end_reason = None;
        self.submitted = false;
        self.events.clear();

        self.phase = SessionPhase::Running;
        self.schedule_gravity();
        log::info!("session started for {}", self.player.id);
        self.events.push(SessionEvent::Started);
    }

    /// Leave without recording a score
    pub fn abandon(&mut self) {
        if matches!(self.phase, SessionPhase::Ended | SessionPhase::Ready) {
            return;
        }
        self.stop_timers();
        self.engine.halt();
        self.phase = SessionPhase::Ended;
        log::info!("session abandoned at score {}", self.stats.score);
        self.events.push(SessionEvent::Abandoned);
    }

    // --- Commands ---

    pub fn move_left(&mut self) -> bool {
        self.command(|e| e.move_piece(Direction::Left))
    }

    pub fn move_right(&mut self) -> bool {
        self.command(|e| e.move_piece(Direction::Right))
    }

    pub fn rotate(&mut self) -> bool {
        self.command(GridEngine::rotate)
    }

    /// Returns whether the piece moved down; false when it locked instead
    pub fn soft_drop(&mut self) -> bool {
        self.command(GridEngine::soft_drop)
    }

    /// Returns whether a piece was dropped and locked
    pub fn hard_drop(&mut self) -> bool {
        self.command(|e| {
            let locked = e.pieces_locked();
            e.hard_drop();
            e.pieces_locked() != locked
        })
    }

    /// Answer the active challenge; ignored in any other phase
    pub fn answer(&mut self, index: usize) {
        if self.phase != SessionPhase::ChallengeActive {
            return;
        }
        if let Some(resolution) = self.gate.answer(index, &mut self.clock) {
            self.resolve(resolution);
        }
    }

    /// Advance virtual time by `ms`, dispatching every timer that falls due
    pub fn advance(&mut self, ms: u64) {
        let until = self.clock.now_ms().saturating_add(ms);
        while let Some(fire) = self.clock.pop_due(until) {
            self.on_timer(fire);
        }
    }

    fn command(&mut self, f: impl FnOnce(&mut GridEngine) -> bool) -> bool {
        if self.phase != SessionPhase::Running {
            return false;
        }
        let changed = f(&mut self.engine);
        self.process_grid_events();
        changed
    }

    fn on_timer(&mut self, fire: TimerFire) {
        match fire.kind {
            TimerKind::Gravity => {
                if self.phase != SessionPhase::Running || self.gravity != Some(fire.handle) {
                    log::debug!("ignoring stale gravity fire {:?}", fire.handle);
                    return;
                }
                self.engine.tick();
                self.process_grid_events();
            }
            TimerKind::Countdown => {
                if self.phase != SessionPhase::ChallengeActive
                    || self.gate.countdown_handle() != Some(fire.handle)
                {
                    log::debug!("ignoring stale countdown fire {:?}", fire.handle);
                    return;
                }
                let resolution = self.gate.on_countdown(fire.handle, &mut self.clock);
                if let Some(challenge) = self.gate.challenge() {
                    self.events.push(SessionEvent::CountdownTick {
                        remaining_secs: challenge.remaining_secs,
                    });
                }
                if let Some(resolution) = resolution {
                    self.resolve(resolution);
                }
            }
        }
    }

    fn process_grid_events(&mut self) {
        let mut cleared = false;
        let mut game_over = None;

        for event in self.engine.drain_events() {
            match event {
                GridEvent::PointsAwarded { points, .. } => self.award(points),
                GridEvent::LinesCleared(count) => {
                    cleared = true;
                    self.add_lines(count);
                }
                GridEvent::GameOver(reason) => game_over = Some(reason),
                GridEvent::PieceLocked { .. } => {}
            }
        }

        if let Some(reason) = game_over {
            self.end(reason.into());
        } else if cleared {
            self.begin_challenge();
        }
    }

    fn award(&mut self, points: u64) {
        if points == 0 {
            return;
        }
        self.stats.score = self.stats.score.saturating_add(points);
        self.events.push(SessionEvent::PointsAwarded {
            points,
            total: self.stats.score,
        });
    }

    fn add_lines(&mut self, count: u32) {
        self.stats.lines += count;
        self.events.push(SessionEvent::LinesCleared {
            count,
            lines: self.stats.lines,
        });

        let level = level_for_lines(self.stats.lines);
        if level != self.stats.level {
            self.stats.level = level;
            self.engine.set_level(level);
            self.events.push(SessionEvent::LevelUp { level });
        }
    }

    fn begin_challenge(&mut self) {
        self.cancel_gravity();
        self.engine.suspend();
        self.phase = SessionPhase::ChallengeActive;

        let challenge = self.gate.activate(
            self.stats.questions_answered,
            &mut self.rng,
            &mut self.clock,
        );
        let (difficulty, budget_secs) = (challenge.difficulty, challenge.budget_secs);
        self.last_difficulty = Some(difficulty);
        self.events.push(SessionEvent::ChallengeStarted {
            difficulty,
            budget_secs,
        });
    }

    fn resolve(&mut self, resolution: Resolution) {
        self.stats.questions_answered += 1;
        self.events.push(SessionEvent::ChallengeResolved {
            outcome: resolution.outcome,
        });

        match resolution.outcome {
            ChallengeOutcome::Correct => {
                self.award(CORRECT_ANSWER_BONUS);
                self.gate.close();
                self.engine.resume();
                self.phase = SessionPhase::Running;
                self.schedule_gravity();
            }
            ChallengeOutcome::Incorrect => self.end(EndReason::WrongAnswer),
            ChallengeOutcome::TimedOut => self.end(EndReason::TimedOut),
            ChallengeOutcome::Pending => {}
        }
    }

    fn end(&mut self, reason: EndReason) {
        if self.phase == SessionPhase::Ended {
            return;
        }
        self.stop_timers();
        self.engine.halt();
        self.phase = SessionPhase::Ended;
        self.end_reason = Some(reason);
        log::info!(
            "session over ({}): score {}, lines {}, level {}",
            reason.message(),
            self.stats.score,
            self.stats.lines,
            self.stats.level
        );

        let receipt = self.submit();
        self.events.push(SessionEvent::Ended {
            reason,
            message: reason.message().to_string(),
            stats: self.stats,
            receipt,
        });
    }

    fn submit(&mut self) -> Option<SubmitReceipt> {
        if self.submitted {
            return None;
        }
        self.submitted = true;

        let record = ScoreRecord {
            player_id: self.player.id.clone(),
            name: self.player.name.clone(),
            score: self.stats.score,
            lines: self.stats.lines,
            level: self.stats.level,
            difficulty: self
                .last_difficulty
                .unwrap_or_else(|| Difficulty::for_answered(self.stats.questions_answered)),
        };
        match self.store.submit_score(record) {
            Ok(receipt) => {
                log::info!(
                    "score submitted (accepted: {}, new high: {})",
                    receipt.accepted,
                    receipt.is_new_high
                );
                Some(receipt)
            }
            Err(e) => {
                log::warn!("failed to save score: {e}");
                None
            }
        }
    }

    // --- Timers ---

    fn schedule_gravity(&mut self) {
        self.cancel_gravity();
        let interval = gravity_interval_ms(self.stats.level);
        self.gravity = Some(self.clock.schedule_repeating(TimerKind::Gravity, interval));
    }

    fn cancel_gravity(&mut self) {
        if let Some(handle) = self.gravity.take() {
            self.clock.cancel(handle);
        }
    }

    fn stop_timers(&mut self) {
        self.cancel_gravity();
        self.gate.teardown(&mut self.clock);
    }
}
