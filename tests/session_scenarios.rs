//! End-to-end session scenarios driven through the public command surface

use std::cell::Cell;
use std::rc::Rc;

use trivia_blocks::clock::{Scheduler, TimerFire, TimerHandle, TimerKind, VirtualClock};
use trivia_blocks::consts::ROWS;
use trivia_blocks::highscores::{ScoreRecord, ScoreStore, StoreError, SubmitReceipt};
use trivia_blocks::quiz::{ChallengeOutcome, Difficulty};
use trivia_blocks::session::{EndReason, Player, SessionConfig, SessionEvent};
use trivia_blocks::sim::{CellToken, ScriptedShapes, Shape};
use trivia_blocks::{SessionController, SessionPhase};

/// Store that counts submissions and keeps the last record
#[derive(Default, Clone)]
struct CountingStore {
    calls: Rc<Cell<u32>>,
    last: Rc<std::cell::RefCell<Option<ScoreRecord>>>,
    fail: bool,
}

impl ScoreStore for CountingStore {
    fn submit_score(&mut self, record: ScoreRecord) -> Result<SubmitReceipt, StoreError> {
        self.calls.set(self.calls.get() + 1);
        *self.last.borrow_mut() = Some(record);
        if self.fail {
            return Err(StoreError::Unavailable("offline".into()));
        }
        Ok(SubmitReceipt {
            accepted: true,
            is_new_high: true,
        })
    }

    fn top_scores(&self, _n: usize) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.last.borrow().iter().cloned().collect())
    }
}

/// Scheduler whose `cancel` is ignored, so cancelled timers keep firing.
/// The controller must drop those fires on its own.
#[derive(Default)]
struct LeakyClock {
    inner: VirtualClock,
}

impl Scheduler for LeakyClock {
    fn now_ms(&self) -> u64 {
        self.inner.now_ms()
    }

    fn schedule_repeating(&mut self, kind: TimerKind, interval_ms: u64) -> TimerHandle {
        self.inner.schedule_repeating(kind, interval_ms)
    }

    fn cancel(&mut self, _handle: TimerHandle) {}

    fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.inner.is_scheduled(handle)
    }

    fn pop_due(&mut self, until_ms: u64) -> Option<TimerFire> {
        self.inner.pop_due(until_ms)
    }
}

fn config() -> SessionConfig {
    SessionConfig::new(Player::new("p1", "Player One"), 2024)
}

fn i_session<S: Scheduler>(clock: S, store: CountingStore) -> SessionController<S, CountingStore> {
    SessionController::with_shapes(
        clock,
        store,
        config(),
        Box::new(ScriptedShapes::repeat(Shape::I)),
    )
}

/// Soft-drop the current piece until it locks
fn soft_drop_to_lock<S: Scheduler, T: ScoreStore>(s: &mut SessionController<S, T>) {
    let locked = s.engine().pieces_locked();
    for _ in 0..=ROWS {
        s.soft_drop();
        if s.engine().pieces_locked() != locked {
            return;
        }
    }
    panic!("piece never locked");
}

/// Bottom row filled except the four spawn columns of a horizontal I
fn prime_single_clear<S: Scheduler, T: ScoreStore>(s: &mut SessionController<S, T>) {
    let bottom = ROWS as i32 - 1;
    for x in [0, 1, 2, 7, 8, 9] {
        s.engine_mut().board_mut().set(x, bottom, Some(CellToken::Cyan));
    }
}

fn correct_index<S: Scheduler, T: ScoreStore>(s: &SessionController<S, T>) -> usize {
    s.challenge().expect("challenge active").question.correct_index
}

#[test]
fn four_i_pieces_fill_a_row_and_open_an_easy_challenge() {
    let mut s = i_session(VirtualClock::new(), CountingStore::default());
    s.start_session();

    // Two flat pieces across columns 0-7
    for _ in 0..3 {
        assert!(s.move_left());
    }
    soft_drop_to_lock(&mut s);
    assert!(s.move_right());
    soft_drop_to_lock(&mut s);

    // Two upright pieces in columns 8 and 9
    assert!(s.rotate());
    for _ in 0..5 {
        assert!(s.move_right());
    }
    soft_drop_to_lock(&mut s);
    assert!(s.rotate());
    for _ in 0..6 {
        assert!(s.move_right());
    }
    soft_drop_to_lock(&mut s);

    let clears: Vec<_> = s
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::LinesCleared { .. }))
        .collect();
    assert_eq!(clears, vec![SessionEvent::LinesCleared { count: 1, lines: 1 }]);

    let stats = *s.stats();
    assert_eq!(stats.lines, 1);
    assert_eq!(stats.level, 1);
    assert_eq!(stats.score, 100);

    assert_eq!(s.phase(), SessionPhase::ChallengeActive);
    assert!(!s.is_gravity_active());
    assert!(s.is_countdown_active());
    assert_eq!(s.challenge().unwrap().difficulty, Difficulty::Easy);
    assert_eq!(s.challenge().unwrap().remaining_secs, 10);

    // The upright pieces' remaining cells shifted down one row
    let board = s.engine().board();
    assert_eq!(board.filled_cells(), 6);
    assert_eq!(board.get(8, ROWS as i32 - 1), Some(CellToken::Cyan));
    assert_eq!(board.get(8, ROWS as i32 - 4), None);
}

#[test]
fn six_correct_answers_escalate_to_hard() {
    let mut s = i_session(VirtualClock::new(), CountingStore::default());
    s.start_session();

    let mut tiers = Vec::new();
    for _ in 0..7 {
        prime_single_clear(&mut s);
        s.hard_drop();
        assert_eq!(s.phase(), SessionPhase::ChallengeActive);
        tiers.push(s.challenge().unwrap().difficulty);
        let answer = correct_index(&s);
        s.answer(answer);
    }

    assert_eq!(
        tiers,
        vec![
            Difficulty::Easy,
            Difficulty::Easy,
            Difficulty::Easy,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Hard,
        ]
    );
    assert_eq!(s.stats().questions_answered, 7);
    assert_eq!(s.phase(), SessionPhase::Running);
}

#[test]
fn countdown_expiry_ends_session_with_one_submission() {
    let store = CountingStore::default();
    let mut s = i_session(VirtualClock::new(), store.clone());
    s.start_session();
    prime_single_clear(&mut s);
    s.hard_drop();
    let correct = correct_index(&s);

    s.advance(9_999);
    assert_eq!(s.phase(), SessionPhase::ChallengeActive);
    assert_eq!(store.calls.get(), 0);

    s.advance(1);
    assert_eq!(s.phase(), SessionPhase::Ended);
    assert_eq!(s.end_reason(), Some(EndReason::TimedOut));
    assert_eq!(
        s.challenge().unwrap().outcome,
        ChallengeOutcome::TimedOut
    );
    assert_eq!(store.calls.get(), 1);

    let events = s.drain_events();
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Ended { reason: EndReason::TimedOut, message, .. })
            if message == "You ran out of time!"
    ));

    // Late answer and further time change nothing
    s.answer(correct);
    s.advance(60_000);
    assert_eq!(s.end_reason(), Some(EndReason::TimedOut));
    assert_eq!(s.stats().questions_answered, 1);
    assert_eq!(store.calls.get(), 1);
    assert!(s.drain_events().is_empty());

    let record = store.last.borrow().clone().unwrap();
    assert_eq!(record.player_id, "p1");
    assert_eq!(record.score, s.stats().score);
    assert_eq!(record.difficulty, Difficulty::Easy);
}

#[test]
fn store_failure_still_terminates() {
    let store = CountingStore {
        fail: true,
        ..Default::default()
    };
    let mut s = i_session(VirtualClock::new(), store.clone());
    s.start_session();
    prime_single_clear(&mut s);
    s.hard_drop();
    let wrong = (correct_index(&s) + 1) % 4;
    s.answer(wrong);

    assert_eq!(s.phase(), SessionPhase::Ended);
    assert_eq!(store.calls.get(), 1);
    assert!(matches!(
        s.drain_events().last(),
        Some(SessionEvent::Ended { receipt: None, .. })
    ));
}

#[test]
fn answering_cancels_the_countdown() {
    let mut s = i_session(VirtualClock::new(), CountingStore::default());
    s.start_session();
    prime_single_clear(&mut s);
    s.hard_drop();
    s.advance(9_000);
    let answer = correct_index(&s);
    s.answer(answer);

    // Well past the first deadline
    s.advance(5_000);
    assert_eq!(s.phase(), SessionPhase::Running);
    assert!(s.end_reason().is_none());
    assert!(!s.is_countdown_active());
    assert_eq!(s.clock().active_timers(), 1);
}

#[test]
fn cancelled_timers_that_still_fire_are_ignored() {
    let store = CountingStore::default();
    let mut s = i_session(LeakyClock::default(), store.clone());
    s.start_session();
    prime_single_clear(&mut s);
    s.hard_drop();

    // Old gravity keeps firing during the challenge
    let y = s.engine().current().y;
    s.advance(3_000);
    assert_eq!(s.engine().current().y, y);
    assert_eq!(s.challenge().unwrap().remaining_secs, 7);

    let answer = correct_index(&s);
    s.answer(answer);
    assert_eq!(s.phase(), SessionPhase::Running);

    // Only the new gravity timer moves the piece; the dead countdown and the
    // old gravity timer are dropped
    s.advance(500);
    assert_eq!(s.engine().current().y, 1);
    s.advance(1_000);
    assert_eq!(s.engine().current().y, 3);
    assert_eq!(s.phase(), SessionPhase::Running);
    assert_eq!(store.calls.get(), 0);
}

#[test]
fn stray_fires_after_game_over_do_not_resubmit() {
    let store = CountingStore::default();
    let mut s = i_session(LeakyClock::default(), store.clone());
    s.start_session();
    prime_single_clear(&mut s);
    s.hard_drop();
    s.advance(10_000);
    assert_eq!(s.end_reason(), Some(EndReason::TimedOut));

    s.advance(120_000);
    assert_eq!(store.calls.get(), 1);
    assert_eq!(s.phase(), SessionPhase::Ended);
}

#[test]
fn input_while_suspended_is_accepted_and_ignored() {
    let mut s = i_session(VirtualClock::new(), CountingStore::default());
    s.start_session();
    prime_single_clear(&mut s);
    s.hard_drop();

    let before = s.snapshot();
    assert!(!s.move_left());
    assert!(!s.move_right());
    assert!(!s.rotate());
    assert!(!s.soft_drop());
    assert!(!s.hard_drop());
    assert_eq!(s.snapshot(), before);
}

#[test]
fn gravity_alone_tops_out_the_board() {
    let store = CountingStore::default();
    let mut s = SessionController::with_shapes(
        VirtualClock::new(),
        store.clone(),
        config(),
        Box::new(ScriptedShapes::repeat(Shape::O)),
    );
    s.start_session();

    // O pieces stack in columns 4-5 and never complete a row
    s.advance(10 * 60 * 1000);
    assert_eq!(s.phase(), SessionPhase::Ended);
    assert_eq!(s.end_reason(), Some(EndReason::NoSpace));
    assert_eq!(s.stats().score, 0);
    assert_eq!(s.clock().active_timers(), 0);
    assert_eq!(store.calls.get(), 1);

    let record = store.last.borrow().clone().unwrap();
    assert_eq!(record.difficulty, Difficulty::Easy);
    assert_eq!(record.level, 1);
}
