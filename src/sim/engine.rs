//! Grid engine: the falling-piece simulation
//!
//! Owns the board, the current and next pieces, and every rule that mutates
//! them. Scoring side effects are reported as [`GridEvent`]s for the session
//! controller to consume; the engine never blocks or schedules anything.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::board::Board;
use super::piece::{CellToken, Piece, Shape};
use crate::consts::*;

/// Supplies the shape of each newly generated piece
pub trait ShapeSource {
    fn next_shape(&mut self) -> Shape;
}

/// Uniformly random shapes from a seeded RNG
#[derive(Debug, Clone)]
pub struct RandomShapes {
    rng: Pcg32,
}

impl RandomShapes {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }
}

impl ShapeSource for RandomShapes {
    fn next_shape(&mut self) -> Shape {
        Shape::ALL[self.rng.random_range(0..Shape::ALL.len())]
    }
}

/// A fixed shape sequence that repeats once exhausted (replays and tests)
#[derive(Debug, Clone)]
pub struct ScriptedShapes {
    script: Vec<Shape>,
    queue: VecDeque<Shape>,
}

impl ScriptedShapes {
    pub fn new(script: impl Into<Vec<Shape>>) -> Self {
        let mut script = script.into();
        if script.is_empty() {
            script.push(Shape::I);
        }
        Self {
            queue: script.iter().copied().collect(),
            script,
        }
    }

    /// Always the same shape
    pub fn repeat(shape: Shape) -> Self {
        Self::new(vec![shape])
    }
}

impl ShapeSource for ScriptedShapes {
    fn next_shape(&mut self) -> Shape {
        if self.queue.is_empty() {
            self.queue.extend(self.script.iter().copied());
        }
        self.queue.pop_front().unwrap_or(Shape::I)
    }
}

/// Horizontal movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    fn dx(self) -> i32 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

/// Why the grid can no longer continue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    /// A locked piece had cells above the visible board
    BoardFull,
    /// The next piece collides at its spawn position
    NoSpace,
}

impl GameOverReason {
    pub fn message(&self) -> &'static str {
        match self {
            GameOverReason::BoardFull => "You filled the board!",
            GameOverReason::NoSpace => "No more space!",
        }
    }
}

/// Where awarded points came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsSource {
    HardDrop,
    LineClear,
}

/// Things that happened inside the grid, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridEvent {
    PointsAwarded { points: u64, source: PointsSource },
    PieceLocked { shape: Shape, cleared: u32 },
    LinesCleared(u32),
    GameOver(GameOverReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum RunState {
    Running,
    Suspended,
    Halted,
}

/// What a single snapshot cell shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "color", rename_all = "lowercase")]
pub enum SnapshotCell {
    Empty,
    Ghost,
    Active(CellToken),
    Locked(CellToken),
}

/// Read-only view handed to the rendering collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub cols: usize,
    pub rows: usize,
    /// Row-major, row 0 at the top
    pub cells: Vec<Vec<SnapshotCell>>,
    pub next_shape: Shape,
    pub next_color: CellToken,
    pub next_mask: Vec<Vec<bool>>,
}

pub struct GridEngine {
    board: Board,
    current: Piece,
    next: Piece,
    run_state: RunState,
    game_over: Option<GameOverReason>,
    level: u32,
    pieces_locked: u64,
    source: Box<dyn ShapeSource>,
    events: Vec<GridEvent>,
}

impl std::fmt::Debug for GridEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridEngine")
            .field("current", &self.current)
            .field("next", &self.next.shape)
            .field("run_state", &self.run_state)
            .field("game_over", &self.game_over)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl GridEngine {
    /// A fresh engine with an empty board and the first two pieces drawn
    pub fn new(mut source: Box<dyn ShapeSource>) -> Self {
        let current = Piece::spawn(source.next_shape());
        let next = Piece::spawn(source.next_shape());
        Self {
            board: Board::new(),
            current,
            next,
            run_state: RunState::Running,
            game_over: None,
            level: 1,
            pieces_locked: 0,
            source,
            events: Vec::new(),
        }
    }

    /// Empty the board, draw two new pieces and resume at level 1
    pub fn reset(&mut self) {
        self.board.reset();
        self.current = self.spawn();
        self.next = self.spawn();
        self.run_state = RunState::Running;
        self.game_over = None;
        self.level = 1;
        self.pieces_locked = 0;
        self.events.clear();
    }

    fn spawn(&mut self) -> Piece {
        Piece::spawn(self.source.next_shape())
    }

    // --- Accessors ---

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct board access for setting up positions
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn current(&self) -> &Piece {
        &self.current
    }

    pub fn next(&self) -> &Piece {
        &self.next
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Level used for clear scoring; the gravity interval is the caller's concern
    pub fn set_level(&mut self, level: u32) {
        self.level = level.max(1);
    }

    pub fn pieces_locked(&self) -> u64 {
        self.pieces_locked
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.game_over
    }

    pub fn is_suspended(&self) -> bool {
        self.run_state == RunState::Suspended
    }

    pub fn is_halted(&self) -> bool {
        self.run_state == RunState::Halted
    }

    fn is_live(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Stop accepting ticks and commands until [`resume`](Self::resume)
    pub fn suspend(&mut self) {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Suspended;
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Suspended {
            self.run_state = RunState::Running;
        }
    }

    /// Permanently stop this game (until reset)
    pub fn halt(&mut self) {
        self.run_state = RunState::Halted;
    }

    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Commands ---

    /// Gravity step: move down one row, locking when blocked
    pub fn tick(&mut self) {
        if !self.is_live() {
            return;
        }
        self.step_down();
    }

    /// One manual downward step, same rules as gravity.
    /// Returns whether the piece moved; false when it locked or was ignored.
    pub fn soft_drop(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.step_down()
    }

    /// Returns whether the piece moved
    pub fn move_piece(&mut self, dir: Direction) -> bool {
        if !self.is_live() {
            return false;
        }
        let x = self.current.x + dir.dx();
        if self.board.collides(&self.current.mask, x, self.current.y) {
            return false;
        }
        self.current.x = x;
        true
    }

    /// Rotate clockwise with a one-column wall kick either way.
    /// Returns whether a rotation was applied.
    pub fn rotate(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        let rotated = self.current.mask.rotated();
        let y = self.current.y;
        let kick = [0, -1, 1]
            .into_iter()
            .map(|dx| self.current.x + dx)
            .find(|&x| !self.board.collides(&rotated, x, y));

        match kick {
            Some(x) => {
                self.current.mask = rotated;
                self.current.x = x;
                true
            }
            None => false,
        }
    }

    /// Drop to the resting row, award two points per row and lock.
    /// Returns the distance fallen.
    pub fn hard_drop(&mut self) -> u32 {
        if !self.is_live() {
            return 0;
        }
        let distance = self.drop_distance();
        let points = u64::from(distance) * HARD_DROP_POINTS_PER_ROW;
        if points > 0 {
            self.events.push(GridEvent::PointsAwarded {
                points,
                source: PointsSource::HardDrop,
            });
        }
        self.current.y += distance as i32;
        self.lock();
        distance
    }

    /// Rows the current piece can fall before colliding
    pub fn drop_distance(&self) -> u32 {
        let p = &self.current;
        let mut d = 0;
        while !self.board.collides(&p.mask, p.x, p.y + d as i32 + 1) {
            d += 1;
        }
        d
    }

    /// Anchor row where the current piece would come to rest
    pub fn ghost_y(&self) -> i32 {
        self.current.y + self.drop_distance() as i32
    }

    fn step_down(&mut self) -> bool {
        let p = &self.current;
        if self.board.collides(&p.mask, p.x, p.y + 1) {
            self.lock();
            false
        } else {
            self.current.y += 1;
            true
        }
    }

    /// Commit the current piece to the board, clear lines and promote `next`
    fn lock(&mut self) {
        let color = self.current.color();
        let mut overflow = false;
        for (x, y) in self.current.cells() {
            if y < 0 {
                overflow = true;
            } else {
                self.board.set(x, y, Some(color));
            }
        }
        self.pieces_locked += 1;

        if overflow {
            self.events.push(GridEvent::PieceLocked {
                shape: self.current.shape,
                cleared: 0,
            });
            self.end(GameOverReason::BoardFull);
            return;
        }

        let cleared = self.board.clear_full_rows() as u32;
        log::debug!(
            "locked {:?} at ({}, {}), cleared {}",
            self.current.shape,
            self.current.x,
            self.current.y,
            cleared
        );
        self.events.push(GridEvent::PieceLocked {
            shape: self.current.shape,
            cleared,
        });
        if cleared > 0 {
            let points = clear_points(cleared, self.level);
            self.events.push(GridEvent::PointsAwarded {
                points,
                source: PointsSource::LineClear,
            });
            self.events.push(GridEvent::LinesCleared(cleared));
        }

        let fresh = self.spawn();
        self.current = std::mem::replace(&mut self.next, fresh);
        if self
            .board
            .collides(&self.current.mask, self.current.x, self.current.y)
        {
            self.end(GameOverReason::NoSpace);
        }
    }

    fn end(&mut self, reason: GameOverReason) {
        log::info!("grid over: {}", reason.message());
        self.game_over = Some(reason);
        self.run_state = RunState::Halted;
        self.events.push(GridEvent::GameOver(reason));
    }

    /// Board with the ghost and the current piece overlaid
    pub fn snapshot(&self, show_ghost: bool) -> GridSnapshot {
        let mut cells: Vec<Vec<SnapshotCell>> = self
            .board
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| c.map_or(SnapshotCell::Empty, SnapshotCell::Locked))
                    .collect()
            })
            .collect();

        let in_view = |x: i32, y: i32| Board::in_bounds(x, y);

        if show_ghost && !self.is_halted() {
            let dy = self.drop_distance() as i32;
            for (x, y) in self.current.cells() {
                let y = y + dy;
                if in_view(x, y) && cells[y as usize][x as usize] == SnapshotCell::Empty {
                    cells[y as usize][x as usize] = SnapshotCell::Ghost;
                }
            }
        }

        let color = self.current.color();
        for (x, y) in self.current.cells() {
            if in_view(x, y) && !self.is_halted() {
                cells[y as usize][x as usize] = SnapshotCell::Active(color);
            }
        }

        GridSnapshot {
            cols: COLS,
            rows: ROWS,
            cells,
            next_shape: self.next.shape,
            next_color: self.next.color(),
            next_mask: self.next.mask.to_rows(),
        }
    }
}

/// Points for clearing `cleared` rows at `level`
pub fn clear_points(cleared: u32, level: u32) -> u64 {
    debug_assert!(cleared <= 4, "no shape can clear {cleared} rows at once");
    let base = LINE_CLEAR_POINTS
        .get(cleared as usize)
        .copied()
        .unwrap_or(0);
    base * u64::from(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(shapes: Vec<Shape>) -> GridEngine {
        GridEngine::new(Box::new(ScriptedShapes::new(shapes)))
    }

    fn fill_row_except(engine: &mut GridEngine, y: i32, gaps: &[i32]) {
        for x in 0..COLS as i32 {
            if !gaps.contains(&x) {
                engine.board_mut().set(x, y, Some(CellToken::Blue));
            }
        }
    }

    #[test]
    fn test_tick_moves_down_then_locks() {
        let mut engine = engine_with(vec![Shape::O]);
        for _ in 0..ROWS - 2 {
            engine.tick();
        }
        assert_eq!(engine.current().y, ROWS as i32 - 2);
        assert_eq!(engine.pieces_locked(), 0);

        engine.tick();
        assert_eq!(engine.pieces_locked(), 1);
        assert_eq!(engine.board().filled_cells(), 4);
        assert_eq!(engine.current().y, 0);
    }

    #[test]
    fn test_move_blocked_by_wall_is_ignored() {
        let mut engine = engine_with(vec![Shape::O]);
        for _ in 0..4 {
            assert!(engine.move_piece(Direction::Left));
        }
        assert_eq!(engine.current().x, 0);
        assert!(!engine.move_piece(Direction::Left));
        assert_eq!(engine.current().x, 0);
    }

    #[test]
    fn test_move_blocked_by_stack_is_ignored() {
        let mut engine = engine_with(vec![Shape::O]);
        engine.board_mut().set(6, 1, Some(CellToken::Green));
        assert!(!engine.move_piece(Direction::Right));
        assert_eq!(engine.current().x, 4);
    }

    #[test]
    fn test_rotate_applies_in_place() {
        let mut engine = engine_with(vec![Shape::T]);
        engine.tick();
        assert!(engine.rotate());
        assert_eq!(engine.current().mask.height(), 3);
        assert_eq!(engine.current().x, 4);
    }

    #[test]
    fn test_rotate_kicks_off_right_wall() {
        let mut engine = engine_with(vec![Shape::I]);
        engine.rotate();
        // Vertical I against the right wall
        while engine.move_piece(Direction::Right) {}
        assert_eq!(engine.current().x, COLS as i32 - 1);
        for _ in 0..2 {
            engine.tick();
        }

        // Horizontal I fits nowhere at x, x-1 or x+1
        assert!(!engine.rotate());

        // An L at the wall kicks one column left
        let mut engine = engine_with(vec![Shape::L]);
        engine.rotate();
        while engine.move_piece(Direction::Right) {}
        let x = engine.current().x;
        assert_eq!(x, COLS as i32 - 2);
        assert!(engine.rotate());
        assert_eq!(engine.current().x, x - 1);
    }

    #[test]
    fn test_rotate_fails_when_all_kicks_collide() {
        let mut engine = engine_with(vec![Shape::I]);
        for _ in 0..5 {
            engine.tick();
        }
        // Wall off every column the vertical I could occupy
        for y in 6..10 {
            for x in 2..=6 {
                engine.board_mut().set(x, y, Some(CellToken::Orange));
            }
        }
        let before = engine.current().clone();
        assert!(!engine.rotate());
        assert_eq!(engine.current(), &before);
    }

    #[test]
    fn test_hard_drop_awards_distance_and_locks() {
        let mut engine = engine_with(vec![Shape::O]);
        let d = engine.hard_drop();
        assert_eq!(d, ROWS as u32 - 2);
        let events = engine.drain_events();
        assert_eq!(
            events[0],
            GridEvent::PointsAwarded {
                points: 2 * d as u64,
                source: PointsSource::HardDrop
            }
        );
        assert!(matches!(events[1], GridEvent::PieceLocked { shape: Shape::O, cleared: 0 }));
        assert_eq!(engine.board().get(4, ROWS as i32 - 1), Some(CellToken::Yellow));
    }

    #[test]
    fn test_hard_drop_matches_repeated_soft_drop() {
        let script = vec![Shape::S, Shape::J, Shape::T];
        let mut hard = engine_with(script.clone());
        let mut soft = engine_with(script);
        for engine in [&mut hard, &mut soft] {
            engine.board_mut().set(5, 15, Some(CellToken::Cyan));
            engine.board_mut().set(2, 17, Some(CellToken::Cyan));
        }

        hard.hard_drop();
        while soft.pieces_locked() == 0 {
            soft.soft_drop();
        }
        assert_eq!(hard.board(), soft.board());
    }

    #[test]
    fn test_line_clear_scores_by_level() {
        let mut engine = engine_with(vec![Shape::I]);
        engine.set_level(3);
        let bottom = ROWS as i32 - 1;
        fill_row_except(&mut engine, bottom, &[3, 4, 5, 6]);

        engine.hard_drop();
        let events = engine.drain_events();
        assert!(events.contains(&GridEvent::PointsAwarded {
            points: 300,
            source: PointsSource::LineClear
        }));
        assert!(events.contains(&GridEvent::LinesCleared(1)));
        assert!(engine.board().is_empty());
    }

    #[test]
    fn test_tetris_clear_scores_800() {
        let mut engine = engine_with(vec![Shape::I]);
        engine.rotate();
        while engine.move_piece(Direction::Left) {}
        for y in ROWS as i32 - 4..ROWS as i32 {
            fill_row_except(&mut engine, y, &[0]);
        }
        engine.hard_drop();
        let events = engine.drain_events();
        assert!(events.contains(&GridEvent::LinesCleared(4)));
        assert!(events.contains(&GridEvent::PointsAwarded {
            points: 800,
            source: PointsSource::LineClear
        }));
    }

    #[test]
    fn test_clear_points_table() {
        assert_eq!(clear_points(0, 5), 0);
        assert_eq!(clear_points(1, 1), 100);
        assert_eq!(clear_points(2, 2), 600);
        assert_eq!(clear_points(3, 1), 500);
        assert_eq!(clear_points(4, 3), 2400);
    }

    #[test]
    fn test_spawn_collision_ends_game() {
        let mut engine = engine_with(vec![Shape::O]);
        // Stack reaching the spawn rows, with a gap so nothing clears
        for y in 1..ROWS as i32 {
            fill_row_except(&mut engine, y, &[0]);
        }
        engine.board_mut().set(4, 1, None);
        engine.board_mut().set(5, 1, None);
        engine.board_mut().set(4, 2, Some(CellToken::Blue));

        // O at rows 0-1 cannot fall; lock, then the next O collides at spawn
        engine.tick();
        let events = engine.drain_events();
        assert_eq!(events.last(), Some(&GridEvent::GameOver(GameOverReason::NoSpace)));
        assert!(engine.is_halted());

        // Commands are ignored once halted
        let board = engine.board().clone();
        engine.tick();
        engine.hard_drop();
        assert!(!engine.move_piece(Direction::Left));
        assert_eq!(engine.board(), &board);
    }

    #[test]
    fn test_lock_above_board_is_overflow() {
        let mut engine = engine_with(vec![Shape::Zig]);
        // Zig cells at (4,-1) (4,0) (5,0) (5,1); blocked from below by (4,1)
        engine.current.y = -1;
        engine.board_mut().set(4, 1, Some(CellToken::Cyan));
        engine.tick();
        let events = engine.drain_events();
        assert_eq!(events.last(), Some(&GridEvent::GameOver(GameOverReason::BoardFull)));
        assert_eq!(engine.game_over_reason(), Some(GameOverReason::BoardFull));
    }

    #[test]
    fn test_suspended_engine_ignores_input() {
        let mut engine = engine_with(vec![Shape::T]);
        engine.suspend();
        let before = engine.current().clone();
        engine.tick();
        engine.soft_drop();
        assert!(!engine.rotate());
        assert!(!engine.move_piece(Direction::Right));
        assert_eq!(engine.hard_drop(), 0);
        assert_eq!(engine.current(), &before);
        assert!(engine.drain_events().is_empty());

        engine.resume();
        engine.tick();
        assert_eq!(engine.current().y, 1);
    }

    #[test]
    fn test_ghost_projection_is_read_only() {
        let mut engine = engine_with(vec![Shape::O]);
        engine.board_mut().set(4, 10, Some(CellToken::Pink));
        let before = engine.current().clone();
        assert_eq!(engine.ghost_y(), 8);
        assert_eq!(engine.current(), &before);

        let snap = engine.snapshot(true);
        assert_eq!(snap.cells[8][4], SnapshotCell::Ghost);
        assert_eq!(snap.cells[9][5], SnapshotCell::Ghost);
        assert_eq!(snap.cells[0][4], SnapshotCell::Active(CellToken::Yellow));
        assert_eq!(snap.cells[10][4], SnapshotCell::Locked(CellToken::Pink));

        let plain = engine.snapshot(false);
        assert!(plain.cells.iter().flatten().all(|c| *c != SnapshotCell::Ghost));
    }

    #[test]
    fn test_next_promoted_on_lock() {
        let mut engine = engine_with(vec![Shape::O, Shape::T, Shape::L]);
        assert_eq!(engine.current().shape, Shape::O);
        assert_eq!(engine.next().shape, Shape::T);
        engine.hard_drop();
        assert_eq!(engine.current().shape, Shape::T);
        assert_eq!(engine.next().shape, Shape::L);
        assert_eq!(engine.snapshot(false).next_shape, Shape::L);
    }

    #[test]
    fn test_random_shapes_are_seeded() {
        let mut a = RandomShapes::new(42);
        let mut b = RandomShapes::new(42);
        let sa: Vec<_> = (0..20).map(|_| a.next_shape()).collect();
        let sb: Vec<_> = (0..20).map(|_| b.next_shape()).collect();
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_soft_drop_reports_movement() {
        let mut engine = engine_with(vec![Shape::O, Shape::T]);
        assert!(engine.soft_drop());
        engine.board_mut().set(4, 3, Some(CellToken::Cyan));
        assert!(!engine.soft_drop());
        assert_eq!(engine.pieces_locked(), 1);
        assert_eq!(engine.current().shape, Shape::T);

        engine.suspend();
        assert!(!engine.soft_drop());
    }
}
