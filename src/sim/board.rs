//! The fixed-size well of locked cells

use serde::{Deserialize, Serialize};

use super::piece::{CellToken, Mask};
use crate::consts::{COLS, ROWS};

pub type Row = [Option<CellToken>; COLS];

const EMPTY_ROW: Row = [None; COLS];

/// `ROWS × COLS` grid, row 0 at the top
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: Vec<Row>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: vec![EMPTY_ROW; ROWS],
        }
    }

    pub fn reset(&mut self) {
        self.rows.clear();
        self.rows.resize(ROWS, EMPTY_ROW);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Cell contents, `None` outside the board or when empty
    pub fn get(&self, x: i32, y: i32) -> Option<CellToken> {
        if !Self::in_bounds(x, y) {
            return None;
        }
        self.rows[y as usize][x as usize]
    }

    /// Write a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: i32, y: i32, token: Option<CellToken>) {
        if Self::in_bounds(x, y) {
            self.rows[y as usize][x as usize] = token;
        }
    }

    pub fn in_bounds(x: i32, y: i32) -> bool {
        (0..COLS as i32).contains(&x) && (0..ROWS as i32).contains(&y)
    }

    /// Whether `mask` placed with its top-left at `(ox, oy)` collides.
    ///
    /// Cells above the board (row < 0) only collide with the side walls; they
    /// are never checked against board contents.
    pub fn collides(&self, mask: &Mask, ox: i32, oy: i32) -> bool {
        mask.occupied().any(|(r, c)| {
            let x = ox + c as i32;
            let y = oy + r as i32;
            if x < 0 || x >= COLS as i32 || y >= ROWS as i32 {
                return true;
            }
            y >= 0 && self.rows[y as usize][x as usize].is_some()
        })
    }

    pub fn row_is_full(&self, y: usize) -> bool {
        self.rows[y].iter().all(Option::is_some)
    }

    /// Remove every full row, shifting the rows above down and inserting
    /// empty rows at the top. Returns the number of rows removed.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut cleared = 0;
        let mut y = self.rows.len();
        while y > 0 {
            if self.row_is_full(y - 1) {
                self.rows.remove(y - 1);
                self.rows.insert(0, EMPTY_ROW);
                cleared += 1;
                // The row that slid into y - 1 is examined next
            } else {
                y -= 1;
            }
        }
        cleared
    }

    pub fn filled_cells(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().filter(|c| c.is_some()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_cells() == 0
    }
}
