//! Piece shapes, rotation-aware masks and the falling piece

use serde::{Deserialize, Serialize};

use crate::consts::COLS;

/// Opaque color token stored in board cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellToken {
    Cyan,
    Blue,
    Orange,
    Yellow,
    Green,
    Purple,
    Pink,
}

impl CellToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellToken::Cyan => "cyan",
            CellToken::Blue => "blue",
            CellToken::Orange => "orange",
            CellToken::Yellow => "yellow",
            CellToken::Green => "green",
            CellToken::Purple => "purple",
            CellToken::Pink => "pink",
        }
    }
}

/// The seven fixed shape variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    I,
    J,
    L,
    O,
    S,
    /// Upright zig: `[[1,0],[1,1],[0,1]]`
    Zig,
    T,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::I,
        Shape::J,
        Shape::L,
        Shape::O,
        Shape::S,
        Shape::Zig,
        Shape::T,
    ];

    /// Spawn orientation, top row first
    fn rows(self) -> &'static [&'static [u8]] {
        match self {
            Shape::I => &[&[1, 1, 1, 1]],
            Shape::J => &[&[1, 0, 0], &[1, 1, 1]],
            Shape::L => &[&[0, 0, 1], &[1, 1, 1]],
            Shape::O => &[&[1, 1], &[1, 1]],
            Shape::S => &[&[0, 1, 1], &[1, 1, 0]],
            Shape::Zig => &[&[1, 0], &[1, 1], &[0, 1]],
            Shape::T => &[&[0, 1, 0], &[1, 1, 1]],
        }
    }

    pub fn color(self) -> CellToken {
        match self {
            Shape::I => CellToken::Cyan,
            Shape::J => CellToken::Blue,
            Shape::L => CellToken::Orange,
            Shape::O => CellToken::Yellow,
            Shape::S => CellToken::Green,
            Shape::Zig => CellToken::Purple,
            Shape::T => CellToken::Pink,
        }
    }

    pub fn mask(self) -> Mask {
        Mask::from_rows(self.rows())
    }
}

/// Rectangular grid of occupied/empty cells
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mask {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Mask {
    /// Build from rows of 0/1; rows must share a length
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        debug_assert!(rows.iter().all(|r| r.len() == cols), "ragged mask");
        let cells = rows
            .iter()
            .flat_map(|r| r.iter().map(|&c| c != 0))
            .collect();
        Self {
            rows: rows.len(),
            cols,
            cells,
        }
    }

    pub fn height(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    /// Occupied cells as `(row, col)` within the mask
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.rows).flat_map(move |r| {
            (0..self.cols).filter_map(move |c| self.get(r, c).then_some((r, c)))
        })
    }

    /// Rotate 90° clockwise: an `R×C` mask becomes `C×R`
    pub fn rotated(&self) -> Mask {
        let (r_len, c_len) = (self.rows, self.cols);
        let mut cells = vec![false; r_len * c_len];
        for r in 0..r_len {
            for c in 0..c_len {
                // rot[c][R-1-r] = mask[r][c], rotated mask has R columns
                cells[c * r_len + (r_len - 1 - r)] = self.get(r, c);
            }
        }
        Mask {
            rows: c_len,
            cols: r_len,
            cells,
        }
    }

    /// Rows as nested bools, for snapshots
    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        (0..self.rows)
            .map(|r| (0..self.cols).map(|c| self.get(r, c)).collect())
            .collect()
    }
}

/// A live piece: shape identity, current orientation and anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub shape: Shape,
    pub mask: Mask,
    /// Anchor column of the mask's left edge
    pub x: i32,
    /// Anchor row of the mask's top edge
    pub y: i32,
}

impl Piece {
    /// New piece at the spawn anchor, horizontally centered on the top row
    pub fn spawn(shape: Shape) -> Self {
        let mask = shape.mask();
        let x = (COLS / 2) as i32 - (mask.width() / 2) as i32;
        Self {
            shape,
            mask,
            x,
            y: 0,
        }
    }

    pub fn color(&self) -> CellToken {
        self.shape.color()
    }

    /// Occupied cells in board coordinates `(x, y)`
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.mask
            .occupied()
            .map(|(r, c)| (self.x + c as i32, self.y + r as i32))
    }
}
