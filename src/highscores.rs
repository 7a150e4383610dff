//! Score store collaborator and the local leaderboard
//!
//! The session controller only sees the [`ScoreStore`] trait. [`Leaderboard`]
//! is the local implementation: one entry per player holding that player's
//! best run, persisted to a JSON file natively and to LocalStorage on web.

use std::collections::BTreeMap;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quiz::Difficulty;

/// Maximum number of leaderboard entries to keep
pub const MAX_LEADERBOARD_ENTRIES: usize = 100;

/// A finished run as reported to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub player_id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    pub score: u64,
    pub lines: u32,
    pub level: u32,
    pub difficulty: Difficulty,
}

/// Store reply to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub accepted: bool,
    pub is_new_high: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("score record has no player id")]
    MissingPlayer,
    #[error("leaderboard I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("leaderboard data is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("score store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence collaborator for finished runs
pub trait ScoreStore {
    fn submit_score(&mut self, record: ScoreRecord) -> Result<SubmitReceipt, StoreError>;

    /// Up to `n` records, best score first
    fn top_scores(&self, n: usize) -> Result<Vec<ScoreRecord>, StoreError>;
}

impl<T: ScoreStore + ?Sized> ScoreStore for Box<T> {
    fn submit_score(&mut self, record: ScoreRecord) -> Result<SubmitReceipt, StoreError> {
        (**self).submit_score(record)
    }

    fn top_scores(&self, n: usize) -> Result<Vec<ScoreRecord>, StoreError> {
        (**self).top_scores(n)
    }
}

/// Lifetime totals for one player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub games_played: u32,
    pub total_score: u64,
    pub high_score: u64,
}

/// Best-run-per-player leaderboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    /// Sorted descending by score, one per player
    pub entries: Vec<ScoreRecord>,
    #[serde(default)]
    pub players: BTreeMap<String, PlayerStats>,
    #[cfg(not(target_arch = "wasm32"))]
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Leaderboard {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "trivia_blocks_leaderboard";

    /// Create an in-memory leaderboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the leaderboard is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    /// Current 1-indexed rank of a player
    pub fn rank_of(&self, player_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.player_id == player_id)
            .map(|i| i + 1)
    }

    pub fn player_stats(&self, player_id: &str) -> Option<&PlayerStats> {
        self.players.get(player_id)
    }

    /// Apply a run. Returns whether it became the player's best.
    ///
    /// The player's recorded best decides, not the visible entries: a player
    /// pushed off the board keeps their best in `players`.
    fn record(&mut self, record: ScoreRecord) -> bool {
        let previous_best = self.players.get(&record.player_id).map(|p| p.high_score);
        let is_new_high = match previous_best {
            Some(best) => record.score > best,
            None => record.score > 0,
        };

        let stats = self.players.entry(record.player_id.clone()).or_default();
        stats.games_played += 1;
        stats.total_score += record.score;
        stats.high_score = stats.high_score.max(record.score);

        if previous_best.is_some() && !is_new_high {
            return false;
        }
        self.entries.retain(|e| e.player_id != record.player_id);

        // Insert sorted descending; equal scores keep arrival order
        let pos = self
            .entries
            .iter()
            .position(|e| record.score > e.score)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, record);
        self.entries.truncate(MAX_LEADERBOARD_ENTRIES);

        is_new_high
    }

    /// Load from a JSON file; a missing file is an empty board
    #[cfg(not(target_arch = "wasm32"))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut board = match std::fs::read_to_string(path) {
            Ok(json) => {
                let board: Leaderboard = serde_json::from_str(&json)?;
                log::info!("Loaded {} leaderboard entries", board.entries.len());
                board
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No leaderboard at {}, starting fresh", path.display());
                Self::new()
            }
            Err(e) => return Err(e.into()),
        };
        board.path = Some(path.to_path_buf());
        Ok(board)
    }

    /// Write to the backing file, if any
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Leaderboard saved ({} entries)", self.entries.len());
        Ok(())
    }

    /// Load from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(board) = serde_json::from_str::<Leaderboard>(&json) {
                    log::info!("Loaded {} leaderboard entries", board.entries.len());
                    return board;
                }
            }
        }

        log::info!("No leaderboard found, starting fresh");
        Self::new()
    }

    /// Save to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) -> Result<(), StoreError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| StoreError::Unavailable("LocalStorage is not available".into()))?;
        let json = serde_json::to_string(self)?;
        storage
            .set_item(Self::STORAGE_KEY, &json)
            .map_err(|_| StoreError::Unavailable("LocalStorage write rejected".into()))?;
        log::info!("Leaderboard saved ({} entries)", self.entries.len());
        Ok(())
    }
}

impl ScoreStore for Leaderboard {
    fn submit_score(&mut self, record: ScoreRecord) -> Result<SubmitReceipt, StoreError> {
        if record.player_id.trim().is_empty() {
            return Err(StoreError::MissingPlayer);
        }
        // Commit only once the write succeeds, so a failed save leaves no trace
        let mut staged = self.clone();
        let is_new_high = staged.record(record);
        staged.save()?;
        *self = staged;
        Ok(SubmitReceipt {
            accepted: true,
            is_new_high,
        })
    }

    fn top_scores(&self, n: usize) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.entries.iter().take(n).cloned().collect())
    }
}
