//! Game settings and preferences
//!
//! Native builds read a JSON file; web builds persist to LocalStorage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quiz::{BankError, QuestionBank};
use crate::session::Player;

/// Environment variable naming the settings file (native only)
pub const SETTINGS_ENV: &str = "TRIVIA_BLOCKS_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question bank rejected: {0}")]
    Bank(#[from] BankError),
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Player ===
    pub player_id: String,
    pub player_name: String,

    // === Simulation ===
    /// Fixed RNG seed for reproducible runs; random when unset
    pub seed: Option<u64>,
    /// Custom question bank (JSON); the built-in bank when unset
    pub question_bank: Option<PathBuf>,

    // === Leaderboard ===
    /// Leaderboard file (native only)
    pub leaderboard_path: PathBuf,
    /// How many entries to show after a game
    pub leaderboard_size: usize,

    // === Display ===
    /// Show where the current piece will land
    pub show_ghost: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_id: "guest".to_string(),
            player_name: "Guest".to_string(),
            seed: None,
            question_bank: None,
            leaderboard_path: PathBuf::from("trivia-blocks-leaderboard.json"),
            leaderboard_size: 10,
            show_ghost: true,
        }
    }
}

impl Settings {
    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "trivia_blocks_settings";

    pub fn player(&self) -> Player {
        Player {
            id: self.player_id.clone(),
            name: self.player_name.clone(),
        }
    }

    /// The configured seed, or one derived from the current time
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(time_seed)
    }

    /// Load the configured question bank, or the built-in one
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_question_bank(&self) -> Result<QuestionBank, SettingsError> {
        match &self.question_bank {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                let bank = QuestionBank::from_json(&json)?;
                log::info!("Loaded question bank from {}", path.display());
                Ok(bank)
            }
            None => Ok(QuestionBank::builtin()),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn load_question_bank(&self) -> Result<QuestionBank, SettingsError> {
        Ok(QuestionBank::builtin())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: impl AsRef<std::path::Path>) -> Result<(), SettingsError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load from `path`, else from `$TRIVIA_BLOCKS_SETTINGS`, else defaults
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: Option<PathBuf>) -> Self {
        let Some(path) = path.or_else(|| std::env::var_os(SETTINGS_ENV).map(PathBuf::from)) else {
            log::info!("Using default settings");
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::error!("{}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(settings) = serde_json::from_str(&json) {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn time_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}

#[cfg(target_arch = "wasm32")]
fn time_seed() -> u64 {
    (js_sys::Date::now() * 1000.0) as u64 ^ (js_sys::Math::random() * u32::MAX as f64) as u64
}
