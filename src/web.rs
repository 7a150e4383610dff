//! Browser bindings
//!
//! The page owns rendering and input. It forwards key presses to a
//! [`WebSession`], calls `advance` from its animation frame with the elapsed
//! milliseconds, and reads back JSON snapshots and events.

use wasm_bindgen::prelude::*;

use crate::clock::VirtualClock;
use crate::highscores::{Leaderboard, ScoreStore};
use crate::session::{SessionConfig, SessionController};
use crate::settings::Settings;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"logger already initialised".into());
    }
    log::info!("Trivia Blocks starting...");
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// One game session bound to LocalStorage settings and leaderboard
#[wasm_bindgen]
pub struct WebSession {
    inner: SessionController<VirtualClock, Leaderboard>,
    leaderboard_size: usize,
    /// Sub-millisecond remainder carried between frames
    carry_ms: f64,
}

#[wasm_bindgen]
impl WebSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebSession {
        let settings = Settings::load();
        let bank = settings.load_question_bank().unwrap_or_else(|e| {
            log::error!("{e}; using the built-in questions");
            crate::quiz::QuestionBank::builtin()
        });
        let seed = settings.resolve_seed();
        log::info!("Session seed: {seed}");

        let config = SessionConfig {
            player: settings.player(),
            seed,
            bank,
            show_ghost: settings.show_ghost,
        };
        WebSession {
            inner: SessionController::new(VirtualClock::new(), Leaderboard::load(), config),
            leaderboard_size: settings.leaderboard_size,
            carry_ms: 0.0,
        }
    }

    pub fn start(&mut self) {
        self.inner.start_session();
    }

    pub fn abandon(&mut self) {
        self.inner.abandon();
    }

    pub fn move_left(&mut self) -> bool {
        self.inner.move_left()
    }

    pub fn move_right(&mut self) -> bool {
        self.inner.move_right()
    }

    pub fn rotate(&mut self) -> bool {
        self.inner.rotate()
    }

    pub fn soft_drop(&mut self) -> bool {
        self.inner.soft_drop()
    }

    pub fn hard_drop(&mut self) -> bool {
        self.inner.hard_drop()
    }

    pub fn answer(&mut self, index: u32) {
        self.inner.answer(index as usize);
    }

    /// Feed elapsed wall time (ms) from the page's frame loop
    pub fn advance(&mut self, elapsed_ms: f64) {
        if !elapsed_ms.is_finite() || elapsed_ms <= 0.0 {
            return;
        }
        let total = self.carry_ms + elapsed_ms;
        let whole = total.floor();
        self.carry_ms = total - whole;
        self.inner.advance(whole as u64);
    }

    pub fn phase(&self) -> String {
        format!("{:?}", self.inner.phase())
    }

    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.snapshot()).map_err(to_js)
    }

    /// Events since the last call, oldest first
    pub fn events_json(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.drain_events()).map_err(to_js)
    }

    pub fn top_scores_json(&self) -> Result<String, JsValue> {
        let records = self
            .inner
            .store()
            .top_scores(self.leaderboard_size)
            .map_err(to_js)?;
        serde_json::to_string(&records).map_err(to_js)
    }
}

impl Default for WebSession {
    fn default() -> Self {
        Self::new()
    }
}
