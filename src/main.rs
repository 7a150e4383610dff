//! Trivia Blocks entry point
//!
//! Native builds run a line-oriented terminal front end. Input is read on a
//! separate thread and fed to the session between frames; real elapsed time
//! drives the session's virtual clock. The web build starts from the
//! library's `web` module instead.

#[cfg(not(target_arch = "wasm32"))]
mod terminal {
    use std::collections::VecDeque;
    use std::io::{self, BufRead, Write};
    use std::path::PathBuf;
    use std::sync::mpsc::{self, Receiver, TryRecvError};
    use std::thread;
    use std::time::{Duration, Instant};

    use trivia_blocks::clock::VirtualClock;
    use trivia_blocks::quiz::{ChallengeOutcome, QuestionBank, Urgency};
    use trivia_blocks::session::{SessionConfig, SessionSnapshot};
    use trivia_blocks::sim::SnapshotCell;
    use trivia_blocks::{
        Leaderboard, ScoreStore, SessionController, SessionEvent, SessionPhase, Settings,
    };

    type Session = SessionController<VirtualClock, Leaderboard>;

    const FRAME: Duration = Duration::from_millis(16);
    const MESSAGE_LINES: usize = 4;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Input {
        Left,
        Right,
        Rotate,
        Down,
        Drop,
        Answer(usize),
        NewGame,
        Leaderboard,
        Help,
        Quit,
        Unknown(String),
    }

    /// Split a line into commands. Runs of movement keys ("aaax") expand to
    /// one command per key.
    fn parse_line(line: &str) -> Vec<Input> {
        let mut inputs = Vec::new();
        for token in line.split_whitespace() {
            let token = token.to_ascii_lowercase();
            let word = match token.as_str() {
                "left" => Some(Input::Left),
                "right" => Some(Input::Right),
                "rotate" | "up" => Some(Input::Rotate),
                "down" => Some(Input::Down),
                "drop" => Some(Input::Drop),
                "n" | "new" => Some(Input::NewGame),
                "top" | "scores" => Some(Input::Leaderboard),
                "h" | "help" | "?" => Some(Input::Help),
                "q" | "quit" | "exit" => Some(Input::Quit),
                "1" | "2" | "3" | "4" => token.parse::<usize>().ok().map(|n| Input::Answer(n - 1)),
                _ => None,
            };
            if let Some(input) = word {
                inputs.push(input);
                continue;
            }

            let keys: Option<Vec<Input>> = token
                .chars()
                .map(|c| match c {
                    'a' => Some(Input::Left),
                    'd' => Some(Input::Right),
                    'w' => Some(Input::Rotate),
                    's' => Some(Input::Down),
                    'x' => Some(Input::Drop),
                    _ => None,
                })
                .collect();
            match keys {
                Some(keys) => inputs.extend(keys),
                None => inputs.push(Input::Unknown(token)),
            }
        }
        inputs
    }

    fn spawn_input_reader() -> Receiver<Input> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                for input in parse_line(&line) {
                    if tx.send(input).is_err() {
                        return;
                    }
                }
            }
        });
        rx
    }

    /// Text output state between frames
    struct Screen {
        messages: VecDeque<String>,
        footer: Vec<String>,
        last: Option<SessionSnapshot>,
        dirty: bool,
    }

    impl Screen {
        fn new() -> Self {
            Self {
                messages: VecDeque::with_capacity(MESSAGE_LINES),
                footer: Vec::new(),
                last: None,
                dirty: true,
            }
        }

        fn say(&mut self, message: impl Into<String>) {
            if self.messages.len() == MESSAGE_LINES {
                self.messages.pop_front();
            }
            self.messages.push_back(message.into());
            self.dirty = true;
        }

        fn set_footer(&mut self, lines: Vec<String>) {
            self.footer = lines;
            self.dirty = true;
        }

        fn draw_if_changed(&mut self, snapshot: SessionSnapshot) {
            if !self.dirty && self.last.as_ref() == Some(&snapshot) {
                return;
            }
            let mut out = String::from("\x1b[2J\x1b[H");
            render(&snapshot, &mut out);
            for message in &self.messages {
                out.push_str(message);
                out.push('\n');
            }
            for line in &self.footer {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("> ");
            print!("{out}");
            let _ = io::stdout().flush();

            self.last = Some(snapshot);
            self.dirty = false;
        }
    }

    fn glyph(cell: &SnapshotCell) -> &'static str {
        match cell {
            SnapshotCell::Empty => " .",
            SnapshotCell::Ghost => "::",
            SnapshotCell::Active(_) => "[]",
            SnapshotCell::Locked(_) => "##",
        }
    }

    fn urgency_label(urgency: Urgency) -> &'static str {
        match urgency {
            Urgency::Calm => "",
            Urgency::Warning => " (hurry!)",
            Urgency::Danger => " (!!!)",
        }
    }

    fn render(snapshot: &SessionSnapshot, out: &mut String) {
        let stats = &snapshot.stats;
        let mut side = vec![
            format!("Score  {}", stats.score),
            format!("Lines  {}", stats.lines),
            format!("Level  {}", stats.level),
            format!("Quiz   {}", stats.questions_answered),
            String::new(),
            "Next".to_string(),
        ];
        for row in &snapshot.grid.next_mask {
            side.push(row.iter().map(|&c| if c { "[]" } else { "  " }).collect());
        }

        for (y, row) in snapshot.grid.cells.iter().enumerate() {
            out.push('|');
            for cell in row {
                out.push_str(glyph(cell));
            }
            out.push('|');
            if let Some(line) = side.get(y) {
                out.push_str("   ");
                out.push_str(line);
            }
            out.push('\n');
        }
        out.push('+');
        out.push_str(&"--".repeat(snapshot.grid.cols));
        out.push_str("+\n\n");

        match snapshot.phase {
            SessionPhase::ChallengeActive => {
                if let Some(challenge) = &snapshot.challenge {
                    let label = snapshot.urgency.map(urgency_label).unwrap_or_default();
                    out.push_str(&format!(
                        "Question [{}] {}s left{}\n  {}\n",
                        challenge.difficulty.as_str(),
                        challenge.remaining_secs,
                        label,
                        challenge.question.prompt
                    ));
                    for (i, option) in challenge.question.options.iter().enumerate() {
                        out.push_str(&format!("  {}) {}\n", i + 1, option));
                    }
                    out.push_str("Answer with 1-4\n");
                }
            }
            SessionPhase::Ended => {
                if let Some(reason) = snapshot.end_reason {
                    out.push_str(&format!("GAME OVER: {}\n", reason.message()));
                }
                out.push_str("n: new game, top: leaderboard, q: quit\n");
            }
            SessionPhase::Running | SessionPhase::Ready => {}
        }
    }

    fn help_lines() -> Vec<String> {
        [
            "a/left  d/right  w/rotate  s/down  x/drop  (keys can be chained: aax)",
            "1-4 answer the question   n new game   top leaderboard   q quit",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn leaderboard_lines(store: &Leaderboard, n: usize, player_id: &str) -> Vec<String> {
        let records = match store.top_scores(n) {
            Ok(records) => records,
            Err(e) => return vec![format!("Leaderboard unavailable: {e}")],
        };
        if records.is_empty() {
            return vec!["No scores yet".to_string()];
        }

        let mut lines = vec!["  #  Player            Score  Lvl  Lines  Tier".to_string()];
        for (i, r) in records.iter().enumerate() {
            let name = if r.name.is_empty() { &r.player_id } else { &r.name };
            let marker = if r.player_id == player_id { " <" } else { "" };
            lines.push(format!(
                "{:>3}  {:<16} {:>7}  {:>3}  {:>5}  {}{}",
                i + 1,
                name,
                r.score,
                r.level,
                r.lines,
                r.difficulty.as_str(),
                marker
            ));
        }
        lines
    }

    /// Apply one command. Returns false to quit.
    fn handle(session: &mut Session, screen: &mut Screen, settings: &Settings, input: Input) -> bool {
        match input {
            Input::Left => {
                session.move_left();
            }
            Input::Right => {
                session.move_right();
            }
            Input::Rotate => {
                session.rotate();
            }
            Input::Down => {
                session.soft_drop();
            }
            Input::Drop => {
                session.hard_drop();
            }
            Input::Answer(index) => session.answer(index),
            Input::NewGame => {
                session.abandon();
                session.start_session();
                screen.set_footer(Vec::new());
            }
            Input::Leaderboard => {
                let lines =
                    leaderboard_lines(session.store(), settings.leaderboard_size, &settings.player_id);
                screen.set_footer(lines);
            }
            Input::Help => screen.set_footer(help_lines()),
            Input::Quit => {
                session.abandon();
                return false;
            }
            Input::Unknown(token) => screen.say(format!("Unknown command '{token}' (h for help)")),
        }
        true
    }

    fn report(session: &Session, screen: &mut Screen, settings: &Settings, event: SessionEvent) {
        match event {
            SessionEvent::Started => screen.say("New game. Clear a line to face a question."),
            SessionEvent::LinesCleared { count, .. } => {
                screen.say(format!("Cleared {count} line{}", if count == 1 { "" } else { "s" }))
            }
            SessionEvent::LevelUp { level } => screen.say(format!("Level {level}!")),
            SessionEvent::ChallengeStarted {
                difficulty,
                budget_secs,
            } => screen.say(format!(
                "Trivia time: {} question, {budget_secs}s",
                difficulty.as_str()
            )),
            SessionEvent::ChallengeResolved { outcome } => match outcome {
                ChallengeOutcome::Correct => screen.say("Correct! Keep going."),
                ChallengeOutcome::Incorrect => {
                    if let Some(c) = session.challenge() {
                        screen.say(format!("Wrong! It was: {}", c.question.correct_option()));
                    }
                }
                ChallengeOutcome::TimedOut | ChallengeOutcome::Pending => {}
            },
            SessionEvent::Ended {
                message,
                stats,
                receipt,
                ..
            } => {
                screen.say(format!(
                    "{message} Final score {} ({} lines, level {})",
                    stats.score, stats.lines, stats.level
                ));
                if receipt.is_some_and(|r| r.is_new_high) {
                    screen.say("New personal best!");
                }
                let lines =
                    leaderboard_lines(session.store(), settings.leaderboard_size, &settings.player_id);
                screen.set_footer(lines);
            }
            SessionEvent::Abandoned => screen.say("Game abandoned"),
            SessionEvent::PointsAwarded { .. } | SessionEvent::CountdownTick { .. } => {}
        }
    }

    pub fn run() {
        env_logger::init();

        let settings = Settings::load(std::env::args_os().nth(1).map(PathBuf::from));
        let store = Leaderboard::open(&settings.leaderboard_path).unwrap_or_else(|e| {
            log::error!("{e}; scores will not be saved");
            Leaderboard::new()
        });
        let bank = settings.load_question_bank().unwrap_or_else(|e| {
            log::error!("{e}; using the built-in questions");
            QuestionBank::builtin()
        });
        let seed = settings.resolve_seed();
        log::info!("Trivia Blocks starting (seed {seed})");

        let config = SessionConfig {
            player: settings.player(),
            seed,
            bank,
            show_ghost: settings.show_ghost,
        };
        let mut session = SessionController::new(VirtualClock::new(), store, config);
        let mut screen = Screen::new();
        screen.set_footer(help_lines());

        let inputs = spawn_input_reader();
        session.start_session();

        let started = Instant::now();
        let mut advanced_ms = 0u64;
        loop {
            loop {
                match inputs.try_recv() {
                    Ok(input) => {
                        if !handle(&mut session, &mut screen, &settings, input) {
                            println!();
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::info!("Input closed, exiting");
                        session.abandon();
                        return;
                    }
                }
            }

            let elapsed_ms = started.elapsed().as_millis() as u64;
            session.advance(elapsed_ms - advanced_ms);
            advanced_ms = elapsed_ms;

            for event in session.drain_events() {
                report(&session, &mut screen, &settings, event);
            }
            screen.draw_if_changed(session.snapshot());
            thread::sleep(FRAME);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_words_and_keys() {
            assert_eq!(
                parse_line("left 3 aax top"),
                vec![
                    Input::Left,
                    Input::Answer(2),
                    Input::Left,
                    Input::Left,
                    Input::Drop,
                    Input::Leaderboard,
                ]
            );
        }

        #[test]
        fn test_parse_unknown() {
            assert_eq!(parse_line("5 zz"), vec![
                Input::Unknown("5".into()),
                Input::Unknown("zz".into()),
            ]);
            assert!(parse_line("   ").is_empty());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    terminal::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is web::init in the library
}
