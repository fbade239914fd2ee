//! Deterministic fakes for the session's collaborators.
//!
//! Exposed to integration tests through the `test-support` feature.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::dice::Dice;
use crate::core::history::GameHistory;
use crate::io::config::GameConfig;
use crate::io::generator::{GenerateError, GenerateRequest, TextGenerator};
use crate::io::history_store::{HistoryStore, MemoryHistoryStore};
use crate::io::paths::GamePaths;
use crate::narrator::Sleeper;
use crate::session::Session;

/// Dice that replays a fixed list of draws and panics when it runs dry.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    draws: VecDeque<bool>,
    probabilities: Vec<f64>,
}

impl ScriptedDice {
    pub fn new(draws: impl IntoIterator<Item = bool>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            probabilities: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.draws.len()
    }

    /// Probabilities asked for so far, in order.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }
}

impl Dice for ScriptedDice {
    fn chance(&mut self, probability: f64) -> bool {
        self.probabilities.push(probability);
        match self.draws.pop_front() {
            Some(draw) => draw,
            None => panic!(
                "scripted dice exhausted after {} draws (asked p={probability})",
                self.probabilities.len() - 1
            ),
        }
    }
}

/// Generator that replays scripted replies, then reports itself unavailable.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: RefCell<VecDeque<Result<String, GenerateError>>>,
    requests: RefCell<Vec<GenerateRequest>>,
    calls: Cell<usize>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String, GenerateError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            requests: RefCell::new(Vec::new()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        self.calls.set(self.calls.get() + 1);
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GenerateError::Unavailable("script exhausted".to_string())))
    }
}

/// Sleeper that records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// History store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingHistoryStore {
    save_attempts: Cell<usize>,
}

impl FailingHistoryStore {
    pub fn save_attempts(&self) -> usize {
        self.save_attempts.get()
    }
}

impl HistoryStore for FailingHistoryStore {
    fn load(&self) -> Result<Option<GameHistory>> {
        Err(anyhow!("storage offline"))
    }

    fn save(&self, _history: &GameHistory) -> Result<()> {
        self.save_attempts.set(self.save_attempts.get() + 1);
        Err(anyhow!("storage offline"))
    }
}

/// Session over an in-memory store seeded with `history`.
pub fn scripted_session(
    config: GameConfig,
    history: GameHistory,
    draws: impl IntoIterator<Item = bool>,
) -> Session<MemoryHistoryStore, ScriptedDice> {
    Session::new(
        config,
        MemoryHistoryStore::with_history(history),
        ScriptedDice::new(draws),
    )
}

/// Fresh project root in a temporary directory. Keep the `TempDir` alive.
pub fn temp_game_root() -> Result<(TempDir, GamePaths)> {
    let temp = tempfile::tempdir().context("create temp dir")?;
    let paths = GamePaths::new(temp.path());
    Ok((temp, paths))
}
