//! Durable storage for [`GameHistory`].
//!
//! The store is read once at session start and written after every player
//! action. Read failures are never fatal: [`load_or_fresh`] degrades to an empty
//! history so the session can proceed, after moving the unreadable record aside
//! so later saves cannot overwrite it.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::history::GameHistory;
use crate::io::atomic::{sibling, write_atomic};

const HISTORY_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/game_history/v1.schema.json"
));

/// Key-value persistence for the single history record.
pub trait HistoryStore {
    /// Load the stored history. `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<GameHistory>>;
    /// Replace the stored history.
    fn save(&self, history: &GameHistory) -> Result<()>;
    /// Move a record that failed to load out of the way. Returns where it went.
    fn quarantine(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Load history, treating any failure as "no history".
///
/// The unreadable record is quarantined first; it is never overwritten.
pub fn load_or_fresh<S: HistoryStore + ?Sized>(store: &S) -> GameHistory {
    match store.load() {
        Ok(Some(history)) => history,
        Ok(None) => {
            debug!("no stored history, starting fresh");
            GameHistory::default()
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "history unavailable, starting fresh");
            match store.quarantine() {
                Ok(Some(kept)) => warn!(kept = %kept.display(), "unreadable history moved aside"),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "could not move unreadable history aside");
                }
            }
            GameHistory::default()
        }
    }
}

/// JSON file store (`.catchmaster/history.json`).
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
    /// Set when an unreadable record could not be moved aside.
    read_only: Cell<bool>,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_only: Cell::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self) -> Result<Option<GameHistory>> {
        if !self.path.exists() {
            return Ok(None);
        }
        debug!(path = %self.path.display(), "loading history");
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read history {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse history {}", self.path.display()))?;
        validate_schema(&value)?;
        let history: GameHistory = serde_json::from_value(value)
            .with_context(|| format!("deserialize history {}", self.path.display()))?;
        debug!(
            games_played = history.games_played,
            times_fooled = history.times_fooled,
            "history loaded"
        );
        Ok(Some(history))
    }

    fn save(&self, history: &GameHistory) -> Result<()> {
        if self.read_only.get() {
            return Err(anyhow!(
                "refusing to overwrite unreadable history {}",
                self.path.display()
            ));
        }
        debug!(path = %self.path.display(), games_played = history.games_played, "writing history");
        let mut buf = serde_json::to_string_pretty(history)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    /// Rename the file to the first free `<name>.corrupt-<n>`.
    fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = (1u32..)
            .map(|n| sibling(&self.path, &format!(".corrupt-{n}")))
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| anyhow!("no free quarantine name for {}", self.path.display()))?;
        if let Err(err) = fs::rename(&self.path, &target) {
            self.read_only.set(true);
            return Err(err).with_context(|| {
                format!("move {} to {}", self.path.display(), target.display())
            });
        }
        Ok(Some(target))
    }
}

/// In-memory store for tests and `--no-persist` play.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    slot: RefCell<Option<GameHistory>>,
    saves: Cell<usize>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: GameHistory) -> Self {
        Self {
            slot: RefCell::new(Some(history)),
            saves: Cell::new(0),
        }
    }

    /// Last saved history.
    pub fn snapshot(&self) -> Option<GameHistory> {
        self.slot.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<Option<GameHistory>> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&self, history: &GameHistory) -> Result<()> {
        *self.slot.borrow_mut() = Some(history.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

fn validate_schema(history: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(HISTORY_SCHEMA).context("parse history schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(history) {
        let messages = compiled
            .iter_errors(history)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "history schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies write → read preserves all fields.
    #[test]
    fn history_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileHistoryStore::new(temp.path().join(".catchmaster/history.json"));
        let history = GameHistory {
            door_selections: [4, 1, 7],
            switched_doors: 3,
            times_fooled: 2,
            games_played: 5,
            current_win_streak: 0,
            current_loss_streak: 2,
            last_door: Some(2),
        };

        store.save(&history).expect("save");
        let loaded = store.load().expect("load");
        assert_eq!(loaded, Some(history));
    }

    /// Ensures the default history serializes to a known, stable JSON format.
    #[test]
    fn default_history_format_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        FileHistoryStore::new(&path)
            .save(&GameHistory::default())
            .expect("save");
        let contents = fs::read_to_string(&path).expect("read");
        let expected = "{\n  \"door_selections\": [\n    0,\n    0,\n    0\n  ],\n  \"switched_doors\": 0,\n  \"times_fooled\": 0,\n  \"games_played\": 0,\n  \"current_win_streak\": 0,\n  \"current_loss_streak\": 0,\n  \"last_door\": null\n}\n";
        assert_eq!(contents, expected);
    }

    #[test]
    fn missing_file_is_no_history() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileHistoryStore::new(temp.path().join("history.json"));
        assert_eq!(store.load().expect("load"), None);
        assert_eq!(load_or_fresh(&store), GameHistory::default());
    }

    #[test]
    fn corrupt_file_degrades_to_fresh_history() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        fs::write(&path, "{not json").expect("write");
        let store = FileHistoryStore::new(&path);
        assert!(store.load().is_err());
        assert_eq!(load_or_fresh(&store), GameHistory::default());
    }

    #[test]
    fn unreadable_file_is_moved_aside_not_overwritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        let original = r#"{"door_selections":[40,12,7],"games_played":8,"note":"hi"}"#;
        fs::write(&path, original).expect("write");
        let store = FileHistoryStore::new(&path);

        assert_eq!(load_or_fresh(&store), GameHistory::default());
        assert!(!path.exists());
        let kept = temp.path().join("history.json.corrupt-1");
        assert_eq!(fs::read_to_string(&kept).expect("read kept"), original);

        store.save(&GameHistory::default()).expect("save");
        assert_eq!(fs::read_to_string(&kept).expect("read kept"), original);
    }

    #[test]
    fn quarantine_never_reuses_a_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        fs::write(temp.path().join("history.json.corrupt-1"), "older").expect("write");
        fs::write(&path, "{not json").expect("write");

        let moved = FileHistoryStore::new(&path).quarantine().expect("quarantine");
        assert_eq!(moved, Some(temp.path().join("history.json.corrupt-2")));
        assert_eq!(
            fs::read_to_string(temp.path().join("history.json.corrupt-1")).expect("read"),
            "older"
        );
    }

    #[test]
    fn missing_file_needs_no_quarantine() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileHistoryStore::new(temp.path().join("history.json"));
        assert_eq!(store.quarantine().expect("quarantine"), None);
    }

    #[test]
    fn schema_rejects_negative_counters() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        fs::write(&path, "{\"door_selections\": [1, -2, 0]}").expect("write");
        let err = FileHistoryStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryHistoryStore::new();
        assert_eq!(store.load().expect("load"), None);
        let history = GameHistory {
            games_played: 2,
            ..GameHistory::default()
        };
        store.save(&history).expect("save");
        assert_eq!(store.snapshot(), Some(history));
        assert_eq!(store.save_count(), 1);
    }
}
