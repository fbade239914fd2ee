//! Durable behavioural history that survives a game reset.

use serde::{Deserialize, Serialize};

use crate::core::types::{DOOR_COUNT, Outcome};

/// Persisted history (`.catchmaster/history.json`).
///
/// Counters only move forward. A reset bumps `games_played` and leaves every
/// other counter untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameHistory {
    /// How often each door was opened.
    pub door_selections: [u32; DOOR_COUNT],
    /// Selections that differed from the previously opened door.
    pub switched_doors: u32,
    /// Rounds the opponent deliberately tricked the player.
    pub times_fooled: u32,
    /// Completed resets ("new games").
    pub games_played: u32,
    pub current_win_streak: u32,
    pub current_loss_streak: u32,
    /// Door opened most recently, across games.
    pub last_door: Option<usize>,
}

impl GameHistory {
    /// Record that `door` was opened. Must run before the outcome is decided.
    pub fn record_selection(&mut self, door: usize) {
        if let Some(count) = self.door_selections.get_mut(door) {
            *count = count.saturating_add(1);
        }
        if self.last_door.is_some_and(|last| last != door) {
            self.switched_doors = self.switched_doors.saturating_add(1);
        }
        self.last_door = Some(door);
    }

    /// Mirror the session streak rule: exactly one streak resets to zero.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => {
                self.current_win_streak = self.current_win_streak.saturating_add(1);
                self.current_loss_streak = 0;
            }
            Outcome::Lose => {
                self.current_loss_streak = self.current_loss_streak.saturating_add(1);
                self.current_win_streak = 0;
            }
        }
    }

    pub fn record_fooled(&mut self) {
        self.times_fooled = self.times_fooled.saturating_add(1);
    }

    pub fn record_reset(&mut self) {
        self.games_played = self.games_played.saturating_add(1);
    }

    pub fn total_selections(&self) -> u32 {
        self.door_selections.iter().sum()
    }
}
