//! Shared deterministic types for the game core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Serialize};

/// Number of doors offered at every stage.
pub const DOOR_COUNT: usize = 3;

/// Result of opening a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

impl Outcome {
    pub fn is_win(self) -> bool {
        matches!(self, Outcome::Win)
    }

    /// The opposite verdict (used when a preview lies).
    pub fn inverted(self) -> Self {
        match self {
            Outcome::Win => Outcome::Lose,
            Outcome::Lose => Outcome::Win,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Lose => "lose",
        }
    }
}

/// Per-stage door results; at most one entry is `Some` during play.
pub type DoorResults = [Option<Outcome>; DOOR_COUNT];

/// Current streak lengths fed to the prompt composer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    pub win_streak: u32,
    pub loss_streak: u32,
}

/// Validate a zero-based door index.
pub fn door_in_range(door: usize) -> bool {
    door < DOOR_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_flips_outcome() {
        assert_eq!(Outcome::Win.inverted(), Outcome::Lose);
        assert_eq!(Outcome::Lose.inverted(), Outcome::Win);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_string(&[Outcome::Win, Outcome::Lose]).expect("serialize");
        assert_eq!(json, "[\"win\",\"lose\"]");
    }
}
