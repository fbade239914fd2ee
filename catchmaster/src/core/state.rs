//! Player-visible session state.

use serde::{Deserialize, Serialize};

use crate::core::classifier::{StageType, classify};
use crate::core::types::{DOOR_COUNT, DoorResults, Outcome};

/// Flow position of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingChoice,
    Resolving,
    Resolved,
    AwaitingContinue,
    GameOver,
}

/// Snapshot consumed read-only by renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub stage: u32,
    pub stage_type: StageType,
    pub door_results: DoorResults,
    pub doubt_level: u8,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    /// `None` when the lives variant is disabled.
    pub lives: Option<u32>,
    pub message: String,
    pub peeking_door: Option<usize>,
    pub is_processing: bool,
    pub is_new_stage: bool,
    pub is_game_over: bool,
}

impl SessionState {
    pub fn new(doubt_level: u8, lives: Option<u32>) -> Self {
        Self {
            stage: 1,
            stage_type: classify(1),
            door_results: [None; DOOR_COUNT],
            doubt_level,
            wins: 0,
            losses: 0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            lives,
            message: String::new(),
            peeking_door: None,
            is_processing: false,
            is_new_stage: true,
            is_game_over: false,
        }
    }

    /// True once a door has been opened in the current stage.
    pub fn door_opened(&self) -> bool {
        self.door_results.iter().any(Option::is_some)
    }

    /// Apply a resolved outcome to the counters. Exactly one streak resets.
    pub fn record_outcome(&mut self, door: usize, outcome: Outcome) {
        self.door_results[door] = Some(outcome);
        match outcome {
            Outcome::Win => {
                self.wins += 1;
                self.consecutive_wins += 1;
                self.consecutive_losses = 0;
            }
            Outcome::Lose => {
                self.losses += 1;
                self.consecutive_losses += 1;
                self.consecutive_wins = 0;
            }
        }
    }

    /// Move to `stage`, clearing per-stage fields.
    pub fn enter_stage(&mut self, stage: u32) {
        self.stage = stage;
        self.stage_type = classify(stage);
        self.door_results = [None; DOOR_COUNT];
        self.peeking_door = None;
        self.is_new_stage = true;
    }
}
