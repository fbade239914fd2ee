//! Deterministic classification of stage numbers.

use serde::{Deserialize, Serialize};

/// Coarse game phase derived from the stage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    /// Stages 1-3.
    Early,
    /// Stages 4-7.
    Middle,
    /// Stages 8-12.
    Late,
    /// Stage 13 onwards.
    Final,
}

impl StageType {
    pub fn as_str(self) -> &'static str {
        match self {
            StageType::Early => "early",
            StageType::Middle => "middle",
            StageType::Late => "late",
            StageType::Final => "final",
        }
    }
}

/// Classify a stage number into its phase.
///
/// - `EARLY` for stages up to 3 (stage 0 included).
/// - `MIDDLE` up to 7, `LATE` up to 12.
/// - `FINAL` for everything beyond.
pub fn classify(stage: u32) -> StageType {
    match stage {
        0..=3 => StageType::Early,
        4..=7 => StageType::Middle,
        8..=12 => StageType::Late,
        _ => StageType::Final,
    }
}

/// Manipulation intensity in percent: `min(20 + stage * step, 100)`.
pub fn intensity(stage: u32, step: f64) -> f64 {
    (20.0 + f64::from(stage) * step).min(100.0)
}

/// Escalation tier used to pick the prompt's tactic vocabulary.
///
/// Finer grained than [`StageType`]: tiers change every three stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TacticTier {
    Subtle,
    Confusing,
    Gaslighting,
    Attrition,
    Distortion,
}

pub fn tactic_tier(stage: u32) -> TacticTier {
    match stage {
        0..=3 => TacticTier::Subtle,
        4..=6 => TacticTier::Confusing,
        7..=9 => TacticTier::Gaslighting,
        10..=12 => TacticTier::Attrition,
        _ => TacticTier::Distortion,
    }
}
