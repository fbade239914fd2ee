//! Outcome engine: decides whether the opened door wins or loses.
//!
//! Rules are evaluated in strict priority order and the first one that
//! resolves the round wins:
//!
//! 1. **Mercy**: a just-consumed Beg gives a 50% forced win.
//! 2. **Sabotage**: `psycho` forces a loss 25% of the time ("the door moved"),
//!    `manipulator` 30% of the time ("the hint lied").
//! 3. **Streak correction**: two or more consecutive wins cap the odds at 30%;
//!    three or more consecutive losses raise them to 60%.
//! 4. **Baseline**: stage/trust odds. High trust is punished in late and final
//!    stages.
//!
//! Losses resolved by rules 2 and 3 count as the player being fooled.

use serde::{Deserialize, Serialize};

use crate::core::classifier::{StageType, classify};
use crate::core::dice::Dice;
use crate::core::selector::Personality;
use crate::core::types::Outcome;

pub const MERCY_CHANCE: f64 = 0.5;
pub const PSYCHO_SABOTAGE_CHANCE: f64 = 0.25;
pub const MANIPULATOR_SABOTAGE_CHANCE: f64 = 0.30;
pub const WIN_STREAK_CAP: f64 = 0.30;
pub const LOSS_STREAK_PITY: f64 = 0.60;
/// Doubt levels strictly above this count as "trusting".
pub const HIGH_TRUST_THRESHOLD: u8 = 70;

/// Everything the engine reads to decide a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionInputs {
    pub stage: u32,
    /// 0 = total distrust, 100 = total trust.
    pub doubt_level: u8,
    pub personality: Personality,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    /// Beg was consumed and this is the first selection since.
    pub mercy_pending: bool,
}

/// Why a sabotage fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sabotage {
    /// `psycho`: the door moved.
    DoorMoved,
    /// `manipulator`: the hint lied.
    HintLied,
}

/// The rule that resolved a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Mercy,
    Sabotage(Sabotage),
    WinStreakCap,
    LossStreakPity,
    Baseline,
}

/// Win probability for rules 3-4 and which rule produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Odds {
    pub probability: f64,
    pub rule: DecidedBy,
}

/// A resolved round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub door: usize,
    pub outcome: Outcome,
    pub rule: DecidedBy,
    /// Loss attributable to sabotage or streak correction.
    pub fooled: bool,
}

/// Baseline stage/trust odds (rule 4).
pub fn baseline_odds(stage_type: StageType, doubt_level: u8) -> f64 {
    let trusting = doubt_level > HIGH_TRUST_THRESHOLD;
    match stage_type {
        StageType::Early => 0.70,
        StageType::Middle => 0.50,
        StageType::Late => {
            if trusting {
                0.30
            } else {
                0.50
            }
        }
        StageType::Final => {
            if trusting {
                0.10
            } else {
                0.40
            }
        }
    }
}

/// Win odds after streak correction (rules 3-4), ignoring mercy and sabotage.
pub fn win_odds(inputs: &DecisionInputs) -> Odds {
    if inputs.consecutive_wins >= 2 {
        return Odds {
            probability: WIN_STREAK_CAP,
            rule: DecidedBy::WinStreakCap,
        };
    }
    if inputs.consecutive_losses >= 3 {
        return Odds {
            probability: LOSS_STREAK_PITY,
            rule: DecidedBy::LossStreakPity,
        };
    }
    Odds {
        probability: baseline_odds(classify(inputs.stage), inputs.doubt_level),
        rule: DecidedBy::Baseline,
    }
}

/// Chance that the personality sabotages the round outright.
pub fn sabotage_chance(personality: Personality) -> Option<(f64, Sabotage)> {
    match personality {
        Personality::Trickster => None,
        Personality::Manipulator => Some((MANIPULATOR_SABOTAGE_CHANCE, Sabotage::HintLied)),
        Personality::Psycho => Some((PSYCHO_SABOTAGE_CHANCE, Sabotage::DoorMoved)),
    }
}

/// Decide the outcome of opening `door`.
///
/// Deterministic given the dice; never mutates its inputs.
pub fn decide<D: Dice + ?Sized>(door: usize, inputs: &DecisionInputs, dice: &mut D) -> Decision {
    if inputs.mercy_pending && dice.chance(MERCY_CHANCE) {
        return Decision {
            door,
            outcome: Outcome::Win,
            rule: DecidedBy::Mercy,
            fooled: false,
        };
    }

    if let Some((chance, kind)) = sabotage_chance(inputs.personality) {
        if dice.chance(chance) {
            return Decision {
                door,
                outcome: Outcome::Lose,
                rule: DecidedBy::Sabotage(kind),
                fooled: true,
            };
        }
    }

    let odds = win_odds(inputs);
    let outcome = if dice.chance(odds.probability) {
        Outcome::Win
    } else {
        Outcome::Lose
    };
    let fooled = outcome == Outcome::Lose
        && matches!(
            odds.rule,
            DecidedBy::WinStreakCap | DecidedBy::LossStreakPity
        );
    Decision {
        door,
        outcome,
        rule: odds.rule,
        fooled,
    }
}
