//! Deterministic selection of the opponent's personality.

use serde::{Deserialize, Serialize};

/// Opponent disposition, derived from the player's cumulative record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Trickster,
    Manipulator,
    Psycho,
}

impl Personality {
    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Trickster => "trickster",
            Personality::Manipulator => "manipulator",
            Personality::Psycho => "psycho",
        }
    }
}

/// Derive the personality from the win/loss ratio.
///
/// Returns `Trickster` while the player has no losses. Otherwise the ratio
/// `wins / losses` selects: `< 0.5` trickster, `< 1.5` manipulator, else psycho.
/// Callers must re-derive after every outcome; there is no hysteresis.
pub fn select_personality(wins: u32, losses: u32) -> Personality {
    if losses == 0 {
        return Personality::Trickster;
    }
    let ratio = f64::from(wins) / f64::from(losses);
    if ratio < 0.5 {
        Personality::Trickster
    } else if ratio < 1.5 {
        Personality::Manipulator
    } else {
        Personality::Psycho
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_losses_is_trickster() {
        assert_eq!(select_personality(0, 0), Personality::Trickster);
        assert_eq!(select_personality(9, 0), Personality::Trickster);
    }

    #[test]
    fn ratio_thresholds() {
        assert_eq!(select_personality(1, 3), Personality::Trickster);
        assert_eq!(select_personality(1, 2), Personality::Manipulator);
        assert_eq!(select_personality(2, 2), Personality::Manipulator);
        assert_eq!(select_personality(3, 2), Personality::Psycho);
    }

    #[test]
    fn flips_without_hysteresis() {
        assert_eq!(select_personality(3, 2), Personality::Psycho);
        assert_eq!(select_personality(3, 3), Personality::Manipulator);
        assert_eq!(select_personality(4, 3), Personality::Manipulator);
        assert_eq!(select_personality(5, 3), Personality::Psycho);
    }
}
