//! Desperation moves (Peek, Beg): scarce per-stage resources.
//!
//! Each move cycles `Unavailable -> Available -> Consumed`. At every stage
//! boundary both moves are re-rolled by independent Bernoulli draws; an unused
//! move does not carry over.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::dice::Dice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesperationMove {
    Peek,
    Beg,
}

impl DesperationMove {
    pub fn as_str(self) -> &'static str {
        match self {
            DesperationMove::Peek => "peek",
            DesperationMove::Beg => "beg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Unavailable,
    Available,
    Consumed,
}

/// Grant probabilities applied at every new stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplenishOdds {
    pub peek: f64,
    pub beg: f64,
}

impl Default for ReplenishOdds {
    fn default() -> Self {
        Self {
            peek: 0.30,
            beg: 0.20,
        }
    }
}

/// Availability of both moves for the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesperationMoves {
    pub peek: MoveState,
    pub beg: MoveState,
}

impl Default for DesperationMoves {
    /// A fresh game starts with one of each.
    fn default() -> Self {
        Self {
            peek: MoveState::Available,
            beg: MoveState::Available,
        }
    }
}

impl DesperationMoves {
    pub fn state(&self, kind: DesperationMove) -> MoveState {
        match kind {
            DesperationMove::Peek => self.peek,
            DesperationMove::Beg => self.beg,
        }
    }

    pub fn is_available(&self, kind: DesperationMove) -> bool {
        self.state(kind) == MoveState::Available
    }

    fn slot_mut(&mut self, kind: DesperationMove) -> &mut MoveState {
        match kind {
            DesperationMove::Peek => &mut self.peek,
            DesperationMove::Beg => &mut self.beg,
        }
    }

    /// Consume `kind` if available.
    ///
    /// Returns `false` (and changes nothing) when the move is unavailable or
    /// already consumed.
    pub fn consume(&mut self, kind: DesperationMove) -> bool {
        let slot = self.slot_mut(kind);
        if *slot != MoveState::Available {
            debug!(kind = kind.as_str(), state = ?*slot, "ignoring unavailable desperation move");
            return false;
        }
        *slot = MoveState::Consumed;
        true
    }

    /// Re-roll both moves for a new stage. Peek is drawn before Beg.
    pub fn reroll<D: Dice + ?Sized>(&mut self, odds: ReplenishOdds, dice: &mut D) {
        self.peek = draw(odds.peek, dice);
        self.beg = draw(odds.beg, dice);
        debug!(peek = ?self.peek, beg = ?self.beg, "desperation moves re-rolled");
    }
}

fn draw<D: Dice + ?Sized>(probability: f64, dice: &mut D) -> MoveState {
    if dice.chance(probability) {
        MoveState::Available
    } else {
        MoveState::Unavailable
    }
}
