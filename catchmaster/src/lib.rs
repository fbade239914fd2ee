//! A stage-based deception game: pick one of three doors while an adaptive
//! opponent offers hints that grow less trustworthy as you advance.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic rules (stage classification, outcome
//!   decisions, desperation moves, durable history). Randomness enters only
//!   through [`core::dice::Dice`], so every rule is testable with scripted draws.
//! - **[`io`]**: Side-effecting collaborators (config and history files, text
//!   generators, conversation memory).
//!
//! Orchestration lives in [`session`] (the state machine that owns all game
//! state), [`prompt`] (hint prompt composition) and [`narrator`] (generation
//! with retry and a fixed fallback table).

pub mod core;
pub mod io;
pub mod logging;
pub mod narrator;
pub mod prompt;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
