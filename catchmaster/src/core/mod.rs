//! Deterministic, pure logic shared by the game engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs (given the dice) suitable
//! for tests.

pub mod classifier;
pub mod diary;
pub mod dice;
pub mod history;
pub mod invariants;
pub mod moves;
pub mod outcome;
pub mod selector;
pub mod state;
pub mod timers;
pub mod types;
