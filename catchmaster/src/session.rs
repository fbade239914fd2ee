//! Session controller: the only writer of [`SessionState`] and [`GameHistory`].
//!
//! # Flow
//!
//! `AwaitingChoice -> Resolving -> Resolved -> AwaitingContinue -> AwaitingChoice`,
//! with a deferred jump to `GameOver` once the final stage is resolved or the
//! last life is lost. Only [`Session::reset_game`] leaves `GameOver`.
//!
//! Time never advances on its own. Callers pass `now` into every command that
//! schedules a timer and drive deferred transitions through [`Session::tick`].
//! Timers carry the epoch that scheduled them, so a timer that outlives its
//! stage (or game) is dropped instead of firing.

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::core::dice::Dice;
use crate::core::history::GameHistory;
use crate::core::invariants::validate_session;
use crate::core::moves::{DesperationMove, DesperationMoves};
use crate::core::outcome::{Decision, DecisionInputs, decide};
use crate::core::selector::{Personality, select_personality};
use crate::core::state::{Phase, SessionState};
use crate::core::timers::{TimerKind, TimerQueue};
use crate::core::types::{Outcome, StreakStats, door_in_range};
use crate::io::config::GameConfig;
use crate::io::history_store::{HistoryStore, load_or_fresh};
use crate::narrator::{HintRequest, scripted_message};
use crate::prompt::door_history_lines;

/// Chance a Manipulator shows a false peek preview.
pub const PEEK_LIE_CHANCE: f64 = 0.30;

/// Why a command was refused. Refusals change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Processing,
    InvalidDoor(usize),
    DoorAlreadyOpened,
    WrongPhase(Phase),
    GameOver,
    MoveUnavailable(DesperationMove),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Resolved(Decision),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The preview shown for `door`; false when the opponent lied.
    Peeked { door: usize, preview: Outcome },
    Begged,
    Rejected(Rejection),
}

/// Identifies the hint request a generated text answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HintTicket {
    epoch: u64,
    serial: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeekPreview {
    pub door: usize,
    pub shown: Outcome,
}

pub struct Session<S, D> {
    config: GameConfig,
    store: S,
    dice: D,
    state: SessionState,
    history: GameHistory,
    moves: DesperationMoves,
    phase: Phase,
    timers: TimerQueue,
    epoch: u64,
    mercy_pending: bool,
    /// Outcome fixed by a peek for the current stage.
    predecided: Option<Decision>,
    peek: Option<PeekPreview>,
    hint_serial: u64,
}

impl<S: HistoryStore, D: Dice> Session<S, D> {
    /// Start a session, loading history from `store` (fresh on any failure).
    pub fn new(config: GameConfig, store: S, dice: D) -> Self {
        let history = load_or_fresh(&store);
        let state = SessionState::new(config.initial_doubt_level, initial_lives(&config));
        let mut session = Self {
            config,
            store,
            dice,
            state,
            history,
            moves: DesperationMoves::default(),
            phase: Phase::AwaitingChoice,
            timers: TimerQueue::default(),
            epoch: 0,
            mercy_pending: false,
            predecided: None,
            peek: None,
            hint_serial: 0,
        };
        session.refresh_message();
        info!(
            games_played = session.history.games_played,
            "session started"
        );
        session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &GameHistory {
        &self.history
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-derived from the current record on every call.
    pub fn personality(&self) -> Personality {
        select_personality(self.state.wins, self.state.losses)
    }

    pub fn moves(&self) -> DesperationMoves {
        self.moves
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mercy_pending(&self) -> bool {
        self.mercy_pending
    }

    pub fn peek_preview(&self) -> Option<PeekPreview> {
        self.peek
    }

    /// When the next live timer fires, if any.
    pub fn next_timer_due(&self) -> Option<Instant> {
        self.timers.next_due(self.epoch)
    }

    /// Open `door` (zero-based) for the current stage.
    #[instrument(skip(self, now), fields(stage = self.state.stage))]
    pub fn select_door(&mut self, door: usize, now: Instant) -> SelectionOutcome {
        if let Err(rejection) = self.check_choice(door) {
            debug!(?rejection, "door selection rejected");
            return SelectionOutcome::Rejected(rejection);
        }

        self.phase = Phase::Resolving;
        self.state.is_processing = true;
        self.state.is_new_stage = false;

        // Counted before the outcome exists.
        self.history.record_selection(door);

        let decision = match self.predecided.take().filter(|d| d.door == door) {
            Some(decision) => decision,
            None => {
                let inputs = self.decision_inputs();
                decide(door, &inputs, &mut self.dice)
            }
        };
        self.mercy_pending = false;

        self.state.record_outcome(door, decision.outcome);
        self.history.record_outcome(decision.outcome);
        if decision.fooled {
            self.history.record_fooled();
        }
        self.apply_lives(decision.outcome);

        self.state.is_processing = false;
        self.phase = Phase::Resolved;

        if self.should_end() {
            self.timers.schedule(
                TimerKind::GameOver,
                now,
                self.config.game_over_delay(),
                self.epoch,
            );
        } else {
            self.phase = Phase::AwaitingContinue;
            if decision.outcome.is_win() {
                self.timers.schedule(
                    TimerKind::AutoAdvance,
                    now,
                    self.config.auto_advance_delay(),
                    self.epoch,
                );
            }
        }

        info!(
            door,
            outcome = decision.outcome.as_str(),
            rule = ?decision.rule,
            personality = self.personality().as_str(),
            "door resolved"
        );
        self.refresh_message();
        self.persist();
        self.check_invariants();
        SelectionOutcome::Resolved(decision)
    }

    /// Peek behind `door`. The outcome is fixed for this stage at peek time.
    #[instrument(skip(self, now), fields(stage = self.state.stage))]
    pub fn use_peek(&mut self, door: usize, now: Instant) -> MoveOutcome {
        if let Err(rejection) = self.check_choice(door) {
            return MoveOutcome::Rejected(rejection);
        }
        if !self.moves.consume(DesperationMove::Peek) {
            return MoveOutcome::Rejected(Rejection::MoveUnavailable(DesperationMove::Peek));
        }

        let inputs = self.decision_inputs();
        let decision = decide(door, &inputs, &mut self.dice);
        self.predecided = Some(decision);

        let mut shown = decision.outcome;
        if self.personality() == Personality::Manipulator && self.dice.chance(PEEK_LIE_CHANCE) {
            shown = shown.inverted();
            self.history.record_fooled();
            debug!(door, "peek preview falsified");
        }

        self.peek = Some(PeekPreview { door, shown });
        self.state.peeking_door = Some(door);
        self.timers.cancel(TimerKind::PeekWindowEnd);
        self.timers.schedule(
            TimerKind::PeekWindowEnd,
            now,
            self.config.peek_window(),
            self.epoch,
        );
        self.persist();
        self.check_invariants();
        MoveOutcome::Peeked {
            door,
            preview: shown,
        }
    }

    /// Beg for mercy on the next door of this stage.
    pub fn use_beg(&mut self) -> MoveOutcome {
        if let Err(rejection) = self.check_phase() {
            return MoveOutcome::Rejected(rejection);
        }
        if !self.moves.consume(DesperationMove::Beg) {
            return MoveOutcome::Rejected(Rejection::MoveUnavailable(DesperationMove::Beg));
        }
        self.mercy_pending = true;
        debug!(stage = self.state.stage, "mercy pending");
        MoveOutcome::Begged
    }

    /// Advance to the next stage. Returns `false` unless a door was resolved
    /// and the game is not ending.
    pub fn continue_game(&mut self) -> bool {
        if self.phase != Phase::AwaitingContinue {
            debug!(phase = ?self.phase, "continue ignored");
            return false;
        }
        self.advance_stage();
        true
    }

    pub fn set_doubt_level(&mut self, level: u8) {
        self.state.doubt_level = level.min(100);
        self.refresh_message();
    }

    /// Fire due timers; returns the transitions applied, in order.
    pub fn tick(&mut self, now: Instant) -> Vec<TimerKind> {
        let epoch = self.epoch;
        let due = self.timers.due(now, epoch);
        let mut applied = Vec::with_capacity(due.len());
        for kind in due {
            if self.epoch != epoch {
                debug!(?kind, "epoch moved during tick, skipping");
                continue;
            }
            match kind {
                TimerKind::AutoAdvance => {
                    if self.phase != Phase::AwaitingContinue {
                        continue;
                    }
                    self.advance_stage();
                }
                TimerKind::PeekWindowEnd => {
                    self.state.peeking_door = None;
                    self.peek = None;
                }
                TimerKind::GameOver => {
                    self.phase = Phase::GameOver;
                    self.state.is_game_over = true;
                    info!(
                        stage = self.state.stage,
                        wins = self.state.wins,
                        losses = self.state.losses,
                        "game over"
                    );
                }
            }
            applied.push(kind);
        }
        if !applied.is_empty() {
            self.check_invariants();
        }
        applied
    }

    /// Start a new game. Durable history is kept; only `games_played` moves.
    #[instrument(skip(self))]
    pub fn reset_game(&mut self) {
        self.history.record_reset();
        self.epoch += 1;
        self.timers.clear();
        self.state = SessionState::new(
            self.config.initial_doubt_level,
            initial_lives(&self.config),
        );
        self.moves = DesperationMoves::default();
        self.phase = Phase::AwaitingChoice;
        self.mercy_pending = false;
        self.predecided = None;
        self.peek = None;
        self.refresh_message();
        info!(games_played = self.history.games_played, "game reset");
        self.persist();
    }

    /// Snapshot of what the narrator needs for the current stage.
    ///
    /// Issuing a request invalidates every earlier ticket.
    pub fn hint_request(&mut self) -> HintRequest {
        self.hint_serial += 1;
        HintRequest {
            ticket: HintTicket {
                epoch: self.epoch,
                serial: self.hint_serial,
            },
            conversation: format!("game-{}", self.history.games_played),
            stage: self.state.stage,
            personality: self.personality(),
            door_history: door_history_lines(&self.history),
            streaks: StreakStats {
                win_streak: self.state.consecutive_wins,
                loss_streak: self.state.consecutive_losses,
            },
            intensity_step: self.config.intensity_step,
        }
    }

    /// Show generated text if `ticket` is still current. Never touches game state.
    pub fn apply_hint(&mut self, ticket: HintTicket, text: &str) -> bool {
        if ticket.epoch != self.epoch || ticket.serial != self.hint_serial {
            debug!(?ticket, epoch = self.epoch, "dropping stale hint");
            return false;
        }
        self.state.message = text.to_string();
        true
    }

    fn check_phase(&self) -> Result<(), Rejection> {
        if self.phase == Phase::GameOver {
            return Err(Rejection::GameOver);
        }
        if self.state.is_processing {
            return Err(Rejection::Processing);
        }
        if self.state.door_opened() {
            return Err(Rejection::DoorAlreadyOpened);
        }
        if self.phase != Phase::AwaitingChoice {
            return Err(Rejection::WrongPhase(self.phase));
        }
        Ok(())
    }

    fn check_choice(&self, door: usize) -> Result<(), Rejection> {
        self.check_phase()?;
        if !door_in_range(door) {
            return Err(Rejection::InvalidDoor(door));
        }
        Ok(())
    }

    fn decision_inputs(&self) -> DecisionInputs {
        DecisionInputs {
            stage: self.state.stage,
            doubt_level: self.state.doubt_level,
            personality: self.personality(),
            consecutive_wins: self.state.consecutive_wins,
            consecutive_losses: self.state.consecutive_losses,
            mercy_pending: self.mercy_pending,
        }
    }

    fn apply_lives(&mut self, outcome: Outcome) {
        let Some(lives) = self.state.lives else {
            return;
        };
        let max = self.config.lives.max;
        let next = match outcome {
            Outcome::Lose => lives.saturating_sub(1),
            Outcome::Win if lives < max && self.dice.chance(self.config.lives.replenish_chance) => {
                debug!("life restored");
                lives + 1
            }
            Outcome::Win => lives,
        };
        self.state.lives = Some(next);
    }

    fn should_end(&self) -> bool {
        self.state.stage >= self.config.final_stage || self.state.lives == Some(0)
    }

    fn advance_stage(&mut self) {
        self.epoch += 1;
        self.timers.clear();
        self.state.enter_stage(self.state.stage + 1);
        self.moves
            .reroll(self.config.replenish_odds(), &mut self.dice);
        self.phase = Phase::AwaitingChoice;
        self.mercy_pending = false;
        self.predecided = None;
        self.peek = None;
        self.refresh_message();
        debug!(stage = self.state.stage, epoch = self.epoch, "stage entered");
        self.check_invariants();
    }

    fn refresh_message(&mut self) {
        self.state.message = scripted_message(
            self.state.stage,
            self.state.doubt_level,
            self.state.is_new_stage,
        )
        .to_string();
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.history) {
            warn!(error = %format!("{err:#}"), "failed to save history, continuing");
        }
    }

    fn check_invariants(&self) {
        let max_lives = self.config.lives.max;
        for violation in validate_session(&self.state, max_lives) {
            error!(violation = %violation, "session invariant violated");
        }
    }
}

fn initial_lives(config: &GameConfig) -> Option<u32> {
    config.lives.enabled.then_some(config.lives.max)
}
