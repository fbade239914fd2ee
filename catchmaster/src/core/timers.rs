//! Epoch-guarded deferred transitions.
//!
//! Every timer is stamped with the session epoch at scheduling time. The
//! session bumps its epoch whenever it leaves the state that scheduled a timer
//! (stage advance, reset), so stale timers are dropped instead of firing.

use std::time::{Duration, Instant};

use tracing::debug;

/// Transition a timer performs when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Move to the next stage after a win.
    AutoAdvance,
    /// Close the peek preview window.
    PeekWindowEnd,
    /// Raise the terminal game-over flag.
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub kind: TimerKind,
    pub due_at: Instant,
    pub epoch: u64,
}

/// Pending timers, kept sorted by due time.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    pending: Vec<PendingTimer>,
}

impl TimerQueue {
    pub fn schedule(&mut self, kind: TimerKind, now: Instant, delay: Duration, epoch: u64) {
        let timer = PendingTimer {
            kind,
            due_at: now + delay,
            epoch,
        };
        let idx = self
            .pending
            .partition_point(|existing| existing.due_at <= timer.due_at);
        self.pending.insert(idx, timer);
        debug!(?kind, delay_ms = delay.as_millis() as u64, epoch, "timer scheduled");
    }

    /// Remove every timer of `kind` regardless of epoch.
    pub fn cancel(&mut self, kind: TimerKind) {
        self.pending.retain(|timer| timer.kind != kind);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Drain timers due at `now`, returning those belonging to `epoch` in due order.
    ///
    /// Due timers from other epochs are discarded.
    pub fn due(&mut self, now: Instant, epoch: u64) -> Vec<TimerKind> {
        let split = self.pending.partition_point(|timer| timer.due_at <= now);
        let fired: Vec<PendingTimer> = self.pending.drain(..split).collect();
        let mut kinds = Vec::with_capacity(fired.len());
        for timer in fired {
            if timer.epoch == epoch {
                kinds.push(timer.kind);
            } else {
                debug!(kind = ?timer.kind, timer_epoch = timer.epoch, epoch, "dropping stale timer");
            }
        }
        kinds
    }

    /// Earliest due time of a timer that can still fire for `epoch`.
    pub fn next_due(&self, epoch: u64) -> Option<Instant> {
        self.pending
            .iter()
            .find(|timer| timer.epoch == epoch)
            .map(|timer| timer.due_at)
    }

    pub fn is_scheduled(&self, kind: TimerKind, epoch: u64) -> bool {
        self.pending
            .iter()
            .any(|timer| timer.kind == kind && timer.epoch == epoch)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
