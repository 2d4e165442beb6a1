//! Clock arithmetic, free of channels and tasks.
//!
//! Every method takes `now` explicitly so the actor loop, state reads and
//! tests all agree on what instant they are talking about.

use std::time::Duration;

use duelhall_protocol::{ClockReadout, Color};
use tokio::time::Instant;

use crate::ClockConfig;

/// A consistent reading of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    /// Remaining time per side, indexed by [`Color::index`]. For the side
    /// to move this is projected to the instant of the reading.
    pub remaining: [Duration; 2],
    /// Side whose time is running (or would be, once started).
    pub turn: Color,
    /// Side that ran out of time, if any.
    pub flagged: Option<Color>,
    /// Started and not yet stopped or flagged.
    pub running: bool,
    pub paused: bool,
}

impl ClockState {
    pub fn remaining(&self, color: Color) -> Duration {
        self.remaining[color.index()]
    }

    /// Millisecond view for snapshots.
    pub fn readout(&self) -> ClockReadout {
        ClockReadout {
            white_ms: millis(self.remaining(Color::White)),
            black_ms: millis(self.remaining(Color::Black)),
            running: self.running && !self.paused,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug)]
pub(crate) struct ClockCore {
    config: ClockConfig,
    /// Budget per side; grows by the increment after each move.
    allotted: [Duration; 2],
    /// Time charged per side. Never exceeds `allotted`.
    elapsed: [Duration; 2],
    turn: Color,
    /// Instant of the last flip (or of `start`).
    last_flip: Option<Instant>,
    first_move: bool,
    paused_at: Option<Instant>,
    flagged: Option<Color>,
    running: bool,
}

impl ClockCore {
    pub(crate) fn new(config: ClockConfig) -> Self {
        Self {
            config,
            allotted: [config.white.allotted, config.black.allotted],
            elapsed: [Duration::ZERO; 2],
            turn: Color::White,
            last_flip: None,
            first_move: true,
            paused_at: None,
            flagged: None,
            running: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    pub(crate) fn start(&mut self, now: Instant) {
        if self.running || self.flagged.is_some() {
            return;
        }
        self.running = true;
        self.last_flip = Some(now);
    }

    fn delay(&self, color: Color) -> Duration {
        self.config.side(color).delay
    }

    fn stored_remaining(&self, color: Color) -> Duration {
        let i = color.index();
        self.allotted[i].saturating_sub(self.elapsed[i])
    }

    /// Time the side to move has used since the last flip, after the delay.
    fn accrued(&self, now: Instant) -> Duration {
        if !self.running || self.first_move {
            return Duration::ZERO;
        }
        let Some(since) = self.last_flip else {
            return Duration::ZERO;
        };
        let until = self.paused_at.unwrap_or(now);
        until
            .saturating_duration_since(since)
            .saturating_sub(self.delay(self.turn))
    }

    /// Remaining time for `color`, projected to `now` for the side to move.
    pub(crate) fn estimate(&self, color: Color, now: Instant) -> Duration {
        let stored = self.stored_remaining(color);
        if color == self.turn {
            stored.saturating_sub(self.accrued(now))
        } else {
            stored
        }
    }

    /// Charges the side that just moved and hands the turn over.
    ///
    /// The game's first flip is free. Returns the flagged side when the
    /// charge exhausts the mover's budget; the clock stops in that case.
    pub(crate) fn flip(&mut self, now: Instant) -> Option<Color> {
        if !self.running {
            return self.flagged;
        }
        let mover = self.turn;
        let i = mover.index();
        if self.first_move {
            self.first_move = false;
        } else {
            let charge = self.accrued(now);
            self.elapsed[i] = self.elapsed[i].saturating_add(charge).min(self.allotted[i]);
            if self.elapsed[i] >= self.allotted[i] {
                self.flag(mover);
                return self.flagged;
            }
        }
        self.allotted[i] = self.allotted[i].saturating_add(self.config.side(mover).increment);
        self.turn = mover.opposite();
        self.last_flip = Some(now);
        if self.paused_at.is_some() {
            self.paused_at = Some(now);
        }
        None
    }

    /// Flags the side to move if its projected time is gone.
    pub(crate) fn check_flag(&mut self, now: Instant) -> Option<Color> {
        if self.running && self.paused_at.is_none() && !self.first_move {
            let turn = self.turn;
            if self.estimate(turn, now).is_zero() {
                self.flag(turn);
            }
        }
        self.flagged
    }

    fn flag(&mut self, color: Color) {
        let i = color.index();
        self.elapsed[i] = self.allotted[i];
        self.flagged = Some(color);
        self.running = false;
    }

    pub(crate) fn pause(&mut self, now: Instant) {
        if self.running && self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub(crate) fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            if let Some(last) = self.last_flip {
                let shifted = last.checked_add(now.saturating_duration_since(paused_at));
                self.last_flip = Some(shifted.unwrap_or(now));
            }
        }
    }

    /// Freezes the current projection into the stored values.
    pub(crate) fn stop(&mut self, now: Instant) {
        if self.running {
            let i = self.turn.index();
            self.elapsed[i] = self.elapsed[i]
                .saturating_add(self.accrued(now))
                .min(self.allotted[i]);
            self.running = false;
        }
    }

    /// When the side to move will run out, if time is running. `None` also
    /// when the deadline lies beyond what an `Instant` can represent.
    pub(crate) fn flag_deadline(&self) -> Option<Instant> {
        if !self.running || self.paused_at.is_some() || self.first_move {
            return None;
        }
        let budget = self
            .delay(self.turn)
            .saturating_add(self.stored_remaining(self.turn));
        self.last_flip?.checked_add(budget)
    }

    /// Reading at `now`. A side whose projection reached zero is reported
    /// as flagged even before the loop records it.
    pub(crate) fn state(&self, now: Instant) -> ClockState {
        let remaining = [
            self.estimate(Color::White, now),
            self.estimate(Color::Black, now),
        ];
        let mut flagged = self.flagged;
        if flagged.is_none()
            && self.running
            && !self.first_move
            && self.paused_at.is_none()
            && remaining[self.turn.index()].is_zero()
        {
            flagged = Some(self.turn);
        }
        ClockState {
            remaining,
            turn: self.turn,
            flagged,
            running: self.running && flagged.is_none(),
            paused: self.paused_at.is_some(),
        }
    }
}
