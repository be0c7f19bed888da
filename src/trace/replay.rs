//! Replay scheduler
//!
//! Two states. While `Idle` the cursor follows live arrivals; while `Running`
//! it starts at zero and advances one event per interval until it reaches
//! the total snapshotted at `start()`. Arrivals during a run are stored but
//! never move the cursor, and the cursor stays at the snapshot afterwards.
//!
//! The scheduler owns no timer. The dispatcher feeds it elapsed time via
//! `advance`, or whole periods via `tick`.

use std::time::Duration;

use tracing::info;

/// Default reveal cadence
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(600);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Running {
        /// Stored length when the replay started
        total: usize,
    },
}

#[derive(Debug, Clone)]
pub struct ReplayScheduler {
    state: ReplayState,
    cursor: usize,
    interval: Duration,
    /// Time accumulated toward the next tick
    carry: Duration,
}

impl ReplayScheduler {
    /// A scheduler in live mode showing `visible` events
    pub fn new(interval: Duration, visible: usize) -> Self {
        Self {
            state: ReplayState::Idle,
            cursor: visible,
            interval: interval.max(MIN_INTERVAL),
            carry: Duration::ZERO,
        }
    }

    /// Begin a replay over the first `stored_len` events.
    ///
    /// Returns false (and changes nothing) if a replay is already running.
    pub fn start(&mut self, stored_len: usize) -> bool {
        if self.is_running() {
            return false;
        }
        self.cursor = 0;
        self.carry = Duration::ZERO;
        if stored_len == 0 {
            // Nothing to reveal; the run is already complete
            self.state = ReplayState::Idle;
        } else {
            self.state = ReplayState::Running { total: stored_len };
        }
        info!(total = stored_len, "replay started");
        true
    }

    /// One interval has passed. Returns true if the cursor moved.
    pub fn tick(&mut self) -> bool {
        let ReplayState::Running { total } = self.state else {
            return false;
        };
        if self.cursor < total {
            self.cursor += 1;
        }
        if self.cursor >= total {
            self.finish();
        }
        true
    }

    /// Feed elapsed wall time; fires as many ticks as whole intervals fit.
    /// Returns the number of ticks fired.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        if !self.is_running() {
            self.carry = Duration::ZERO;
            return 0;
        }
        self.carry += elapsed;
        let mut fired = 0;
        while self.is_running() && self.carry >= self.interval {
            self.carry -= self.interval;
            self.tick();
            fired += 1;
        }
        fired
    }

    /// A live event was stored; `stored_len` is the new length.
    /// Only moves the cursor while idle. Returns true if it moved.
    pub fn on_arrival(&mut self, stored_len: usize) -> bool {
        if self.is_running() || self.cursor == stored_len {
            return false;
        }
        self.cursor = stored_len;
        true
    }

    /// Time left until the next tick, or None when idle
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        self.is_running()
            .then(|| self.interval.saturating_sub(self.carry))
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ReplayState::Running { .. })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Snapshot total of the active run
    pub fn total(&self) -> Option<usize> {
        match self.state {
            ReplayState::Running { total } => Some(total),
            ReplayState::Idle => None,
        }
    }

    fn finish(&mut self) {
        self.state = ReplayState::Idle;
        self.carry = Duration::ZERO;
        info!(cursor = self.cursor, "replay finished");
    }
}

impl Default for ReplayScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, 0)
    }
}
