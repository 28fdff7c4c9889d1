//! Rest timer between sets.
//!
//! A wall-clock-based state machine. It does not use internal threads -
//! the caller is responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Completed
//!          \______ skip ______/-> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = RestTimer::new();
//! timer.start(Duration::from_secs(90));
//! // In a loop:
//! timer.tick(); // Returns Some(Event::RestCompleted) when rest is over
//! ```

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestTimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Countdown for the rest period after a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestTimer {
    state: RestTimerState,
    /// Length of the current rest period in milliseconds.
    total_ms: u64,
    /// Remaining time in milliseconds.
    remaining_ms: u64,
    /// Timestamp (ms since epoch) of the last flush while running.
    #[serde(default)]
    last_tick_epoch_ms: Option<u64>,
}

impl Default for RestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTimer {
    pub fn new() -> Self {
        Self {
            state: RestTimerState::Idle,
            total_ms: 0,
            remaining_ms: 0,
            last_tick_epoch_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> RestTimerState {
        self.state
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// 0.0 .. 1.0 progress through the rest period.
    pub fn progress(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms as f64 / self.total_ms as f64)
    }

    pub fn snapshot(&self) -> Event {
        Event::RestSnapshot {
            state: self.state,
            remaining_ms: self.remaining_ms,
            total_ms: self.total_ms,
            progress: self.progress(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts a fresh rest period, replacing any running one.
    pub fn start(&mut self, duration: Duration) -> Option<Event> {
        self.start_at(duration, now_ms())
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.pause_at(now_ms())
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.resume_at(now_ms())
    }

    /// Ends the rest early and returns to `Idle`.
    pub fn skip(&mut self) -> Option<Event> {
        match self.state {
            RestTimerState::Running | RestTimerState::Paused => {
                self.flush_elapsed(now_ms());
                let remaining_ms = self.remaining_ms;
                self.reset();
                Some(Event::RestSkipped {
                    remaining_ms,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Adds (or with a negative delta removes) rest time.
    pub fn adjust(&mut self, delta_secs: i64) -> Option<Event> {
        self.adjust_at(delta_secs, now_ms())
    }

    /// Call periodically. Returns `Some(Event::RestCompleted)` when rest is over.
    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(now_ms())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn start_at(&mut self, duration: Duration, now: u64) -> Option<Event> {
        let ms = duration.as_millis() as u64;
        self.state = RestTimerState::Running;
        self.total_ms = ms;
        self.remaining_ms = ms;
        self.last_tick_epoch_ms = Some(now);
        Some(Event::RestStarted {
            duration_secs: duration.as_secs(),
            at: Utc::now(),
        })
    }

    fn pause_at(&mut self, now: u64) -> Option<Event> {
        if self.state != RestTimerState::Running {
            return None;
        }
        self.flush_elapsed(now);
        self.state = RestTimerState::Paused;
        self.last_tick_epoch_ms = None;
        Some(Event::RestPaused {
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    fn resume_at(&mut self, now: u64) -> Option<Event> {
        if self.state != RestTimerState::Paused {
            return None;
        }
        self.state = RestTimerState::Running;
        self.last_tick_epoch_ms = Some(now);
        Some(Event::RestResumed {
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    fn adjust_at(&mut self, delta_secs: i64, now: u64) -> Option<Event> {
        if !matches!(self.state, RestTimerState::Running | RestTimerState::Paused) {
            return None;
        }
        self.flush_elapsed(now);
        let delta_ms = delta_secs.unsigned_abs().saturating_mul(1000);
        if delta_secs >= 0 {
            self.remaining_ms = self.remaining_ms.saturating_add(delta_ms);
            self.total_ms = self.total_ms.saturating_add(delta_ms);
        } else {
            self.remaining_ms = self.remaining_ms.saturating_sub(delta_ms);
        }
        Some(Event::RestAdjusted {
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    fn tick_at(&mut self, now: u64) -> Option<Event> {
        if self.state != RestTimerState::Running {
            return None;
        }
        self.flush_elapsed(now);
        if self.remaining_ms == 0 {
            self.state = RestTimerState::Completed;
            self.last_tick_epoch_ms = None;
            return Some(Event::RestCompleted { at: Utc::now() });
        }
        None
    }

    fn flush_elapsed(&mut self, now: u64) {
        if let Some(last) = self.last_tick_epoch_ms {
            let elapsed = now.saturating_sub(last);
            self.remaining_ms = self.remaining_ms.saturating_sub(elapsed);
            self.last_tick_epoch_ms = Some(now);
        }
    }

    fn reset(&mut self) {
        self.state = RestTimerState::Idle;
        self.total_ms = 0;
        self.remaining_ms = 0;
        self.last_tick_epoch_ms = None;
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
