//! Session countdown and per-question elapsed-time measurement.
//!
//! Both timers are plain state machines: the caller feeds them ticks and
//! instants, which keeps them deterministic under a simulated clock. The
//! one-second interval that drives [`Countdown::tick`] lives with the caller
//! (see [`crate::session::ActiveTryout::tick`]).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// State of the whole-session countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Running { remaining_secs: u64 },
    Expired,
}

/// Result of one decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still running with this many seconds left.
    Running(u64),
    /// The budget just ran out. Reported exactly once per start.
    Expired,
    /// Not running; the tick had no effect.
    Inactive,
}

/// Whole-session time budget with one-second resolution.
#[derive(Debug, Clone)]
pub struct Countdown {
    state: CountdownState,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self {
            state: CountdownState::Idle,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Idle → Running with `budget_secs` left. Ignored unless idle.
    pub fn start(&mut self, budget_secs: u64) {
        if self.state == CountdownState::Idle {
            self.state = if budget_secs == 0 {
                CountdownState::Expired
            } else {
                CountdownState::Running {
                    remaining_secs: budget_secs,
                }
            };
        }
    }

    /// Decrement by one second.
    pub fn tick(&mut self) -> Tick {
        match self.state {
            CountdownState::Running { remaining_secs } => {
                let remaining = remaining_secs.saturating_sub(1);
                if remaining == 0 {
                    self.state = CountdownState::Expired;
                    Tick::Expired
                } else {
                    self.state = CountdownState::Running {
                        remaining_secs: remaining,
                    };
                    Tick::Running(remaining)
                }
            }
            CountdownState::Idle | CountdownState::Expired => Tick::Inactive,
        }
    }

    /// Stop a running countdown. Further ticks are inert.
    pub fn cancel(&mut self) {
        if matches!(self.state, CountdownState::Running { .. }) {
            self.state = CountdownState::Idle;
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        match self.state {
            CountdownState::Running { remaining_secs } => remaining_secs,
            CountdownState::Idle | CountdownState::Expired => 0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, CountdownState::Running { .. })
    }

    pub fn is_expired(&self) -> bool {
        self.state == CountdownState::Expired
    }
}

/// How elapsed time is measured when a question is displayed again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisitPolicy {
    /// Restart measurement on every fresh display.
    #[default]
    Reset,
    /// Add time from earlier visits to the current one.
    Accumulate,
}

/// Per-question stopwatch.
#[derive(Debug, Clone)]
pub struct QuestionTimer {
    policy: RevisitPolicy,
    current: Option<(usize, Instant)>,
    banked: HashMap<usize, Duration>,
}

impl QuestionTimer {
    pub fn new(policy: RevisitPolicy) -> Self {
        Self {
            policy,
            current: None,
            banked: HashMap::new(),
        }
    }

    pub fn policy(&self) -> RevisitPolicy {
        self.policy
    }

    /// Index currently on display.
    pub fn current_index(&self) -> Option<usize> {
        self.current.map(|(index, _)| index)
    }

    /// Record that question `index` is displayed at `now`.
    ///
    /// Displaying the index already on screen changes nothing.
    pub fn display(&mut self, index: usize, now: Instant) {
        if let Some((shown, started)) = self.current {
            if shown == index {
                return;
            }
            if self.policy == RevisitPolicy::Accumulate {
                *self.banked.entry(shown).or_default() += now.saturating_duration_since(started);
            }
        }
        self.current = Some((index, now));
    }

    /// Whole seconds spent on the displayed question as of `now`.
    pub fn elapsed_secs(&self, now: Instant) -> u64 {
        let Some((index, started)) = self.current else {
            return 0;
        };
        let mut elapsed = now.saturating_duration_since(started);
        if self.policy == RevisitPolicy::Accumulate {
            elapsed += self.banked.get(&index).copied().unwrap_or_default();
        }
        elapsed.as_secs()
    }
}

/// Render seconds as `h:mm:ss` (one hour or more) or `m:ss`.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_exactly_budget_ticks() {
        for minutes in [1u64, 2, 110] {
            let mut countdown = Countdown::new();
            countdown.start(minutes * 60);
            let mut ticks = 0;
            loop {
                ticks += 1;
                if countdown.tick() == Tick::Expired {
                    break;
                }
                assert!(ticks < minutes * 60, "ran past the budget");
            }
            assert_eq!(ticks, minutes * 60);
            assert!(countdown.is_expired());
        }
    }

    #[test]
    fn expiry_is_reported_once() {
        let mut countdown = Countdown::new();
        countdown.start(2);
        assert_eq!(countdown.tick(), Tick::Running(1));
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Inactive);
        assert_eq!(countdown.tick(), Tick::Inactive);
    }

    #[test]
    fn cancel_stops_ticks() {
        let mut countdown = Countdown::new();
        countdown.start(60);
        countdown.tick();
        countdown.cancel();
        assert_eq!(countdown.state(), CountdownState::Idle);
        assert_eq!(countdown.tick(), Tick::Inactive);
        assert_eq!(countdown.remaining_secs(), 0);
    }

    #[test]
    fn start_is_ignored_while_running() {
        let mut countdown = Countdown::new();
        countdown.start(10);
        countdown.tick();
        countdown.start(500);
        assert_eq!(countdown.remaining_secs(), 9);
    }

    #[test]
    fn reset_policy_restarts_on_revisit() {
        let t0 = Instant::now();
        let mut timer = QuestionTimer::new(RevisitPolicy::Reset);
        timer.display(0, t0);
        timer.display(1, t0 + Duration::from_secs(20));
        timer.display(0, t0 + Duration::from_secs(30));
        assert_eq!(timer.elapsed_secs(t0 + Duration::from_secs(35)), 5);
    }

    #[test]
    fn accumulate_policy_adds_earlier_visits() {
        let t0 = Instant::now();
        let mut timer = QuestionTimer::new(RevisitPolicy::Accumulate);
        timer.display(0, t0);
        timer.display(1, t0 + Duration::from_secs(20));
        timer.display(0, t0 + Duration::from_secs(30));
        assert_eq!(timer.elapsed_secs(t0 + Duration::from_secs(35)), 25);
    }

    #[test]
    fn redisplaying_same_index_keeps_start() {
        let t0 = Instant::now();
        let mut timer = QuestionTimer::new(RevisitPolicy::Reset);
        timer.display(3, t0);
        timer.display(3, t0 + Duration::from_secs(10));
        assert_eq!(timer.elapsed_secs(t0 + Duration::from_millis(12_900)), 12);
        assert_eq!(timer.current_index(), Some(3));
    }

    #[test]
    fn format_clock_shapes() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(6600), "1:50:00");
        assert_eq!(format_clock(3661), "1:01:01");
    }
}
