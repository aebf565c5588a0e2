//! Fixed-interval tick scheduling with a busy-poll window before each boundary
//!
//! Coarse timers alone land ticks late by up to a timer quantum; spinning alone
//! burns a core. The scheduler sleeps until shortly before the next boundary
//! and yields back to the runtime for the last `slack` of it.

use std::time::Duration;

use tokio::time::Instant;

/// What the room loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Run a simulation tick now
    Tick,
    /// Far from the boundary: sleep on the runtime timer
    Sleep(Duration),
    /// Within the slack window: reschedule immediately
    Yield,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    interval: Duration,
    slack: Duration,
    next_boundary: Instant,
}

impl TickScheduler {
    pub fn new(interval: Duration, slack: Duration, now: Instant) -> Self {
        Self {
            interval,
            slack: slack.min(interval),
            next_boundary: now + interval,
        }
    }

    pub fn next_boundary(&self) -> Instant {
        self.next_boundary
    }

    /// Decide what to do at `now`. On `Tick` the next boundary advances by one
    /// interval; if the loop fell a whole interval or more behind, the schedule
    /// restarts from `now` so only a single catch-up tick runs.
    pub fn poll(&mut self, now: Instant) -> TickDecision {
        if now >= self.next_boundary {
            let late = now - self.next_boundary;
            self.next_boundary = if late >= self.interval {
                now + self.interval
            } else {
                self.next_boundary + self.interval
            };
            return TickDecision::Tick;
        }

        let remaining = self.next_boundary - now;
        if remaining > self.slack {
            TickDecision::Sleep(remaining - self.slack)
        } else {
            TickDecision::Yield
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_sleeps_coarsely_then_busy_polls() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(ms(50), ms(4), t0);

        assert_eq!(s.poll(t0), TickDecision::Sleep(ms(46)));
        assert_eq!(s.poll(t0 + ms(40)), TickDecision::Sleep(ms(6)));
        assert_eq!(s.poll(t0 + ms(46)), TickDecision::Yield);
        assert_eq!(s.poll(t0 + ms(49)), TickDecision::Yield);
        assert_eq!(s.poll(t0 + ms(50)), TickDecision::Tick);
        assert_eq!(s.next_boundary(), t0 + ms(100));
    }

    #[test]
    fn test_small_lateness_keeps_the_grid() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(ms(50), ms(4), t0);
        assert_eq!(s.poll(t0 + ms(53)), TickDecision::Tick);
        assert_eq!(s.next_boundary(), t0 + ms(100));
    }

    #[test]
    fn test_large_drift_runs_one_catch_up_tick() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(ms(50), ms(4), t0);
        // stalled for several intervals
        let now = t0 + ms(260);
        assert_eq!(s.poll(now), TickDecision::Tick);
        assert_eq!(s.next_boundary(), now + ms(50));
        assert!(matches!(s.poll(now), TickDecision::Sleep(_)));
    }
}
