//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Stopwatch for phase timeouts.
///
/// Readings are taken against a caller-supplied `now` (Unix millis) so the
/// simulation decides what time it is once per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchTimer {
    start_ms: u64,
}

impl MatchTimer {
    pub fn started_at(now_ms: u64) -> Self {
        Self { start_ms: now_ms }
    }

    pub fn start(&mut self, now_ms: u64) {
        self.start_ms = now_ms;
    }

    /// Milliseconds since the last `start`; never negative
    pub fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed() {
        let mut timer = MatchTimer::started_at(1_000);
        assert_eq!(timer.elapsed(1_000), 0);
        assert_eq!(timer.elapsed(1_250), 250);
        timer.start(2_000);
        assert_eq!(timer.elapsed(2_100), 100);
    }

    #[test]
    fn test_timer_never_goes_negative() {
        let timer = MatchTimer::started_at(5_000);
        assert_eq!(timer.elapsed(4_000), 0);
    }
}
