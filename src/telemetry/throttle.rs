//! Throttle for user-visible failure notices.

use std::time::{Duration, Instant};

/// Lets at most one notice through per window.
#[derive(Debug, Clone)]
pub struct FailureThrottle {
    window: Duration,
    last_emitted: Option<Instant>,
}

impl FailureThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emitted: None,
        }
    }

    /// Whether a notice may be emitted at `now`. Records the emission if so.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        let open = match self.last_emitted {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.window,
        };
        if open {
            self.last_emitted = Some(now);
        }
        open
    }
}
