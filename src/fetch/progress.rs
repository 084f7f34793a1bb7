//! Wall-clock throttling for progress log events.

use std::time::{Duration, Instant};

/// Default minimum spacing between logged progress events.
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Rate limiter keyed on elapsed wall time, not event count.
///
/// Fast terminals can emit hundreds of progress lines per second; at most
/// one per interval reaches the log sink regardless of percent granularity.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum spacing.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether an event arriving now should be logged.
    ///
    /// The first event is always allowed; later events are allowed once the
    /// interval has elapsed since the last allowed event.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(previous) if now.duration_since(previous) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_LOG_INTERVAL)
    }
}
