//! Connection Monitor - tracks the last time any byte arrived from the sensor
//!
//! Timestamps are microseconds on a monotonic clock anchored at first use,
//! so they are unaffected by wall clock changes and fit in an `AtomicU64`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// Monotonic microseconds since the process first asked for the time
pub fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Link activity monitor
#[derive(Debug)]
pub struct ConnectionMonitor {
    last_activity: AtomicU64,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            last_activity: AtomicU64::new(monotonic_micros()),
        }
    }

    /// Record inbound traffic
    pub fn register_activity(&self) {
        self.last_activity.store(monotonic_micros(), Ordering::Relaxed);
    }

    /// Monotonic timestamp (µs) of the last inbound traffic
    pub fn last_activity_us(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    pub fn time_since_last_activity(&self) -> Duration {
        let elapsed = monotonic_micros().saturating_sub(self.last_activity_us());
        Duration::from_micros(elapsed)
    }

    /// True when nothing arrived within `threshold`
    pub fn is_idle(&self, threshold: Duration) -> bool {
        self.time_since_last_activity() >= threshold
    }

    /// Reset to "just heard from the device"
    pub fn reset(&self) {
        self.register_activity();
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}
