//! Wrapping millisecond clock and the timing constants of the controller.
//!
//! The hardware clock is a free-running `u32` millisecond counter that wraps
//! after roughly 49.7 days. Every elapsed-time comparison goes through
//! [`Millis::elapsed_since`], which uses wrapping subtraction so deadlines keep
//! working across the rollover.

use core::fmt;
use core::time::Duration;

use crate::telemetry::TelemetryInstant;

/// Instant on the wrapping millisecond timeline.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Millis(pub u32);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    #[must_use]
    pub const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    #[must_use]
    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, modulo 2^32.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Instant `millis` after `self`, wrapping at the counter width.
    #[must_use]
    pub const fn offset(self, millis: u32) -> Millis {
        Millis(self.0.wrapping_add(millis))
    }

    /// Returns `true` once at least `period` milliseconds have passed since `start`.
    #[must_use]
    pub const fn has_reached(self, start: Millis, period: u32) -> bool {
        self.elapsed_since(start) >= period
    }
}

impl TelemetryInstant for Millis {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(u64::from(self.elapsed_since(earlier)))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Armed deadline: an absolute start instant plus a period.
///
/// Deadlines are stored as `(start, period)` rather than `start + period` so
/// the comparison stays correct when the sum wraps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Deadline {
    pub armed_at: Millis,
    pub period_ms: u32,
}

impl Deadline {
    #[must_use]
    pub const fn new(armed_at: Millis, period_ms: u32) -> Self {
        Self {
            armed_at,
            period_ms,
        }
    }

    #[must_use]
    pub const fn has_elapsed(self, now: Millis) -> bool {
        now.has_reached(self.armed_at, self.period_ms)
    }

    /// Milliseconds left before the deadline elapses (zero once it has).
    #[must_use]
    pub const fn remaining(self, now: Millis) -> u32 {
        self.period_ms
            .saturating_sub(now.elapsed_since(self.armed_at))
    }

    #[must_use]
    pub const fn expires_at(self) -> Millis {
        self.armed_at.offset(self.period_ms)
    }
}

/// Refractory period per approach before another detection is counted.
pub const DEBOUNCE_MS: u32 = 100;

/// Length of the request-ordering window opened by the first detection of a round.
pub const ARBITRATION_WINDOW_MS: u32 = 3_000;

/// Time the outgoing pair spends at caution before the incoming pair may go.
pub const CAUTION_MS: u32 = 1_000;

/// Period of the scheduler tick.
pub const TICK_PERIOD_MS: u32 = 1;

/// Timing parameters consumed by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingConfig {
    pub debounce_ms: u32,
    pub arbitration_window_ms: u32,
    pub caution_ms: u32,
    pub tick_period_ms: u32,
}

impl TimingConfig {
    pub const DEFAULT: TimingConfig = TimingConfig::new(
        DEBOUNCE_MS,
        ARBITRATION_WINDOW_MS,
        CAUTION_MS,
        TICK_PERIOD_MS,
    );

    #[must_use]
    pub const fn new(
        debounce_ms: u32,
        arbitration_window_ms: u32,
        caution_ms: u32,
        tick_period_ms: u32,
    ) -> Self {
        Self {
            debounce_ms,
            arbitration_window_ms,
            caution_ms,
            tick_period_ms,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
