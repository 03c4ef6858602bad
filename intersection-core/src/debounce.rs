//! Per-approach refractory filter for detection events.
//!
//! A detection is accepted when no earlier detection on the same approach was
//! accepted within the debounce period. The very first detection on an
//! approach is always accepted. Suppressed detections do not move the
//! reference timestamp, so a steady stream of chatter spaced under the period
//! still lets one event through per period.

use crate::approach::{APPROACH_COUNT, ApproachId};
use crate::timing::Millis;

/// Outcome of feeding a detection through the filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DebounceVerdict {
    Accepted,
    /// Rejected; carries the milliseconds since the last accepted detection.
    Suppressed { since_last_ms: u32 },
}

impl DebounceVerdict {
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, DebounceVerdict::Accepted)
    }
}

/// Tracks the last accepted detection per approach.
#[derive(Clone, Debug)]
pub struct DebounceFilter {
    period_ms: u32,
    last_accepted: [Option<Millis>; APPROACH_COUNT],
}

impl DebounceFilter {
    #[must_use]
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_accepted: [None; APPROACH_COUNT],
        }
    }

    pub fn observe(&mut self, approach: ApproachId, now: Millis) -> DebounceVerdict {
        let slot = &mut self.last_accepted[approach.as_index()];
        match *slot {
            Some(previous) if !now.has_reached(previous, self.period_ms) => {
                DebounceVerdict::Suppressed {
                    since_last_ms: now.elapsed_since(previous),
                }
            }
            _ => {
                *slot = Some(now);
                DebounceVerdict::Accepted
            }
        }
    }

    /// Forgets accepted detections whose refractory period has passed.
    ///
    /// Called every tick so a stored timestamp never lives long enough to
    /// alias after the clock wraps.
    pub fn expire(&mut self, now: Millis) {
        for slot in &mut self.last_accepted {
            if slot.is_some_and(|previous| now.has_reached(previous, self.period_ms)) {
                *slot = None;
            }
        }
    }

    /// Timestamp of the last accepted detection for `approach`.
    #[must_use]
    pub fn last_accepted(&self, approach: ApproachId) -> Option<Millis> {
        self.last_accepted[approach.as_index()]
    }

    #[must_use]
    pub const fn period_ms(&self) -> u32 {
        self.period_ms
    }
}
