//! First-press arbitration window.
//!
//! The first accepted detection of a round opens the window for its pair. If
//! the perpendicular pair also asks before the window closes it is recorded
//! as the second pair. Once the window has been open for its full length the
//! scheduler tick flushes it, yielding the pairs in the order they first
//! asked, and the window returns to closed.

use crate::approach::PairId;
use crate::timing::{Deadline, Millis};

/// Result of observing a detection against the window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WindowObservation {
    /// The window was closed and is now open for this pair.
    Opened,
    /// The perpendicular pair joined an open window.
    SecondPairRecorded,
    /// The window is already tracking this pair; only counts grow.
    AlreadyTracked,
}

/// Pairs released when a window closes, in request order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlushedRound {
    pub first: PairId,
    pub second: Option<PairId>,
    pub opened_at: Millis,
}

impl FlushedRound {
    /// Iterates the requested pairs in service order.
    pub fn pairs(&self) -> impl Iterator<Item = PairId> {
        core::iter::once(self.first).chain(self.second)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct OpenRound {
    opened_at: Millis,
    first: PairId,
    second: Option<PairId>,
}

#[derive(Clone, Debug)]
pub struct ArbitrationWindow {
    length_ms: u32,
    round: Option<OpenRound>,
}

impl ArbitrationWindow {
    #[must_use]
    pub const fn new(length_ms: u32) -> Self {
        Self {
            length_ms,
            round: None,
        }
    }

    /// Feeds an accepted detection for `pair` into the window.
    pub fn observe(&mut self, pair: PairId, now: Millis) -> WindowObservation {
        match &mut self.round {
            None => {
                self.round = Some(OpenRound {
                    opened_at: now,
                    first: pair,
                    second: None,
                });
                WindowObservation::Opened
            }
            Some(round) if round.first != pair && round.second.is_none() => {
                round.second = Some(pair);
                WindowObservation::SecondPairRecorded
            }
            Some(_) => WindowObservation::AlreadyTracked,
        }
    }

    /// Closes the window once it has been open for its full length.
    pub fn poll(&mut self, now: Millis) -> Option<FlushedRound> {
        let round = self.round?;
        if !now.has_reached(round.opened_at, self.length_ms) {
            return None;
        }

        self.round = None;
        Some(FlushedRound {
            first: round.first,
            second: round.second,
            opened_at: round.opened_at,
        })
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.round.is_some()
    }

    #[must_use]
    pub fn first_pair(&self) -> Option<PairId> {
        self.round.map(|round| round.first)
    }

    #[must_use]
    pub fn second_pair(&self) -> Option<PairId> {
        self.round.and_then(|round| round.second)
    }

    /// Deadline at which the open window will flush.
    #[must_use]
    pub fn deadline(&self) -> Option<Deadline> {
        self.round
            .map(|round| Deadline::new(round.opened_at, self.length_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pair_flushes_after_full_window() {
        let mut window = ArbitrationWindow::new(3_000);
        assert_eq!(window.observe(PairId::A, Millis(0)), WindowObservation::Opened);
        assert_eq!(window.poll(Millis(2_999)), None);

        let round = window.poll(Millis(3_000)).expect("window should flush");
        assert_eq!(round.first, PairId::A);
        assert_eq!(round.second, None);
        assert!(!window.is_open());
        assert_eq!(window.poll(Millis(3_001)), None);
    }

    #[test]
    fn opposite_pair_is_recorded_second() {
        let mut window = ArbitrationWindow::new(3_000);
        window.observe(PairId::A, Millis(0));
        assert_eq!(
            window.observe(PairId::B, Millis(500)),
            WindowObservation::SecondPairRecorded
        );

        let round = window.poll(Millis(3_000)).expect("window should flush");
        let order: heapless::Vec<PairId, 2> = round.pairs().collect();
        assert_eq!(order, [PairId::A, PairId::B]);
    }

    #[test]
    fn repeats_do_not_rearm_the_window() {
        let mut window = ArbitrationWindow::new(3_000);
        window.observe(PairId::B, Millis(100));
        assert_eq!(
            window.observe(PairId::B, Millis(2_000)),
            WindowObservation::AlreadyTracked
        );
        window.observe(PairId::A, Millis(2_100));
        assert_eq!(
            window.observe(PairId::A, Millis(2_200)),
            WindowObservation::AlreadyTracked
        );
        assert_eq!(
            window.observe(PairId::B, Millis(2_300)),
            WindowObservation::AlreadyTracked
        );

        let round = window.poll(Millis(3_100)).expect("flush at first deadline");
        assert_eq!(round.opened_at, Millis(100));
        assert_eq!(round.first, PairId::B);
        assert_eq!(round.second, Some(PairId::A));
    }

    #[test]
    fn window_deadline_tracks_open_round() {
        let mut window = ArbitrationWindow::new(3_000);
        assert_eq!(window.deadline(), None);
        window.observe(PairId::A, Millis(u32::MAX - 999));
        let deadline = window.deadline().expect("open window has a deadline");
        assert_eq!(deadline.expires_at(), Millis(2_000));
        assert!(window.poll(Millis(1_999)).is_none());
        assert!(window.poll(Millis(2_000)).is_some());
    }
}
