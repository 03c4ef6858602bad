//! Signal model and the light-output seam.

use crate::approach::{APPROACH_COUNT, ApproachId, PairId, SignalOutput, SignalState};

/// Abstraction over the physical light drivers.
pub trait SignalSink {
    /// Renders the requested output on one approach head.
    fn set_signal(&mut self, approach: ApproachId, output: SignalOutput);

    /// Renders the same output on both approaches of a pair.
    fn set_pair(&mut self, pair: PairId, output: SignalOutput) {
        for approach in pair.approaches() {
            self.set_signal(approach, output);
        }
    }

    /// Drives every head dark.
    fn blank_all(&mut self) {
        for approach in ApproachId::ALL {
            self.set_signal(approach, SignalOutput::Off);
        }
    }
}

/// Signal sink that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSignalSink;

impl NoopSignalSink {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SignalSink for NoopSignalSink {
    fn set_signal(&mut self, _: ApproachId, _: SignalOutput) {}
}

impl<T: SignalSink + ?Sized> SignalSink for &mut T {
    fn set_signal(&mut self, approach: ApproachId, output: SignalOutput) {
        (**self).set_signal(approach, output);
    }
}

/// Per-approach signal states, written a pair at a time.
///
/// Both approaches of a pair always hold the same state; the only mutator
/// takes a [`PairId`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PairSignals {
    states: [SignalState; APPROACH_COUNT],
}

impl PairSignals {
    /// Every approach held at stop.
    #[must_use]
    pub const fn all_stop() -> Self {
        Self {
            states: [SignalState::Stop; APPROACH_COUNT],
        }
    }

    #[must_use]
    pub const fn approach(&self, approach: ApproachId) -> SignalState {
        self.states[approach.as_index()]
    }

    #[must_use]
    pub const fn pair(&self, pair: PairId) -> SignalState {
        self.approach(pair.approaches()[0])
    }

    /// Moves `pair` to `state`, mirroring the change to `sink`.
    ///
    /// Returns `false` without touching the sink when the pair already holds
    /// `state`. Caution is only entered from go; asking a stopped pair for
    /// caution is ignored.
    pub fn transition<S: SignalSink + ?Sized>(
        &mut self,
        pair: PairId,
        state: SignalState,
        sink: &mut S,
    ) -> bool {
        let current = self.pair(pair);
        if current == state || (state == SignalState::Caution && current == SignalState::Stop) {
            return false;
        }

        for approach in pair.approaches() {
            self.states[approach.as_index()] = state;
        }
        sink.set_pair(pair, state.into());
        true
    }

    /// Pushes every approach state to `sink`, regardless of what it last showed.
    pub fn render_all<S: SignalSink + ?Sized>(&self, sink: &mut S) {
        for pair in PairId::ALL {
            sink.set_pair(pair, self.pair(pair).into());
        }
    }

    /// Returns `true` when at most one pair is away from stop.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        PairId::ALL
            .iter()
            .filter(|pair| self.pair(**pair) != SignalState::Stop)
            .count()
            <= 1
    }

    #[must_use]
    pub const fn as_array(&self) -> [SignalState; APPROACH_COUNT] {
        self.states
    }
}

impl Default for PairSignals {
    fn default() -> Self {
        Self::all_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<(ApproachId, SignalOutput), 16>,
    }

    impl SignalSink for RecordingSink {
        fn set_signal(&mut self, approach: ApproachId, output: SignalOutput) {
            self.writes
                .push((approach, output))
                .expect("recording sink capacity");
        }
    }

    #[test]
    fn transition_writes_both_members_of_pair() {
        let mut signals = PairSignals::all_stop();
        let mut sink = RecordingSink::default();

        assert!(signals.transition(PairId::B, SignalState::Go, &mut sink));
        assert_eq!(
            sink.writes.as_slice(),
            &[
                (ApproachId::East, SignalOutput::Go),
                (ApproachId::West, SignalOutput::Go)
            ]
        );
        assert_eq!(signals.approach(ApproachId::East), SignalState::Go);
        assert_eq!(signals.approach(ApproachId::West), SignalState::Go);
        assert_eq!(signals.pair(PairId::A), SignalState::Stop);
    }

    #[test]
    fn redundant_transitions_skip_the_sink() {
        let mut signals = PairSignals::all_stop();
        let mut sink = RecordingSink::default();

        assert!(!signals.transition(PairId::A, SignalState::Stop, &mut sink));
        assert!(!signals.transition(PairId::A, SignalState::Caution, &mut sink));
        assert!(sink.writes.is_empty());
        assert_eq!(signals, PairSignals::all_stop());
    }

    #[test]
    fn exclusivity_flags_two_active_pairs() {
        let mut signals = PairSignals::all_stop();
        let mut sink = NoopSignalSink::new();
        signals.transition(PairId::A, SignalState::Go, &mut sink);
        assert!(signals.is_exclusive());
        signals.transition(PairId::A, SignalState::Caution, &mut sink);
        assert!(signals.is_exclusive());
        signals.transition(PairId::B, SignalState::Go, &mut sink);
        assert!(!signals.is_exclusive());
    }

    #[test]
    fn blank_all_turns_every_head_off() {
        let mut sink = RecordingSink::default();
        sink.blank_all();
        assert_eq!(sink.writes.len(), 4);
        assert!(
            sink.writes
                .iter()
                .all(|(_, output)| *output == SignalOutput::Off)
        );
    }
}
