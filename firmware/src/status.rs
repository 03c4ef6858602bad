#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics keep track of the rendered heads, pending counts, the
//! service phase, and the last telemetry event so the status heartbeat can
//! build a `StatusSnapshot` without locking the controller.

use intersection_core::approach::{APPROACH_COUNT, ApproachId, PairId, SignalOutput, SignalState};
use intersection_core::controller::ServicePhase;
use intersection_core::repl::status::StatusSnapshot;
use intersection_core::telemetry::TelemetryEventKind;
use portable_atomic::{AtomicU8, AtomicU16, Ordering};

const OUTPUT_OFF: u8 = 0;
const OUTPUT_STOP: u8 = 1;
const OUTPUT_CAUTION: u8 = 2;
const OUTPUT_GO: u8 = 3;

/// Last output written to each head.
static HEAD_OUTPUTS: [AtomicU8; APPROACH_COUNT] = [const { AtomicU8::new(OUTPUT_OFF) }; APPROACH_COUNT];
/// Pending vehicle counts per approach.
static PENDING: [AtomicU16; APPROACH_COUNT] = [const { AtomicU16::new(0) }; APPROACH_COUNT];
/// Packed phase (bits 0-1), current pair (bits 2-3), incoming pair (bits 4-5).
static SERVICE: AtomicU8 = AtomicU8::new(0);
/// Raw code (+1) of the most recent telemetry event (0 == none).
static LAST_EVENT: AtomicU16 = AtomicU16::new(0);

const fn encode_output(output: SignalOutput) -> u8 {
    match output {
        SignalOutput::Off => OUTPUT_OFF,
        SignalOutput::Stop => OUTPUT_STOP,
        SignalOutput::Caution => OUTPUT_CAUTION,
        SignalOutput::Go => OUTPUT_GO,
    }
}

/// Dark heads read as stop.
const fn decode_state(raw: u8) -> SignalState {
    match raw {
        OUTPUT_CAUTION => SignalState::Caution,
        OUTPUT_GO => SignalState::Go,
        _ => SignalState::Stop,
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn encode_pair(pair: Option<PairId>) -> u8 {
    match pair {
        None => 0,
        Some(pair) => pair.as_index() as u8 + 1,
    }
}

fn decode_pair(raw: u8) -> Option<PairId> {
    match raw {
        0 => None,
        value => PairId::from_index(usize::from(value) - 1),
    }
}

const fn encode_phase(phase: ServicePhase) -> u8 {
    match phase {
        ServicePhase::Idle => 0,
        ServicePhase::Go => 1,
        ServicePhase::HandoffCaution => 2,
    }
}

const fn decode_phase(raw: u8) -> ServicePhase {
    match raw {
        1 => ServicePhase::Go,
        2 => ServicePhase::HandoffCaution,
        _ => ServicePhase::Idle,
    }
}

/// Records the output last rendered on a head.
pub fn record_output(approach: ApproachId, output: SignalOutput) {
    HEAD_OUTPUTS[approach.as_index()].store(encode_output(output), Ordering::Relaxed);
}

/// Copies the counters and service phase out of a fresh controller snapshot.
pub fn publish(snapshot: &StatusSnapshot) {
    for (slot, count) in PENDING.iter().zip(snapshot.pending) {
        slot.store(count, Ordering::Relaxed);
    }
    let packed = encode_phase(snapshot.phase)
        | encode_pair(snapshot.current) << 2
        | encode_pair(snapshot.incoming) << 4;
    SERVICE.store(packed, Ordering::Relaxed);
}

/// Records the most recent telemetry event.
pub fn record_event(event: TelemetryEventKind) {
    LAST_EVENT.store(event.to_raw().wrapping_add(1), Ordering::Relaxed);
}

/// Returns the most recent telemetry event, if any.
pub fn last_event() -> Option<TelemetryEventKind> {
    match LAST_EVENT.load(Ordering::Relaxed) {
        0 => None,
        raw => Some(TelemetryEventKind::from_raw(raw - 1)),
    }
}

/// Returns the rendered head state of every approach.
pub fn head_states() -> [SignalState; APPROACH_COUNT] {
    ApproachId::ALL.map(|approach| {
        decode_state(HEAD_OUTPUTS[approach.as_index()].load(Ordering::Relaxed))
    })
}

/// Builds a [`StatusSnapshot`] from the stored metrics.
///
/// Queue and window contents are not mirrored and read as empty.
pub fn snapshot() -> StatusSnapshot {
    let packed = SERVICE.load(Ordering::Relaxed);
    let mut snapshot = StatusSnapshot::idle();
    snapshot.signals = head_states();
    snapshot.pending = PENDING
        .each_ref()
        .map(|slot| slot.load(Ordering::Relaxed));
    snapshot.phase = decode_phase(packed & 0b11);
    snapshot.current = decode_pair((packed >> 2) & 0b11);
    snapshot.incoming = decode_pair((packed >> 4) & 0b11);
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    // Statics are process-wide and the sink tests write East, so this test
    // only inspects North and South.
    #[test]
    fn snapshot_reflects_recorded_state() {
        record_output(ApproachId::North, SignalOutput::Off);
        assert_eq!(head_states()[ApproachId::North.as_index()], SignalState::Stop);

        record_output(ApproachId::North, SignalOutput::Caution);
        record_output(ApproachId::South, SignalOutput::Caution);

        let mut published = StatusSnapshot::idle();
        published.pending = [0, 2, 0, 5];
        published.phase = ServicePhase::HandoffCaution;
        published.current = Some(PairId::A);
        published.incoming = Some(PairId::B);
        publish(&published);

        let restored = snapshot();
        assert_eq!(restored.signals[ApproachId::North.as_index()], SignalState::Caution);
        assert_eq!(restored.signals[ApproachId::South.as_index()], SignalState::Caution);
        assert_eq!(restored.pending, [0, 2, 0, 5]);
        assert_eq!(restored.phase, ServicePhase::HandoffCaution);
        assert_eq!(restored.current, Some(PairId::A));
        assert_eq!(restored.incoming, Some(PairId::B));
        assert!(restored.queue.is_empty());
        assert_eq!(restored.window, None);
    }

    #[test]
    fn recorded_event_is_visible() {
        record_event(TelemetryEventKind::ServiceStarted(PairId::B));
        assert!(last_event().is_some());
    }
}
