//! Shared status surface for the console.
//!
//! [`StatusSnapshot`] is a plain copy of the controller state that can be
//! captured inside a critical section and rendered later. [`StatusFormatter`]
//! keeps the textual rendering consistent across front-ends.

use core::fmt;

use heapless::Vec;

use crate::approach::{APPROACH_COUNT, ApproachId, PAIR_COUNT, PairId, SignalState, approach_by_id};
use crate::controller::{IntersectionController, ServicePhase, SignalSink};
use crate::timing::Millis;

/// Open arbitration window as seen by the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub first: PairId,
    pub second: Option<PairId>,
    pub remaining_ms: u32,
}

/// Snapshot of the controller surfaced by the `status` command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub signals: [SignalState; APPROACH_COUNT],
    pub pending: [u16; APPROACH_COUNT],
    pub phase: ServicePhase,
    pub current: Option<PairId>,
    pub incoming: Option<PairId>,
    /// Time left in the current phase; `None` when no deadline is armed.
    pub phase_remaining_ms: Option<u32>,
    pub released: bool,
    pub queue: Vec<PairId, PAIR_COUNT>,
    pub window: Option<WindowSnapshot>,
}

impl StatusSnapshot {
    /// All-stop, idle snapshot.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            signals: [SignalState::Stop; APPROACH_COUNT],
            pending: [0; APPROACH_COUNT],
            phase: ServicePhase::Idle,
            current: None,
            incoming: None,
            phase_remaining_ms: None,
            released: false,
            queue: Vec::new(),
            window: None,
        }
    }

    /// Copies the observable state of `controller` at `now`.
    pub fn capture<S: SignalSink>(controller: &IntersectionController<S>, now: Millis) -> Self {
        let service = controller.service();
        let window = controller.window();

        let mut pending = [0; APPROACH_COUNT];
        for approach in ApproachId::ALL {
            pending[approach.as_index()] = controller.pending_count(approach);
        }

        Self {
            signals: controller.signals().as_array(),
            pending,
            phase: service.phase(),
            current: service.current_pair(),
            incoming: service.incoming_pair(),
            phase_remaining_ms: service
                .phase_deadline()
                .map(|deadline| deadline.remaining(now)),
            released: service.is_released(),
            queue: controller.queue().iter().collect(),
            window: window.first_pair().zip(window.deadline()).map(|(first, deadline)| {
                WindowSnapshot {
                    first,
                    second: window.second_pair(),
                    remaining_ms: deadline.remaining(now),
                }
            }),
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the signal line (e.g. `signals approach-0=go approach-1=stop ...`).
    pub fn write_signals_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("signals")?;
        for approach in ApproachId::ALL {
            let name = approach_by_id(approach).name;
            let state = self.snapshot.signals[approach.as_index()];
            write!(writer, " {name}={state}")?;
        }
        Ok(())
    }

    /// Writes the pending-count line (e.g. `pending approach-0=2 ...`).
    pub fn write_pending_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("pending")?;
        for approach in ApproachId::ALL {
            let name = approach_by_id(approach).name;
            write!(writer, " {name}={}", self.snapshot.pending[approach.as_index()])?;
        }
        Ok(())
    }

    /// Writes the service line (e.g. `service phase=go pair=pair-a remaining=1200ms`).
    pub fn write_service_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "service phase={}", self.snapshot.phase.label())?;
        if let Some(pair) = self.snapshot.current {
            write!(writer, " pair={pair}")?;
        }
        if let Some(pair) = self.snapshot.incoming {
            write!(writer, " incoming={pair}")?;
        }

        match (self.snapshot.phase, self.snapshot.phase_remaining_ms) {
            (ServicePhase::Idle, _) => Ok(()),
            (ServicePhase::Go, _) if self.snapshot.released => writer.write_str(" remaining=released"),
            (_, Some(remaining)) => write!(writer, " remaining={remaining}ms"),
            (_, None) => writer.write_str(" remaining=n/a"),
        }
    }

    /// Writes the queue line (e.g. `queue pair-b` or `queue empty`).
    pub fn write_queue_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("queue")?;
        if self.snapshot.queue.is_empty() {
            return writer.write_str(" empty");
        }
        for pair in &self.snapshot.queue {
            write!(writer, " {pair}")?;
        }
        Ok(())
    }

    /// Writes the window line (e.g. `window open first=pair-a second=none remaining=2500ms`).
    pub fn write_window_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let Some(window) = self.snapshot.window else {
            return writer.write_str("window closed");
        };

        write!(writer, "window open first={}", window.first)?;
        match window.second {
            Some(pair) => write!(writer, " second={pair}")?,
            None => writer.write_str(" second=none")?,
        }
        write!(writer, " remaining={}ms", window.remaining_ms)
    }

    /// Invokes `emit` once per rendered line, in display order.
    pub fn for_each_line<const N: usize, F>(&self, mut emit: F) -> fmt::Result
    where
        F: FnMut(&str),
    {
        let writers: [fn(&Self, &mut heapless::String<N>) -> fmt::Result; 5] = [
            Self::write_signals_line,
            Self::write_pending_line,
            Self::write_service_line,
            Self::write_queue_line,
            Self::write_window_line,
        ];

        for write_line in writers {
            let mut line = heapless::String::<N>::new();
            write_line(self, &mut line)?;
            emit(line.as_str());
        }
        Ok(())
    }

    /// Renders every line into owned strings.
    #[cfg(feature = "alloc")]
    pub fn to_lines(&self) -> Result<alloc::vec::Vec<alloc::string::String>, fmt::Error> {
        let mut lines = alloc::vec::Vec::new();
        self.for_each_line::<160, _>(|line| lines.push(alloc::string::String::from(line)))?;
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, NoopSignalSink};
    use crate::telemetry::TelemetryRecorder;

    fn render<F>(write: F) -> heapless::String<128>
    where
        F: FnOnce(&mut heapless::String<128>) -> fmt::Result,
    {
        let mut line = heapless::String::new();
        write(&mut line).expect("line fits");
        line
    }

    #[test]
    fn idle_snapshot_renders_closed_window() {
        let snapshot = StatusSnapshot::idle();
        let formatter = StatusFormatter::new(&snapshot);
        assert_eq!(
            render(|w| formatter.write_signals_line(w)).as_str(),
            "signals approach-0=stop approach-1=stop approach-2=stop approach-3=stop"
        );
        assert_eq!(
            render(|w| formatter.write_service_line(w)).as_str(),
            "service phase=idle"
        );
        assert_eq!(render(|w| formatter.write_queue_line(w)).as_str(), "queue empty");
        assert_eq!(
            render(|w| formatter.write_window_line(w)).as_str(),
            "window closed"
        );
    }

    #[test]
    fn captures_live_controller_state() {
        let mut controller =
            IntersectionController::new(ControllerConfig::default(), NoopSignalSink::new());
        let mut telemetry = TelemetryRecorder::<Millis, 32>::new();

        controller.on_vehicle_detected(ApproachId::North, Millis(0), &mut telemetry);
        controller.on_vehicle_detected(ApproachId::East, Millis(200), &mut telemetry);

        let snapshot = StatusSnapshot::capture(&controller, Millis(500));
        let formatter = StatusFormatter::new(&snapshot);
        assert_eq!(
            render(|w| formatter.write_pending_line(w)).as_str(),
            "pending approach-0=1 approach-1=1 approach-2=0 approach-3=0"
        );
        assert_eq!(
            render(|w| formatter.write_window_line(w)).as_str(),
            "window open first=pair-a second=pair-b remaining=2500ms"
        );

        for tick in 1..=3_500 {
            controller.on_tick(Millis(tick), &mut telemetry);
        }
        let snapshot = StatusSnapshot::capture(&controller, Millis(3_500));
        let formatter = StatusFormatter::new(&snapshot);
        assert_eq!(
            render(|w| formatter.write_service_line(w)).as_str(),
            "service phase=go pair=pair-a remaining=1500ms"
        );
        assert_eq!(render(|w| formatter.write_queue_line(w)).as_str(), "queue pair-b");
    }

    #[test]
    fn emits_every_line_in_order() {
        let snapshot = StatusSnapshot::idle();
        let mut seen = 0;
        StatusFormatter::new(&snapshot)
            .for_each_line::<96, _>(|line| {
                let expected = ["signals", "pending", "service", "queue", "window"][seen];
                assert!(line.starts_with(expected), "{line}");
                seen += 1;
            })
            .expect("lines fit");
        assert_eq!(seen, 5);
    }
}
