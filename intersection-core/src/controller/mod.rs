//! Intersection controller: detection intake, arbitration, and the pair state machine.
//!
//! [`IntersectionController`] owns every piece of mutable state the
//! intersection needs. Integration layers call
//! [`IntersectionController::on_vehicle_detected`] from the detection source
//! and [`IntersectionController::on_tick`] once per millisecond; both take the
//! current [`Millis`] reading and a telemetry recorder, so the controller has
//! no ambient clock and no globals.
//!
//! Right-of-way is tracked by a single [`ActiveService`]. During a handoff the
//! outgoing pair sits at caution while the incoming pair stays at stop until
//! the caution deadline elapses, so the two pairs can never be away from stop
//! together.

mod signals;

use core::time::Duration;

pub use signals::{NoopSignalSink, PairSignals, SignalSink};

use crate::allocation::AllocationPolicy;
use crate::approach::{APPROACH_COUNT, ApproachId, PAIR_COUNT, PairId, SignalState};
use crate::arbitration::{ArbitrationWindow, WindowObservation};
use crate::debounce::{DebounceFilter, DebounceVerdict};
use crate::queue::{EnqueueError, RequestQueue};
use crate::telemetry::{DropReason, TelemetryEventKind, TelemetryPayload, TelemetryRecorder};
use crate::timing::{Deadline, Millis, TimingConfig};

/// Per-instance configuration for the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub timing: TimingConfig,
    pub allocation: AllocationPolicy,
    /// Pair granted GO at bring-up, without a deadline. `None` starts all-stop.
    pub initial_pair: Option<PairId>,
}

impl ControllerConfig {
    pub const DEFAULT: ControllerConfig = ControllerConfig {
        timing: TimingConfig::DEFAULT,
        allocation: AllocationPolicy::DEFAULT,
        initial_pair: None,
    };

    #[must_use]
    pub const fn with_initial_pair(mut self, pair: PairId) -> Self {
        self.initial_pair = Some(pair);
        self
    }

    #[must_use]
    pub const fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub const fn with_allocation(mut self, allocation: AllocationPolicy) -> Self {
        self.allocation = allocation;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Coarse phase of the active service.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ServicePhase {
    Idle,
    Go,
    HandoffCaution,
}

impl ServicePhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ServicePhase::Idle => "idle",
            ServicePhase::Go => "go",
            ServicePhase::HandoffCaution => "handoff-caution",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ServiceState {
    Idle,
    Go {
        pair: PairId,
        /// `None` for the bring-up grant, which never times out.
        deadline: Option<Deadline>,
        released: bool,
    },
    HandoffCaution {
        outgoing: PairId,
        incoming: PairId,
        deadline: Deadline,
    },
}

/// The single record of which pair currently holds right-of-way.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActiveService {
    state: ServiceState,
}

impl ActiveService {
    const fn idle() -> Self {
        Self {
            state: ServiceState::Idle,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> ServicePhase {
        match self.state {
            ServiceState::Idle => ServicePhase::Idle,
            ServiceState::Go { .. } => ServicePhase::Go,
            ServiceState::HandoffCaution { .. } => ServicePhase::HandoffCaution,
        }
    }

    /// Pair in GO, or the outgoing pair while it shows caution.
    #[must_use]
    pub const fn current_pair(&self) -> Option<PairId> {
        match self.state {
            ServiceState::Idle => None,
            ServiceState::Go { pair, .. } => Some(pair),
            ServiceState::HandoffCaution { outgoing, .. } => Some(outgoing),
        }
    }

    /// Pair waiting at stop for the caution handoff to finish.
    #[must_use]
    pub const fn incoming_pair(&self) -> Option<PairId> {
        match self.state {
            ServiceState::HandoffCaution { incoming, .. } => Some(incoming),
            _ => None,
        }
    }

    /// Deadline of the current phase, if one is armed.
    #[must_use]
    pub const fn phase_deadline(&self) -> Option<Deadline> {
        match self.state {
            ServiceState::Idle => None,
            ServiceState::Go { deadline, .. } => deadline,
            ServiceState::HandoffCaution { deadline, .. } => Some(deadline),
        }
    }

    /// `true` once the GO timer has elapsed (or never existed) and the pair
    /// keeps GO only until another request arrives.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        match self.state {
            ServiceState::Go {
                deadline: None, ..
            } => true,
            ServiceState::Go { released, .. } => released,
            _ => false,
        }
    }

    /// Pair that owns or is about to own GO; requests for it are not queued.
    const fn holder(&self) -> Option<PairId> {
        match self.state {
            ServiceState::Idle => None,
            ServiceState::Go { pair, .. } => Some(pair),
            ServiceState::HandoffCaution { incoming, .. } => Some(incoming),
        }
    }
}

/// Event-driven controller for a four-approach intersection.
pub struct IntersectionController<S>
where
    S: SignalSink,
{
    config: ControllerConfig,
    sink: S,
    signals: PairSignals,
    pending: [u16; APPROACH_COUNT],
    debounce: DebounceFilter,
    window: ArbitrationWindow,
    queue: RequestQueue,
    service: ActiveService,
    requested_at: [Option<Millis>; PAIR_COUNT],
}

impl<S> IntersectionController<S>
where
    S: SignalSink,
{
    /// Builds a controller, blanking every head before rendering the
    /// initial signal configuration.
    pub fn new(config: ControllerConfig, mut sink: S) -> Self {
        sink.blank_all();

        let mut signals = PairSignals::all_stop();
        signals.render_all(&mut sink);

        let mut service = ActiveService::idle();
        if let Some(pair) = config.initial_pair {
            signals.transition(pair, SignalState::Go, &mut sink);
            service.state = ServiceState::Go {
                pair,
                deadline: None,
                released: true,
            };
        }

        Self {
            config,
            sink,
            signals,
            pending: [0; APPROACH_COUNT],
            debounce: DebounceFilter::new(config.timing.debounce_ms),
            window: ArbitrationWindow::new(config.timing.arbitration_window_ms),
            queue: RequestQueue::new(),
            service,
            requested_at: [None; PAIR_COUNT],
        }
    }

    /// Handles a detection reported for `approach` at `now`.
    pub fn on_vehicle_detected<const CAP: usize>(
        &mut self,
        approach: ApproachId,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) -> DebounceVerdict {
        let verdict = self.debounce.observe(approach, now);
        if let DebounceVerdict::Suppressed { since_last_ms } = verdict {
            telemetry.record_suppressed(
                approach,
                Duration::from_millis(u64::from(since_last_ms)),
                now,
            );
            return verdict;
        }

        let slot = &mut self.pending[approach.as_index()];
        match slot.checked_add(1) {
            Some(count) => *slot = count,
            None => {
                telemetry.record(
                    TelemetryEventKind::CountSaturated(approach),
                    TelemetryPayload::Detection { pending: *slot },
                    now,
                );
            }
        }
        telemetry.record_detection(approach, *slot, now);

        let pair = approach.pair();
        if self.window.observe(pair, now) == WindowObservation::Opened {
            telemetry.record(
                TelemetryEventKind::WindowOpened(pair),
                TelemetryPayload::none(),
                now,
            );
        }

        verdict
    }

    /// Advances the controller by one scheduler tick.
    ///
    /// The arbitration window is flushed before the state machine runs so a
    /// request committed on this tick is visible to this tick's handoff.
    pub fn on_tick<const CAP: usize>(
        &mut self,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        self.debounce.expire(now);
        self.flush_window(now, telemetry);
        self.advance_service(now, telemetry);
    }

    fn flush_window<const CAP: usize>(
        &mut self,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        let Some(round) = self.window.poll(now) else {
            return;
        };

        telemetry.record_window_flushed(round.first, round.second, round.opened_at, now);
        for pair in round.pairs() {
            self.submit_request(pair, round.opened_at, now, telemetry);
        }

        if self.service.phase() == ServicePhase::Idle {
            self.start_next_from_idle(now, telemetry);
        }
    }

    fn submit_request<const CAP: usize>(
        &mut self,
        pair: PairId,
        requested_at: Millis,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        if self.service.holder() == Some(pair) {
            telemetry.record_request_dropped(
                pair,
                DropReason::AlreadyActive,
                self.queue.len(),
                now,
            );
            return;
        }

        match self.queue.enqueue(pair) {
            Ok(depth) => {
                self.requested_at[pair.as_index()] = Some(requested_at);
                telemetry.record_pair_queued(pair, depth, now);
            }
            Err(err) => {
                let reason = match err {
                    EnqueueError::QueueFull => DropReason::QueueFull,
                    EnqueueError::AlreadyQueued => DropReason::AlreadyQueued,
                };
                telemetry.record_request_dropped(pair, reason, self.queue.len(), now);
            }
        }
    }

    fn advance_service<const CAP: usize>(
        &mut self,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        match self.service.state {
            ServiceState::Idle => {
                if !self.queue.is_empty() {
                    self.start_next_from_idle(now, telemetry);
                }
            }
            ServiceState::Go {
                pair,
                deadline,
                released,
            } => {
                // Once released the deadline is never consulted again, so a
                // long hold cannot alias after the clock wraps.
                if let (false, Some(deadline)) = (released, deadline) {
                    if !deadline.has_elapsed(now) {
                        return;
                    }
                    self.service.state = ServiceState::Go {
                        pair,
                        deadline: Some(deadline),
                        released: true,
                    };
                    telemetry.record(
                        TelemetryEventKind::TimerReleased(pair),
                        TelemetryPayload::none(),
                        now,
                    );
                }

                // Without a queued request the pair keeps GO indefinitely.
                if let Ok(next) = self.queue.dequeue() {
                    self.begin_handoff(pair, next, now, telemetry);
                }
            }
            ServiceState::HandoffCaution {
                outgoing,
                incoming,
                deadline,
            } => {
                if deadline.has_elapsed(now) {
                    self.signals
                        .transition(outgoing, SignalState::Stop, &mut self.sink);
                    self.start_service(incoming, now, telemetry);
                }
            }
        }
    }

    fn start_next_from_idle<const CAP: usize>(
        &mut self,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        if let Ok(pair) = self.queue.dequeue() {
            self.start_service(pair, now, telemetry);
        }
    }

    fn begin_handoff<const CAP: usize>(
        &mut self,
        outgoing: PairId,
        incoming: PairId,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        if outgoing == incoming {
            telemetry.record_request_dropped(
                incoming,
                DropReason::AlreadyActive,
                self.queue.len(),
                now,
            );
            return;
        }

        self.signals
            .transition(outgoing, SignalState::Caution, &mut self.sink);
        self.service.state = ServiceState::HandoffCaution {
            outgoing,
            incoming,
            deadline: Deadline::new(now, self.config.timing.caution_ms),
        };
        telemetry.record(
            TelemetryEventKind::CautionStarted(outgoing),
            TelemetryPayload::Handoff { incoming },
            now,
        );
    }

    /// Grants GO to `pair`, sizing the phase from its pending demand.
    fn start_service<const CAP: usize>(
        &mut self,
        pair: PairId,
        now: Millis,
        telemetry: &mut TelemetryRecorder<Millis, CAP>,
    ) {
        let counts = self.pair_counts(pair);
        let green_ms = self.config.allocation.green_time_for(counts);
        for approach in pair.approaches() {
            self.pending[approach.as_index()] = 0;
        }

        self.signals
            .transition(pair.opposite(), SignalState::Stop, &mut self.sink);
        self.signals.transition(pair, SignalState::Go, &mut self.sink);
        self.service.state = ServiceState::Go {
            pair,
            deadline: Some(Deadline::new(now, green_ms)),
            released: false,
        };

        let requested_at = self.requested_at[pair.as_index()].take();
        telemetry.record_service_started(
            pair,
            counts,
            Duration::from_millis(u64::from(green_ms)),
            requested_at,
            now,
        );
    }

    /// Pending counts for the two approaches of `pair`.
    #[must_use]
    pub fn pair_counts(&self, pair: PairId) -> [u16; 2] {
        let [first, second] = pair.approaches();
        [self.pending_count(first), self.pending_count(second)]
    }

    #[must_use]
    pub fn pending_count(&self, approach: ApproachId) -> u16 {
        self.pending[approach.as_index()]
    }

    #[must_use]
    pub fn signal(&self, approach: ApproachId) -> SignalState {
        self.signals.approach(approach)
    }

    #[must_use]
    pub const fn signals(&self) -> &PairSignals {
        &self.signals
    }

    #[must_use]
    pub const fn service(&self) -> &ActiveService {
        &self.service
    }

    #[must_use]
    pub const fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    #[must_use]
    pub const fn window(&self) -> &ArbitrationWindow {
        &self.window
    }

    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approach::SignalOutput;
    use crate::telemetry::TelemetryRecord;
    use heapless::Vec;

    type Recorder = TelemetryRecorder<Millis, 64>;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<(ApproachId, SignalOutput), 64>,
    }

    impl SignalSink for RecordingSink {
        fn set_signal(&mut self, approach: ApproachId, output: SignalOutput) {
            self.writes
                .push((approach, output))
                .expect("recording sink capacity");
        }
    }

    fn controller() -> IntersectionController<RecordingSink> {
        IntersectionController::new(ControllerConfig::default(), RecordingSink::default())
    }

    fn run_until<S: SignalSink>(
        controller: &mut IntersectionController<S>,
        telemetry: &mut Recorder,
        from: u32,
        to: u32,
    ) {
        for tick in from..=to {
            controller.on_tick(Millis(tick), telemetry);
            assert!(controller.signals().is_exclusive(), "conflict at {tick}ms");
        }
    }

    fn events(telemetry: &Recorder) -> Vec<TelemetryEventKind, 64> {
        telemetry
            .oldest_first()
            .map(|record: &TelemetryRecord<Millis>| record.event)
            .collect()
    }

    #[test]
    fn bring_up_blanks_then_renders_stop() {
        let controller = controller();
        let writes = &controller.sink().writes;
        assert_eq!(writes.len(), 8);
        assert!(writes[..4]
            .iter()
            .all(|(_, output)| *output == SignalOutput::Off));
        assert!(writes[4..]
            .iter()
            .all(|(_, output)| *output == SignalOutput::Stop));
        assert_eq!(controller.service().phase(), ServicePhase::Idle);
    }

    #[test]
    fn initial_pair_holds_go_without_deadline() {
        let config = ControllerConfig::default().with_initial_pair(PairId::A);
        let controller = IntersectionController::new(config, NoopSignalSink::new());
        assert_eq!(controller.signal(ApproachId::North), SignalState::Go);
        assert_eq!(controller.signal(ApproachId::South), SignalState::Go);
        assert_eq!(controller.signal(ApproachId::East), SignalState::Stop);
        assert_eq!(controller.service().phase_deadline(), None);
        assert!(controller.service().is_released());
    }

    #[test]
    fn detection_counts_and_opens_window() {
        let mut controller = controller();
        let mut telemetry = Recorder::new();

        let verdict = controller.on_vehicle_detected(ApproachId::South, Millis(10), &mut telemetry);
        assert!(verdict.is_accepted());
        assert_eq!(controller.pending_count(ApproachId::South), 1);
        assert_eq!(controller.window().first_pair(), Some(PairId::A));
        assert_eq!(
            events(&telemetry).as_slice(),
            &[
                TelemetryEventKind::VehicleDetected(ApproachId::South),
                TelemetryEventKind::WindowOpened(PairId::A),
            ]
        );
    }

    #[test]
    fn chatter_is_debounced() {
        let mut controller = controller();
        let mut telemetry = Recorder::new();

        controller.on_vehicle_detected(ApproachId::East, Millis(0), &mut telemetry);
        let verdict = controller.on_vehicle_detected(ApproachId::East, Millis(40), &mut telemetry);
        assert_eq!(verdict, DebounceVerdict::Suppressed { since_last_ms: 40 });
        assert_eq!(controller.pending_count(ApproachId::East), 1);
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::DetectionSuppressed(ApproachId::East))
        );
    }

    #[test]
    fn cold_start_goes_directly_to_go() {
        let mut controller = controller();
        let mut telemetry = Recorder::new();

        controller.on_vehicle_detected(ApproachId::North, Millis(0), &mut telemetry);
        run_until(&mut controller, &mut telemetry, 1, 2_999);
        assert_eq!(controller.service().phase(), ServicePhase::Idle);

        controller.on_tick(Millis(3_000), &mut telemetry);
        assert_eq!(controller.service().phase(), ServicePhase::Go);
        assert_eq!(controller.service().current_pair(), Some(PairId::A));
        assert_eq!(controller.signals().pair(PairId::A), SignalState::Go);
        assert_eq!(controller.pair_counts(PairId::A), [0, 0]);
        let deadline = controller
            .service()
            .phase_deadline()
            .expect("go deadline armed");
        assert_eq!(deadline.period_ms, 2_000);
    }

    #[test]
    fn handoff_waits_for_caution_before_go() {
        let mut controller = controller();
        let mut telemetry = Recorder::new();

        controller.on_vehicle_detected(ApproachId::North, Millis(0), &mut telemetry);
        controller.on_vehicle_detected(ApproachId::East, Millis(500), &mut telemetry);
        run_until(&mut controller, &mut telemetry, 1, 3_000);
        assert_eq!(controller.queue().peek(), Some(PairId::B));

        run_until(&mut controller, &mut telemetry, 3_001, 4_999);
        assert_eq!(controller.signals().pair(PairId::A), SignalState::Go);

        controller.on_tick(Millis(5_000), &mut telemetry);
        assert_eq!(controller.service().phase(), ServicePhase::HandoffCaution);
        assert_eq!(controller.signals().pair(PairId::A), SignalState::Caution);
        assert_eq!(controller.signals().pair(PairId::B), SignalState::Stop);
        assert_eq!(controller.service().incoming_pair(), Some(PairId::B));

        run_until(&mut controller, &mut telemetry, 5_001, 5_999);
        assert_eq!(controller.signals().pair(PairId::B), SignalState::Stop);

        controller.on_tick(Millis(6_000), &mut telemetry);
        assert_eq!(controller.signals().pair(PairId::A), SignalState::Stop);
        assert_eq!(controller.signals().pair(PairId::B), SignalState::Go);
        assert_eq!(controller.service().current_pair(), Some(PairId::B));
    }

    #[test]
    fn expired_go_is_held_until_a_request_arrives() {
        let mut controller = controller();
        let mut telemetry = Recorder::new();

        controller.on_vehicle_detected(ApproachId::North, Millis(0), &mut telemetry);
        run_until(&mut controller, &mut telemetry, 1, 5_000);
        assert!(controller.service().is_released());
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::TimerReleased(PairId::A))
        );

        run_until(&mut controller, &mut telemetry, 5_001, 20_000);
        assert_eq!(controller.signals().pair(PairId::A), SignalState::Go);

        controller.on_vehicle_detected(ApproachId::West, Millis(20_000), &mut telemetry);
        run_until(&mut controller, &mut telemetry, 20_001, 22_999);
        assert_eq!(controller.service().phase(), ServicePhase::Go);

        controller.on_tick(Millis(23_000), &mut telemetry);
        assert_eq!(controller.service().phase(), ServicePhase::HandoffCaution);
    }

    #[test]
    fn request_for_active_pair_is_dropped() {
        let config = ControllerConfig::default().with_initial_pair(PairId::A);
        let mut controller = IntersectionController::new(config, NoopSignalSink::new());
        let mut telemetry = Recorder::new();

        controller.on_vehicle_detected(ApproachId::South, Millis(0), &mut telemetry);
        controller.on_tick(Millis(3_000), &mut telemetry);

        assert!(controller.queue().is_empty());
        assert_eq!(controller.pending_count(ApproachId::South), 1);
        match telemetry.latest().map(|record| (record.event, record.details)) {
            Some((TelemetryEventKind::RequestDropped(PairId::A), TelemetryPayload::Queue(queue))) => {
                assert_eq!(queue.dropped, Some(DropReason::AlreadyActive));
            }
            other => panic!("unexpected telemetry: {other:?}"),
        }
    }

    #[test]
    fn skipped_ticks_complete_handoff_late() {
        let mut controller = controller();
        let mut telemetry = Recorder::new();

        controller.on_vehicle_detected(ApproachId::North, Millis(0), &mut telemetry);
        controller.on_vehicle_detected(ApproachId::West, Millis(10), &mut telemetry);
        controller.on_tick(Millis(3_000), &mut telemetry);
        // Several seconds of missed ticks: each call performs one transition.
        controller.on_tick(Millis(9_000), &mut telemetry);
        assert_eq!(controller.service().phase(), ServicePhase::HandoffCaution);
        controller.on_tick(Millis(9_001), &mut telemetry);
        assert_eq!(controller.service().phase(), ServicePhase::HandoffCaution);
        controller.on_tick(Millis(10_000), &mut telemetry);
        assert_eq!(controller.service().current_pair(), Some(PairId::B));
        assert!(controller.signals().is_exclusive());
    }

    #[test]
    fn pending_count_saturates_and_reports() {
        let timing = TimingConfig::new(0, 3_000, 1_000, 1);
        let config = ControllerConfig::default().with_timing(timing);
        let mut controller = IntersectionController::new(config, NoopSignalSink::new());
        let mut telemetry = Recorder::new();

        controller.pending[ApproachId::East.as_index()] = u16::MAX - 1;
        controller.on_vehicle_detected(ApproachId::East, Millis(0), &mut telemetry);
        assert_eq!(controller.pending_count(ApproachId::East), u16::MAX);
        controller.on_vehicle_detected(ApproachId::East, Millis(1), &mut telemetry);
        assert_eq!(controller.pending_count(ApproachId::East), u16::MAX);
        assert!(
            telemetry
                .oldest_first()
                .any(|record| record.event == TelemetryEventKind::CountSaturated(ApproachId::East))
        );
    }
}
