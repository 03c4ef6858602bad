//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! The controller records every decision it makes (accepted and suppressed
//! detections, window lifecycle, queueing, service starts and handoffs) into a
//! fixed-capacity [`TelemetryRecorder`]. Event kinds encode to compact numeric
//! codes for transport over diagnostics channels, and payloads carry the
//! counts and timings consoles need while remaining `no_std` compatible.
//!
//! Front-ends keep an [`EventId`] cursor and call
//! [`TelemetryRecorder::since`] after driving the controller to mirror the new
//! records to their own log sink.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::approach::{ApproachId, PairId};

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events emitted by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    VehicleDetected(ApproachId),
    DetectionSuppressed(ApproachId),
    CountSaturated(ApproachId),
    WindowOpened(PairId),
    WindowFlushed(PairId),
    PairQueued(PairId),
    RequestDropped(PairId),
    ServiceStarted(PairId),
    CautionStarted(PairId),
    TimerReleased(PairId),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::VehicleDetected(approach) => {
                write!(f, "vehicle-detected {approach}")
            }
            TelemetryEventKind::DetectionSuppressed(approach) => {
                write!(f, "detection-suppressed {approach}")
            }
            TelemetryEventKind::CountSaturated(approach) => {
                write!(f, "count-saturated {approach}")
            }
            TelemetryEventKind::WindowOpened(pair) => write!(f, "window-opened {pair}"),
            TelemetryEventKind::WindowFlushed(pair) => write!(f, "window-flushed {pair}"),
            TelemetryEventKind::PairQueued(pair) => write!(f, "pair-queued {pair}"),
            TelemetryEventKind::RequestDropped(pair) => write!(f, "request-dropped {pair}"),
            TelemetryEventKind::ServiceStarted(pair) => write!(f, "service-started {pair}"),
            TelemetryEventKind::CautionStarted(pair) => write!(f, "caution-started {pair}"),
            TelemetryEventKind::TimerReleased(pair) => write!(f, "timer-released {pair}"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const VEHICLE_DETECTED_BASE: u16 = 0x0000;
    const DETECTION_SUPPRESSED_BASE: u16 = 0x0004;
    const COUNT_SATURATED_BASE: u16 = 0x0008;
    const WINDOW_OPENED_BASE: u16 = 0x0010;
    const WINDOW_FLUSHED_BASE: u16 = 0x0012;
    const PAIR_QUEUED_BASE: u16 = 0x0014;
    const REQUEST_DROPPED_BASE: u16 = 0x0016;
    const SERVICE_STARTED_BASE: u16 = 0x0018;
    const CAUTION_STARTED_BASE: u16 = 0x001A;
    const TIMER_RELEASED_BASE: u16 = 0x001C;
    const PAIR_EVENTS_END: u16 = 0x001E;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::VehicleDetected(approach) => {
                Self::VEHICLE_DETECTED_BASE + approach_code(approach)
            }
            TelemetryEventKind::DetectionSuppressed(approach) => {
                Self::DETECTION_SUPPRESSED_BASE + approach_code(approach)
            }
            TelemetryEventKind::CountSaturated(approach) => {
                Self::COUNT_SATURATED_BASE + approach_code(approach)
            }
            TelemetryEventKind::WindowOpened(pair) => Self::WINDOW_OPENED_BASE + pair_code(pair),
            TelemetryEventKind::WindowFlushed(pair) => Self::WINDOW_FLUSHED_BASE + pair_code(pair),
            TelemetryEventKind::PairQueued(pair) => Self::PAIR_QUEUED_BASE + pair_code(pair),
            TelemetryEventKind::RequestDropped(pair) => {
                Self::REQUEST_DROPPED_BASE + pair_code(pair)
            }
            TelemetryEventKind::ServiceStarted(pair) => {
                Self::SERVICE_STARTED_BASE + pair_code(pair)
            }
            TelemetryEventKind::CautionStarted(pair) => {
                Self::CAUTION_STARTED_BASE + pair_code(pair)
            }
            TelemetryEventKind::TimerReleased(pair) => Self::TIMER_RELEASED_BASE + pair_code(pair),
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let approach_event = |base: u16, build: fn(ApproachId) -> Self| {
            ApproachId::from_index(usize::from(code - base))
                .map_or(TelemetryEventKind::Custom(code), build)
        };
        let pair_event = |base: u16, build: fn(PairId) -> Self| {
            PairId::from_index(usize::from(code - base))
                .map_or(TelemetryEventKind::Custom(code), build)
        };

        match code {
            value if value < Self::DETECTION_SUPPRESSED_BASE => approach_event(
                Self::VEHICLE_DETECTED_BASE,
                TelemetryEventKind::VehicleDetected,
            ),
            value if value < Self::COUNT_SATURATED_BASE => approach_event(
                Self::DETECTION_SUPPRESSED_BASE,
                TelemetryEventKind::DetectionSuppressed,
            ),
            value if value < Self::WINDOW_OPENED_BASE => approach_event(
                Self::COUNT_SATURATED_BASE,
                TelemetryEventKind::CountSaturated,
            ),
            value if value < Self::PAIR_EVENTS_END => {
                let base = Self::WINDOW_OPENED_BASE + (value - Self::WINDOW_OPENED_BASE) / 2 * 2;
                let build: fn(PairId) -> Self = match base {
                    Self::WINDOW_OPENED_BASE => TelemetryEventKind::WindowOpened,
                    Self::WINDOW_FLUSHED_BASE => TelemetryEventKind::WindowFlushed,
                    Self::PAIR_QUEUED_BASE => TelemetryEventKind::PairQueued,
                    Self::REQUEST_DROPPED_BASE => TelemetryEventKind::RequestDropped,
                    Self::SERVICE_STARTED_BASE => TelemetryEventKind::ServiceStarted,
                    Self::CAUTION_STARTED_BASE => TelemetryEventKind::CautionStarted,
                    _ => TelemetryEventKind::TimerReleased,
                };
                pair_event(base, build)
            }
            other => TelemetryEventKind::Custom(other),
        }
    }

    /// Returns `true` for events that indicate lost demand or degraded input.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(
            self,
            TelemetryEventKind::CountSaturated(_) | TelemetryEventKind::RequestDropped(_)
        )
    }
}

/// Why a pair request did not make it into the queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    QueueFull,
    AlreadyQueued,
    /// The pair already holds GO or is the incoming pair of a handoff.
    AlreadyActive,
}

impl DropReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DropReason::QueueFull => "queue-full",
            DropReason::AlreadyQueued => "already-queued",
            DropReason::AlreadyActive => "already-active",
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Pending count of the approach after an accepted detection.
    Detection { pending: u16 },
    /// Time since the last accepted detection on the approach.
    Suppressed { since_last: Duration },
    /// Second pair of a flushed round and how long the window was held.
    Round(RoundTelemetry),
    /// Queue depth after a request was queued, or why it was dropped.
    Queue(QueueTelemetry),
    /// Demand and allocation captured when a pair is granted GO.
    Service(ServiceTelemetry),
    /// Pair waiting on the caution handoff.
    Handoff { incoming: PairId },
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Detection { pending } => write!(f, "pending={pending}"),
            TelemetryPayload::Suppressed { since_last } => {
                write!(f, "since-last={}ms", since_last.as_millis())
            }
            TelemetryPayload::Round(round) => {
                match round.second {
                    Some(pair) => write!(f, "second={pair}")?,
                    None => f.write_str("second=none")?,
                }
                write!(f, " held={}ms", round.held_for.as_millis())
            }
            TelemetryPayload::Queue(queue) => match queue.dropped {
                Some(reason) => write!(f, "reason={} depth={}", reason.label(), queue.depth),
                None => write!(f, "depth={}", queue.depth),
            },
            TelemetryPayload::Service(service) => {
                write!(
                    f,
                    "counts={}/{} green={}ms",
                    service.counts[0],
                    service.counts[1],
                    service.green.as_millis()
                )?;
                match service.waited {
                    Some(waited) => write!(f, " waited={}ms", waited.as_millis()),
                    None => Ok(()),
                }
            }
            TelemetryPayload::Handoff { incoming } => write!(f, "incoming={incoming}"),
        }
    }
}

/// Flushed arbitration round payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RoundTelemetry {
    pub second: Option<PairId>,
    pub held_for: Duration,
}

/// Request queue payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueTelemetry {
    pub depth: u8,
    pub dropped: Option<DropReason>,
}

impl QueueTelemetry {
    #[must_use]
    pub const fn queued(depth: u8) -> Self {
        Self {
            depth,
            dropped: None,
        }
    }

    #[must_use]
    pub const fn dropped(depth: u8, reason: DropReason) -> Self {
        Self {
            depth,
            dropped: Some(reason),
        }
    }
}

/// Service start payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServiceTelemetry {
    /// Pending counts of the pair's two approaches before they were reset.
    pub counts: [u16; 2],
    pub green: Duration,
    /// Time between the request entering the queue window and service.
    pub waited: Option<Duration>,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl<TInstant> fmt::Display for TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event)?;
        if self.details != TelemetryPayload::None {
            write!(f, " {}", self.details)?;
        }
        Ok(())
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records written at or after `cursor` that are still retained, oldest first.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        let unseen = usize::try_from(self.next_event_id.wrapping_sub(cursor)).unwrap_or(usize::MAX);
        let retained = self.ring.len();
        self.ring
            .oldest_ordered()
            .skip(retained - unseen.min(retained))
    }

    /// Identifier the next recorded event will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    pub fn record_detection(
        &mut self,
        approach: ApproachId,
        pending: u16,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::VehicleDetected(approach),
            TelemetryPayload::Detection { pending },
            timestamp,
        )
    }

    pub fn record_suppressed(
        &mut self,
        approach: ApproachId,
        since_last: Duration,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::DetectionSuppressed(approach),
            TelemetryPayload::Suppressed { since_last },
            timestamp,
        )
    }

    /// Records the window flush, measuring how long the round stayed open.
    pub fn record_window_flushed(
        &mut self,
        first: PairId,
        second: Option<PairId>,
        opened_at: TInstant,
        timestamp: TInstant,
    ) -> EventId {
        let held_for = timestamp.saturating_duration_since(opened_at);
        self.record(
            TelemetryEventKind::WindowFlushed(first),
            TelemetryPayload::Round(RoundTelemetry { second, held_for }),
            timestamp,
        )
    }

    pub fn record_pair_queued(
        &mut self,
        pair: PairId,
        queue_depth: usize,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::PairQueued(pair),
            TelemetryPayload::Queue(QueueTelemetry::queued(truncate_depth(queue_depth))),
            timestamp,
        )
    }

    pub fn record_request_dropped(
        &mut self,
        pair: PairId,
        reason: DropReason,
        queue_depth: usize,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::RequestDropped(pair),
            TelemetryPayload::Queue(QueueTelemetry::dropped(
                truncate_depth(queue_depth),
                reason,
            )),
            timestamp,
        )
    }

    /// Records a pair being granted GO along with the demand that sized it.
    pub fn record_service_started(
        &mut self,
        pair: PairId,
        counts: [u16; 2],
        green: Duration,
        requested_at: Option<TInstant>,
        timestamp: TInstant,
    ) -> EventId {
        let waited = requested_at.map(|requested| timestamp.saturating_duration_since(requested));
        self.record(
            TelemetryEventKind::ServiceStarted(pair),
            TelemetryPayload::Service(ServiceTelemetry {
                counts,
                green,
                waited,
            }),
            timestamp,
        )
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_depth(depth: usize) -> u8 {
    match u8::try_from(depth) {
        Ok(value) => value,
        Err(_) => u8::MAX,
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn approach_code(approach: ApproachId) -> u16 {
    approach.as_index() as u16
}

#[allow(clippy::cast_possible_truncation)]
const fn pair_code(pair: PairId) -> u16 {
    pair.as_index() as u16
}
