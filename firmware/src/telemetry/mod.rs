//! Telemetry mirroring and logging helpers.
//!
//! The controller records into the core `TelemetryRecorder` while the shared
//! lock is held. `TelemetryMirror` copies the unseen records out so they can be
//! logged over defmt (or stdout on the host) after the lock is released.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use heapless::Vec;
use intersection_core::telemetry::{EventId, TelemetryRecord, TelemetryRecorder};
use intersection_core::timing::Millis;

use crate::status;

/// Maximum number of records copied out of the ring per drain.
pub const MIRROR_BATCH: usize = 16;

/// Records copied out of the ring in one drain.
pub struct MirrorBatch {
    pub records: Vec<TelemetryRecord<Millis>, MIRROR_BATCH>,
    /// Unseen records that did not fit into the batch.
    pub skipped: u32,
}

impl MirrorBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.skipped == 0
    }
}

/// Tracks which telemetry records have already been logged.
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Copies the records written since the previous drain, newest kept when
    /// the batch overflows.
    pub fn drain<const CAP: usize>(
        &mut self,
        recorder: &TelemetryRecorder<Millis, CAP>,
    ) -> MirrorBatch {
        let mut batch = MirrorBatch {
            records: Vec::new(),
            skipped: self.cursor_gap(recorder),
        };

        let unseen = recorder.since(self.cursor);
        for record in unseen {
            if batch.records.is_full() {
                batch.records.remove(0);
                batch.skipped = batch.skipped.saturating_add(1);
            }
            // Capacity was freed above.
            let _ = batch.records.push(*record);
        }

        if let Some(last) = batch.records.last() {
            status::record_event(last.event);
        }
        self.cursor = recorder.next_event_id();
        batch
    }

    /// Records that were overwritten in the ring before they could be copied.
    fn cursor_gap<const CAP: usize>(&self, recorder: &TelemetryRecorder<Millis, CAP>) -> u32 {
        let unseen = recorder.next_event_id().wrapping_sub(self.cursor);
        let retained = u32::try_from(recorder.len()).unwrap_or(u32::MAX);
        unseen.saturating_sub(retained)
    }
}

impl Default for TelemetryMirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every record of a drained batch.
pub fn log_batch(batch: &MirrorBatch) {
    if batch.skipped > 0 {
        emit_skipped(batch.skipped);
    }
    for record in &batch.records {
        log_record(record);
    }
}

pub fn log_record(record: &TelemetryRecord<Millis>) {
    emit_log(record, record.event.is_warning());
}

#[cfg(target_os = "none")]
fn emit_log(record: &TelemetryRecord<Millis>, warning: bool) {
    let timestamp = record.timestamp.ticks();
    if warning {
        defmt::warn!(
            "telemetry t={}ms {}",
            timestamp,
            defmt::Display2Format(record)
        );
    } else {
        defmt::info!(
            "telemetry t={}ms {}",
            timestamp,
            defmt::Display2Format(record)
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(record: &TelemetryRecord<Millis>, warning: bool) {
    let level = if warning { "WARN" } else { "INFO" };
    println!("{level} telemetry t={} {record}", record.timestamp);
}

#[cfg(target_os = "none")]
fn emit_skipped(count: u32) {
    defmt::warn!("telemetry skipped {} records", count);
}

#[cfg(not(target_os = "none"))]
fn emit_skipped(count: u32) {
    println!("WARN telemetry skipped {count} records");
}
