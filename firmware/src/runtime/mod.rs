use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Output, Pull, Speed};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;
use intersection_core::approach::{ALL_APPROACHES, PairId};
use intersection_core::controller::{ControllerConfig, IntersectionController};
use intersection_core::repl::status::StatusSnapshot;
use intersection_core::telemetry::TelemetryRecorder;
use intersection_core::timing::Millis;
use static_cell::StaticCell;

use crate::signals::{DARK_LEVEL, HardwareSignalSink, LampHead, LedSignalSink};
use crate::status;
use crate::telemetry::{MirrorBatch, TelemetryMirror};

mod detector_task;
mod status_task;
mod tick_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Controller plus the telemetry it records, guarded together.
pub(super) struct ControllerState {
    controller: IntersectionController<HardwareSignalSink>,
    telemetry: TelemetryRecorder<Millis>,
    mirror: TelemetryMirror,
}

impl ControllerState {
    /// Applies `step` to the controller, then copies out fresh telemetry.
    ///
    /// The status block is refreshed whenever something was recorded or
    /// `force_publish` is set.
    fn step<F>(&mut self, force_publish: bool, step: F) -> MirrorBatch
    where
        F: FnOnce(&mut IntersectionController<HardwareSignalSink>, &mut TelemetryRecorder<Millis>),
    {
        step(&mut self.controller, &mut self.telemetry);
        let batch = self.mirror.drain(&self.telemetry);
        if force_publish || !batch.is_empty() {
            status::publish(&StatusSnapshot::capture(&self.controller, now()));
        }
        batch
    }
}

pub(super) type SharedController = Mutex<CriticalSectionRawMutex, RefCell<ControllerState>>;

static CONTROLLER: StaticCell<SharedController> = StaticCell::new();

/// Current controller time; wraps after ~49 days like the core clock.
pub(super) fn now() -> Millis {
    #[allow(clippy::cast_possible_truncation)]
    Millis::from_ticks(Instant::now().as_millis() as u32)
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PB1,
        PB2,
        PB3,
        PB4,
        PB5,
        PB10,
        PB13,
        PB14,
        PC10,
        PC11,
        PC12,
        PC13,
        EXTI10,
        EXTI11,
        EXTI12,
        EXTI13,
        ..
    } = hal::init(config);

    let sink = LedSignalSink::new([
        LampHead::new(
            Output::new(PB10, DARK_LEVEL, Speed::Low),
            Output::new(PB4, DARK_LEVEL, Speed::Low),
        ),
        LampHead::new(
            Output::new(PB5, DARK_LEVEL, Speed::Low),
            Output::new(PB3, DARK_LEVEL, Speed::Low),
        ),
        LampHead::new(
            Output::new(PB2, DARK_LEVEL, Speed::Low),
            Output::new(PB1, DARK_LEVEL, Speed::Low),
        ),
        LampHead::new(
            Output::new(PB14, DARK_LEVEL, Speed::Low),
            Output::new(PB13, DARK_LEVEL, Speed::Low),
        ),
    ]);

    let controller = IntersectionController::new(
        ControllerConfig::default().with_initial_pair(PairId::A),
        sink,
    );
    let shared: &'static SharedController = CONTROLLER.init(Mutex::new(RefCell::new(ControllerState {
        controller,
        telemetry: TelemetryRecorder::new(),
        mirror: TelemetryMirror::new(),
    })));
    defmt::info!("intersection controller online");
    for line in ALL_APPROACHES {
        defmt::info!(
            "{} red={} green={} detector={}",
            line.name,
            line.red_pin,
            line.green_pin,
            line.detector_pin
        );
    }

    let detectors = [
        ExtiInput::new(PC10, EXTI10, Pull::Up),
        ExtiInput::new(PC11, EXTI11, Pull::Up),
        ExtiInput::new(PC12, EXTI12, Pull::Up),
        ExtiInput::new(PC13, EXTI13, Pull::Up),
    ];

    spawner
        .spawn(tick_task::run(shared))
        .expect("failed to spawn tick task");
    spawner
        .spawn(detector_task::run(shared, detectors))
        .expect("failed to spawn detector task");
    spawner
        .spawn(status_task::run())
        .expect("failed to spawn status task");

    core::future::pending::<()>().await;
}
