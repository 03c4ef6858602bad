use embassy_futures::select::{Either4, select4};
use embassy_stm32::exti::ExtiInput;
use intersection_core::approach::{APPROACH_COUNT, ApproachId};

use super::{SharedController, now};
use crate::telemetry;

/// Waits on the four active-low detector buttons and feeds each falling edge
/// to the controller. Debouncing happens in the controller.
#[embassy_executor::task]
pub async fn run(
    shared: &'static SharedController,
    mut detectors: [ExtiInput<'static>; APPROACH_COUNT],
) -> ! {
    loop {
        let [north, east, south, west] = &mut detectors;
        let approach = match select4(
            north.wait_for_falling_edge(),
            east.wait_for_falling_edge(),
            south.wait_for_falling_edge(),
            west.wait_for_falling_edge(),
        )
        .await
        {
            Either4::First(()) => ApproachId::North,
            Either4::Second(()) => ApproachId::East,
            Either4::Third(()) => ApproachId::South,
            Either4::Fourth(()) => ApproachId::West,
        };

        let batch = shared.lock(|cell| {
            cell.borrow_mut().step(false, |controller, recorder| {
                controller.on_vehicle_detected(approach, now(), recorder);
            })
        });
        telemetry::log_batch(&batch);
    }
}
