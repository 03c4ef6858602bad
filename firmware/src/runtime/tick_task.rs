use embassy_time::{Duration, Ticker};

use super::{SharedController, now};
use crate::telemetry;

/// Ticks between unconditional status refreshes.
const PUBLISH_EVERY: u32 = 100;

#[embassy_executor::task]
pub async fn run(shared: &'static SharedController) -> ! {
    let period_ms = shared.lock(|cell| cell.borrow().controller.config().timing.tick_period_ms);
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(period_ms.max(1))));
    let mut ticks: u32 = 0;

    loop {
        ticker.next().await;
        ticks = ticks.wrapping_add(1);
        let force_publish = ticks.is_multiple_of(PUBLISH_EVERY);

        let batch = shared.lock(|cell| {
            cell.borrow_mut().step(force_publish, |controller, recorder| {
                controller.on_tick(now(), recorder);
            })
        });
        telemetry::log_batch(&batch);
    }
}
