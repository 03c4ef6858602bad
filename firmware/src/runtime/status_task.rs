use embassy_time::{Duration, Ticker};
use intersection_core::repl::status::StatusFormatter;

use crate::status;

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// Periodically logs the published status block.
#[embassy_executor::task]
pub async fn run() -> ! {
    let mut ticker = Ticker::every(HEARTBEAT_PERIOD);
    loop {
        ticker.next().await;
        let snapshot = status::snapshot();
        if let Some(event) = status::last_event() {
            defmt::info!("status last-event {}", defmt::Display2Format(&event));
        }
        let rendered = StatusFormatter::new(&snapshot)
            .for_each_line::<96, _>(|line| defmt::info!("status {}", line));
        if rendered.is_err() {
            defmt::warn!("status line overflow");
        }
    }
}
