use std::sync::Arc;

use tokio::{
    sync::Mutex,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::monitor::{Monitor, MonitorStatus};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Drives [`Monitor::tick`] at a fixed period until cancelled or until the
/// monitor goes idle.
///
/// A tick holds the monitor lock for its whole run, so a concurrent `stop`
/// lands between ticks, never inside one.
pub async fn polling_loop(
    monitor: Arc<Mutex<Monitor>>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut guard = monitor.lock().await;
                if guard.status() != MonitorStatus::Polling {
                    log_info!("polling loop found monitor idle; exiting");
                    break;
                }
                let report = guard.tick();
                if report.lines > 0 {
                    log::debug!(
                        "tick: {} lines, {} accepted, {} skipped, {} rejected",
                        report.lines,
                        report.accepted,
                        report.skipped,
                        report.rejected
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("polling loop shutting down");
                break;
            }
        }
    }
}
