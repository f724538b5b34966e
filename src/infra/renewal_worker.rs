use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::application::use_cases::renewal_schedule::RenewalScheduler;

/// Run scheduler ticks until `shutdown` flips to `true`.
///
/// A tick in progress is allowed to finish; shutdown is only observed
/// between ticks. Ticks that fall behind are skipped, never queued.
pub async fn run_renewal_loop(
    scheduler: Arc<RenewalScheduler>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Renewal worker started (polling every {}s, look-ahead {} days)",
        poll_interval.as_secs(),
        scheduler.options().window.look_ahead_days()
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = scheduler.run_tick(Utc::now()).await {
                    error!(error = %e, "Renewal tick failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Renewal worker stopped");
}
