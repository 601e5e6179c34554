use crate::counters::LivenessCounters;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodically log every liveness counter until cancelled
pub async fn run_counter_reporter(
    counters: Arc<LivenessCounters>,
    interval: Duration,
    shutdown_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it so the first report has data
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("counter reporter stopping");
                break;
            }
            _ = ticker.tick() => {
                report(&counters);
            }
        }
    }

    report(&counters);
}

fn report(counters: &LivenessCounters) {
    for reading in counters.snapshot() {
        info!(
            application = %reading.application_name,
            counter = %reading.counter,
            value = reading.value,
            "liveness counter"
        );
    }
}
