use common::domain::{ConnectionState, CountersSink, DomainError, DomainResult, LivenessCounter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{
    Acquisition, ApplicationConnection, ConnectionStateCell, CyclePipeline, TransportGuard,
};

/// Everything a worker shares with its connection handle
pub(crate) struct WorkerContext {
    pub state: ConnectionStateCell,
    pub pipeline: Arc<CyclePipeline>,
    pub counters: Arc<dyn CountersSink>,
    pub transport: Arc<TransportGuard>,
    pub stop_token: CancellationToken,
}

enum CycleOutcome {
    Processed,
    Unchanged,
    Empty,
}

/// Worker loop shared by every connection discipline.
///
/// Runs until the stop token is cancelled, authentication is refused, or
/// the consecutive-failure budget is spent. The token is checked between
/// cycles and during pauses; a cycle in progress runs to completion unless
/// the discipline ends its own wait through `bind_stop_token`.
/// Always leaves the transport torn down and the state `Stopped`.
#[instrument(
    name = "connection_worker",
    skip_all,
    fields(
        application = %connection.identity().application_name(),
        kind = %connection.identity().kind(),
    )
)]
pub(crate) async fn run_connection_worker(
    mut connection: Box<dyn ApplicationConnection>,
    ctx: WorkerContext,
) {
    let application = connection.identity().application_name().to_string();
    let max_retries = connection.settings().max_retries;
    let mut consecutive_failures: u32 = 0;

    info!("connection worker started");

    loop {
        if ctx.stop_token.is_cancelled() {
            debug!("stop requested");
            break;
        }

        let outcome = run_cycle(connection.as_mut(), &ctx).await;
        if ctx.stop_token.is_cancelled() {
            debug!("stop requested during cycle");
            break;
        }

        let backoff = match outcome {
            Ok(CycleOutcome::Processed) | Ok(CycleOutcome::Unchanged) => {
                if consecutive_failures > 0 {
                    info!(after_failures = consecutive_failures, "connection recovered");
                }
                consecutive_failures = 0;
                ctx.state.transition(ConnectionState::Running);
                connection.cycle_interval()
            }
            Ok(CycleOutcome::Empty) => {
                ctx.counters
                    .increment(LivenessCounter::Timeout, &application, 1);
                consecutive_failures += 1;
                if consecutive_failures >= max_retries {
                    error!(
                        critical = true,
                        timeouts = consecutive_failures,
                        "no messages received within the liveness budget, stopping connection"
                    );
                    break;
                }
                warn!(
                    attempt = consecutive_failures,
                    max_attempts = max_retries,
                    "no message received before timeout"
                );
                ctx.state.transition(ConnectionState::Degraded);
                None
            }
            Err(e @ DomainError::Authentication { .. }) => {
                error!(critical = true, error = %e, "authentication failed, stopping connection");
                break;
            }
            Err(e) => {
                ctx.counters
                    .increment(LivenessCounter::AcquireFail, &application, 1);
                consecutive_failures += 1;
                if consecutive_failures >= max_retries {
                    error!(
                        critical = true,
                        error = %e,
                        max_retries,
                        "max retry attempts reached, stopping connection"
                    );
                    break;
                }
                warn!(
                    error = %e,
                    attempt = consecutive_failures,
                    max_attempts = max_retries,
                    "acquisition failed, retrying"
                );
                ctx.state.transition(ConnectionState::Degraded);
                Some(connection.failure_backoff())
            }
        };

        if let Some(pause) = backoff.filter(|pause| !pause.is_zero()) {
            if !pause_or_stop(&ctx.stop_token, pause).await {
                break;
            }
        }
    }

    ctx.stop_token.cancel();
    ctx.transport.teardown().await;
    ctx.state.transition(ConnectionState::Stopped);
    info!("connection worker stopped");
}

/// Sleep for `pause`; returns false if a stop was requested meanwhile
async fn pause_or_stop(stop_token: &CancellationToken, pause: Duration) -> bool {
    tokio::select! {
        _ = stop_token.cancelled() => false,
        _ = tokio::time::sleep(pause) => true,
    }
}

async fn run_cycle(
    connection: &mut dyn ApplicationConnection,
    ctx: &WorkerContext,
) -> DomainResult<CycleOutcome> {
    connection.authenticate().await?;
    if ctx.state.get() == ConnectionState::Authenticating {
        ctx.state.transition(ConnectionState::Running);
    }

    let raw = match connection.acquire_raw_payload().await? {
        Acquisition::Payload(raw) => raw,
        Acquisition::Unchanged => {
            debug!("payload unchanged since last cycle, skipping");
            return Ok(CycleOutcome::Unchanged);
        }
        Acquisition::Empty => return Ok(CycleOutcome::Empty),
    };

    let application = ctx.pipeline.application_name();
    ctx.counters
        .increment(LivenessCounter::PayloadReceived, application, 1);

    if let Err(e) = ctx.pipeline.process(&raw).await {
        warn!(error = %e, "dropping payload");
        ctx.counters
            .increment(LivenessCounter::RejectedPayload, application, 1);
    }

    Ok(CycleOutcome::Processed)
}
