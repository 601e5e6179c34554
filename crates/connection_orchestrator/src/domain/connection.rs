use common::domain::{ConnectionIdentity, ConnectionState, CountersSink};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::worker::{run_connection_worker, WorkerContext};
use crate::domain::{ApplicationConnection, ConnectionStateCell, CyclePipeline, TransportGuard};

/// How a call to [`Connection::stop`] concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker exited within the timeout
    Graceful,
    /// The worker panicked before it could be joined
    Panicked,
    /// The worker did not exit in time and was left to finish on its own
    Abandoned,
    /// No worker was ever started
    NotStarted,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => write!(f, "graceful"),
            Self::Panicked => write!(f, "panicked"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::NotStarted => write!(f, "not_started"),
        }
    }
}

/// Handle to one application connection and its worker task.
pub struct Connection {
    identity: ConnectionIdentity,
    state: ConnectionStateCell,
    transport: Arc<TransportGuard>,
    pipeline: Arc<CyclePipeline>,
    counters: Arc<dyn CountersSink>,
    stop_token: CancellationToken,
    source: Option<Box<dyn ApplicationConnection>>,
    worker: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(
        source: Box<dyn ApplicationConnection>,
        pipeline: CyclePipeline,
        counters: Arc<dyn CountersSink>,
    ) -> Self {
        Self {
            identity: source.identity().clone(),
            state: ConnectionStateCell::new(),
            transport: source.transport(),
            pipeline: Arc::new(pipeline),
            counters,
            stop_token: CancellationToken::new(),
            source: Some(source),
            worker: None,
        }
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Resolves once the connection has reached `Stopped`
    pub async fn stopped(&self) {
        self.state.stopped().await
    }

    /// Spawn the worker. Must be called from within a tokio runtime.
    ///
    /// Only an `Idle` connection starts; calling this on an active
    /// connection is a no-op and a stopped connection never restarts.
    pub fn start(&mut self) {
        match self.state.get() {
            ConnectionState::Idle => {}
            ConnectionState::Stopped => {
                warn!(connection = %self.identity, "connection is stopped and cannot be restarted");
                return;
            }
            state => {
                debug!(connection = %self.identity, state = %state, "connection already started");
                return;
            }
        }

        let Some(mut source) = self.source.take() else {
            return;
        };
        source.bind_stop_token(self.stop_token.clone());

        self.state.transition(ConnectionState::Authenticating);
        let ctx = WorkerContext {
            state: self.state.clone(),
            pipeline: Arc::clone(&self.pipeline),
            counters: Arc::clone(&self.counters),
            transport: Arc::clone(&self.transport),
            stop_token: self.stop_token.clone(),
        };
        self.worker = Some(tokio::spawn(run_connection_worker(source, ctx)));

        info!(connection = %self.identity, "connection started");
    }

    /// Signal the worker to stop and wait up to `timeout` for it to exit.
    ///
    /// A worker that outlives the timeout is abandoned rather than aborted.
    /// Either way the transport is torn down and the state is `Stopped`
    /// when this returns.
    pub async fn stop(&mut self, timeout: Duration) -> StopOutcome {
        self.stop_token.cancel();

        let outcome = match self.worker.take() {
            Some(handle) => match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {
                    debug!(connection = %self.identity, "worker stopped gracefully");
                    StopOutcome::Graceful
                }
                Ok(Err(e)) => {
                    error!(connection = %self.identity, "worker panicked: {:?}", e);
                    StopOutcome::Panicked
                }
                Err(_) => {
                    warn!(
                        connection = %self.identity,
                        timeout_ms = timeout.as_millis() as u64,
                        "worker did not stop within timeout, abandoning it"
                    );
                    StopOutcome::Abandoned
                }
            },
            None => StopOutcome::NotStarted,
        };

        self.source = None;
        self.transport.teardown().await;
        self.state.transition(ConnectionState::Stopped);
        outcome
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("state", &self.state.get())
            .field("transport", &self.transport)
            .finish()
    }
}
