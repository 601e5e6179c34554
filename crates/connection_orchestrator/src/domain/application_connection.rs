use async_trait::async_trait;
use common::domain::{ConnectionIdentity, DomainResult, RawPayload};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::domain::{ConnectionSettings, TransportGuard};

/// Result of one acquisition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    /// A new raw payload to process
    Payload(RawPayload),
    /// Polling returned the same payload as the previous cycle
    Unchanged,
    /// No message arrived within the dequeue timeout
    Empty,
}

/// The discipline-specific half of a connection.
///
/// The shared worker loop drives any implementation through the same
/// cycle: authenticate if needed, acquire, then hand the payload to the
/// transform pipeline. Transport errors returned from these methods are
/// retried under the connection's failure budget, while
/// `DomainError::Authentication` stops the connection.
#[async_trait]
pub trait ApplicationConnection: Send {
    fn identity(&self) -> &ConnectionIdentity;

    fn settings(&self) -> &ConnectionSettings;

    /// Obtain and cache a credential. A no-op once a credential is held.
    async fn authenticate(&mut self) -> DomainResult<()>;

    async fn acquire_raw_payload(&mut self) -> DomainResult<Acquisition>;

    /// Teardown guard for the underlying transport
    fn transport(&self) -> Arc<TransportGuard>;

    /// Pause after a successful cycle, if the discipline paces itself
    fn cycle_interval(&self) -> Option<Duration>;

    /// Pause after a failed acquisition
    fn failure_backoff(&self) -> Duration;

    /// Hand over the connection's stop token before the worker starts.
    /// Disciplines whose acquisition only waits can use it to end the wait.
    fn bind_stop_token(&mut self, _stop_token: CancellationToken) {}
}
