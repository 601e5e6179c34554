use async_trait::async_trait;
use common::domain::{
    ConnectionIdentity, ConnectionKind, Credential, CredentialSource, DomainError, DomainResult,
    RawPayload,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{
    Acquisition, ApplicationConnection, ConnectionSettings, TransportGuard, TransportTeardown,
};

/// Sending half of a subscription's inbound queue
pub type Inbox = mpsc::UnboundedSender<RawPayload>;

/// Broker transport used by a subscription connection
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SubscriptionTransport: Send + Sync {
    /// Connect, subscribe, and deliver every decoded inbound message to
    /// `inbox` from the transport's own task. Delivery must never block.
    ///
    /// Returns only once the broker has acknowledged the subscription. The
    /// transport drops `inbox` when the broker session ends.
    async fn subscribe(&self, credential: &Credential, inbox: Inbox) -> DomainResult<()>;

    /// Unsubscribe and disconnect
    async fn close(&self);
}

struct SubscriptionTeardown(Arc<dyn SubscriptionTransport>);

#[async_trait]
impl TransportTeardown for SubscriptionTeardown {
    async fn teardown(&self) {
        self.0.close().await;
    }
}

/// Push-based connection: the transport enqueues messages as they arrive
/// and the worker dequeues them with a liveness timeout.
///
/// Each subscription gets its own queue. When the transport drops its end
/// the next acquisition fails with a transport error and the one after
/// that subscribes again.
pub struct SubscriptionConnection {
    identity: ConnectionIdentity,
    settings: ConnectionSettings,
    credentials: Arc<dyn CredentialSource>,
    credential: Option<Credential>,
    transport: Arc<dyn SubscriptionTransport>,
    guard: Arc<TransportGuard>,
    queue: Option<mpsc::UnboundedReceiver<RawPayload>>,
    stop_token: CancellationToken,
}

impl SubscriptionConnection {
    pub fn new(
        application_name: impl Into<String>,
        settings: ConnectionSettings,
        credentials: Arc<dyn CredentialSource>,
        transport: Arc<dyn SubscriptionTransport>,
    ) -> Self {
        let identity = ConnectionIdentity::new(application_name, ConnectionKind::Subscription);
        let guard = Arc::new(TransportGuard::new(
            identity.application_name(),
            Arc::new(SubscriptionTeardown(Arc::clone(&transport))),
        ));
        Self {
            identity,
            settings,
            credentials,
            credential: None,
            transport,
            guard,
            queue: None,
            stop_token: CancellationToken::new(),
        }
    }

    async fn open_subscription(&self) -> DomainResult<mpsc::UnboundedReceiver<RawPayload>> {
        let credential = self.credential.as_ref().ok_or_else(|| DomainError::Authentication {
            application: self.identity.application_name().to_string(),
            reason: "subscription attempted before authentication".to_string(),
        })?;

        let (inbox, queue) = mpsc::unbounded_channel();
        self.transport.subscribe(credential, inbox).await?;
        info!(application = %self.identity.application_name(), "subscribed");
        Ok(queue)
    }
}

#[async_trait]
impl ApplicationConnection for SubscriptionConnection {
    fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn authenticate(&mut self) -> DomainResult<()> {
        if self.credential.is_none() {
            let credential = self
                .credentials
                .load(self.identity.application_name(), ConnectionKind::Subscription)
                .await?;
            self.credential = Some(credential);
        }
        Ok(())
    }

    async fn acquire_raw_payload(&mut self) -> DomainResult<Acquisition> {
        let mut queue = match self.queue.take() {
            Some(queue) => queue,
            None => self.open_subscription().await?,
        };

        // A stop request ends the wait; the worker discards the cycle
        let received = tokio::select! {
            _ = self.stop_token.cancelled() => None,
            received = tokio::time::timeout(self.settings.timeout, queue.recv()) => Some(received),
        };

        match received {
            Some(Ok(None)) => {
                warn!(
                    application = %self.identity.application_name(),
                    "broker session ended, resubscribing on next cycle"
                );
                Err(DomainError::Transport("broker session ended".to_string()))
            }
            received => {
                self.queue = Some(queue);
                match received {
                    Some(Ok(Some(payload))) => Ok(Acquisition::Payload(payload)),
                    _ => Ok(Acquisition::Empty),
                }
            }
        }
    }

    fn transport(&self) -> Arc<TransportGuard> {
        Arc::clone(&self.guard)
    }

    fn cycle_interval(&self) -> Option<Duration> {
        None
    }

    fn failure_backoff(&self) -> Duration {
        self.settings.retry_delay
    }

    fn bind_stop_token(&mut self, stop_token: CancellationToken) {
        self.stop_token = stop_token;
    }
}
