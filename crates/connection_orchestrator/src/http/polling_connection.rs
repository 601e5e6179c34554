use async_trait::async_trait;
use common::domain::{
    ConnectionIdentity, ConnectionKind, Credential, CredentialSource, DomainResult, RawPayload,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::{
    Acquisition, ApplicationConnection, ConnectionSettings, TransportGuard, TransportTeardown,
};

/// Request/response transport used by a polling connection
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PollingTransport: Send + Sync {
    /// Exchange the stored credential for whatever the endpoint needs
    async fn authenticate(&self, credential: &Credential) -> DomainResult<()>;

    /// Fetch the application's current payload
    async fn fetch(&self) -> DomainResult<RawPayload>;

    /// Drop any session state held by the transport
    async fn close(&self);
}

struct PollingTeardown(Arc<dyn PollingTransport>);

#[async_trait]
impl TransportTeardown for PollingTeardown {
    async fn teardown(&self) {
        self.0.close().await;
    }
}

/// Pull-based connection: fetch on a fixed interval and skip payloads that
/// have not changed since the previous cycle.
pub struct PollingConnection {
    identity: ConnectionIdentity,
    settings: ConnectionSettings,
    credentials: Arc<dyn CredentialSource>,
    credential: Option<Credential>,
    transport: Arc<dyn PollingTransport>,
    guard: Arc<TransportGuard>,
    last_payload: Option<RawPayload>,
}

impl PollingConnection {
    pub fn new(
        application_name: impl Into<String>,
        settings: ConnectionSettings,
        credentials: Arc<dyn CredentialSource>,
        transport: Arc<dyn PollingTransport>,
    ) -> Self {
        let identity = ConnectionIdentity::new(application_name, ConnectionKind::Polling);
        let guard = Arc::new(TransportGuard::new(
            identity.application_name(),
            Arc::new(PollingTeardown(Arc::clone(&transport))),
        ));
        Self {
            identity,
            settings,
            credentials,
            credential: None,
            transport,
            guard,
            last_payload: None,
        }
    }
}

#[async_trait]
impl ApplicationConnection for PollingConnection {
    fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn authenticate(&mut self) -> DomainResult<()> {
        if self.credential.is_some() {
            return Ok(());
        }

        let credential = self
            .credentials
            .load(self.identity.application_name(), ConnectionKind::Polling)
            .await?;
        self.transport.authenticate(&credential).await?;
        self.credential = Some(credential);

        info!(application = %self.identity.application_name(), "authenticated");
        Ok(())
    }

    async fn acquire_raw_payload(&mut self) -> DomainResult<Acquisition> {
        let payload = self.transport.fetch().await?;

        if self.last_payload.as_ref() == Some(&payload) {
            return Ok(Acquisition::Unchanged);
        }

        debug!(application = %self.identity.application_name(), "fetched new payload");
        self.last_payload = Some(payload.clone());
        Ok(Acquisition::Payload(payload))
    }

    fn transport(&self) -> Arc<TransportGuard> {
        Arc::clone(&self.guard)
    }

    fn cycle_interval(&self) -> Option<Duration> {
        Some(self.settings.request_interval)
    }

    fn failure_backoff(&self) -> Duration {
        self.settings.retry_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{DomainError, MockCredentialSource};
    use serde_json::json;

    fn credentials() -> Arc<dyn CredentialSource> {
        let mut source = MockCredentialSource::new();
        source
            .expect_load()
            .returning(|_, _| Ok([("access_token", "abc")].into_iter().collect()));
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_authenticate_caches_credential() {
        let mut source = MockCredentialSource::new();
        source
            .expect_load()
            .times(1)
            .returning(|_, _| Ok([("access_token", "abc")].into_iter().collect()));

        let mut transport = MockPollingTransport::new();
        transport.expect_authenticate().times(1).returning(|_| Ok(()));

        let mut connection = PollingConnection::new(
            "office",
            ConnectionSettings::default(),
            Arc::new(source),
            Arc::new(transport),
        );

        connection.authenticate().await.unwrap();
        connection.authenticate().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_credential_is_authentication_error() {
        let mut source = MockCredentialSource::new();
        source.expect_load().returning(|name, _| {
            Err(DomainError::Authentication {
                application: name.to_string(),
                reason: "no credentials file".to_string(),
            })
        });

        let mut transport = MockPollingTransport::new();
        transport.expect_authenticate().times(0);

        let mut connection = PollingConnection::new(
            "office",
            ConnectionSettings::default(),
            Arc::new(source),
            Arc::new(transport),
        );

        assert!(matches!(
            connection.authenticate().await,
            Err(DomainError::Authentication { .. })
        ));
    }

    #[tokio::test]
    async fn test_identical_payload_is_unchanged() {
        let mut transport = MockPollingTransport::new();
        let mut responses = vec![json!({"a": 1}), json!({"a": 1}), json!({"a": 2})].into_iter();
        transport
            .expect_fetch()
            .times(3)
            .returning(move || Ok(responses.next().unwrap()));

        let mut connection = PollingConnection::new(
            "office",
            ConnectionSettings::default(),
            credentials(),
            Arc::new(transport),
        );

        assert_eq!(
            connection.acquire_raw_payload().await.unwrap(),
            Acquisition::Payload(json!({"a": 1}))
        );
        assert_eq!(
            connection.acquire_raw_payload().await.unwrap(),
            Acquisition::Unchanged
        );
        assert_eq!(
            connection.acquire_raw_payload().await.unwrap(),
            Acquisition::Payload(json!({"a": 2}))
        );
    }

    #[tokio::test]
    async fn test_fetch_error_is_propagated() {
        let mut transport = MockPollingTransport::new();
        transport
            .expect_fetch()
            .returning(|| Err(DomainError::Transport("connection refused".to_string())));

        let mut connection = PollingConnection::new(
            "office",
            ConnectionSettings::default(),
            credentials(),
            Arc::new(transport),
        );

        assert!(matches!(
            connection.acquire_raw_payload().await,
            Err(DomainError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_guard_closes_transport_once() {
        let mut transport = MockPollingTransport::new();
        transport.expect_close().times(1).returning(|| ());

        let connection = PollingConnection::new(
            "office",
            ConnectionSettings::default(),
            credentials(),
            Arc::new(transport),
        );

        let guard = connection.transport();
        guard.teardown().await;
        guard.teardown().await;
        assert!(guard.is_torn_down());
    }
}
