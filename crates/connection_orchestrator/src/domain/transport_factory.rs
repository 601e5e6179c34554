use application_transform::ApplicationKind;
use common::domain::{
    ConnectionKind, CountersSink, CredentialSource, DatastreamResolver, DomainError, DomainResult,
    Uploader,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ApplicationConnection, ApplicationSpec, Connection, CyclePipeline};
use crate::http::{PollingConnection, PollingTransport};
use crate::mqtt::{SubscriptionConnection, SubscriptionTransport};

/// Type alias for a function that creates a polling transport.
pub type PollingTransportConstructor =
    Box<dyn Fn(&ApplicationSpec) -> DomainResult<Arc<dyn PollingTransport>> + Send + Sync>;

/// Type alias for a function that creates a subscription transport.
pub type SubscriptionTransportConstructor = Box<
    dyn Fn(&ApplicationSpec, Arc<dyn CountersSink>) -> DomainResult<Arc<dyn SubscriptionTransport>>
        + Send
        + Sync,
>;

/// Services shared by every connection
#[derive(Clone)]
pub struct ConnectionDependencies {
    pub credentials: Arc<dyn CredentialSource>,
    pub resolver: Arc<dyn DatastreamResolver>,
    pub uploader: Arc<dyn Uploader>,
    pub counters: Arc<dyn CountersSink>,
}

/// Registry of transport constructors keyed by connection and application kind.
///
/// Constructors are registered at startup so the domain layer never names a
/// concrete transport.
///
/// # Example
/// ```ignore
/// let mut factory = TransportFactory::new();
/// factory.register_polling(ApplicationKind::Netatmo, |spec| {
///     Ok(Arc::new(NetatmoTransport::new(&spec.name, &spec.host, spec.settings.timeout)?))
/// });
///
/// let connection = factory.build(&spec, &dependencies)?;
/// ```
#[derive(Default)]
pub struct TransportFactory {
    polling: HashMap<ApplicationKind, PollingTransportConstructor>,
    subscription: HashMap<ApplicationKind, SubscriptionTransportConstructor>,
}

impl std::fmt::Debug for TransportFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportFactory")
            .field("polling", &self.polling.keys().collect::<Vec<_>>())
            .field("subscription", &self.subscription.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_polling<F>(&mut self, kind: ApplicationKind, constructor: F)
    where
        F: Fn(&ApplicationSpec) -> DomainResult<Arc<dyn PollingTransport>> + Send + Sync + 'static,
    {
        self.polling.insert(kind, Box::new(constructor));
    }

    pub fn register_subscription<F>(&mut self, kind: ApplicationKind, constructor: F)
    where
        F: Fn(&ApplicationSpec, Arc<dyn CountersSink>) -> DomainResult<Arc<dyn SubscriptionTransport>>
            + Send
            + Sync
            + 'static,
    {
        self.subscription.insert(kind, Box::new(constructor));
    }

    /// Check that a transport is registered for this application
    pub fn ensure_supported(&self, spec: &ApplicationSpec) -> DomainResult<()> {
        let registered = match spec.connection_kind {
            ConnectionKind::Polling => self.polling.contains_key(&spec.application_kind),
            ConnectionKind::Subscription => self.subscription.contains_key(&spec.application_kind),
        };

        if registered {
            Ok(())
        } else {
            Err(unsupported(spec))
        }
    }

    /// Construct the connection for one application without starting it
    pub fn build(
        &self,
        spec: &ApplicationSpec,
        dependencies: &ConnectionDependencies,
    ) -> DomainResult<Connection> {
        let source: Box<dyn ApplicationConnection> = match spec.connection_kind {
            ConnectionKind::Polling => {
                let transport = self
                    .polling
                    .get(&spec.application_kind)
                    .map(|constructor| constructor(spec))
                    .transpose()?
                    .ok_or_else(|| unsupported(spec))?;
                Box::new(PollingConnection::new(
                    spec.name.clone(),
                    spec.settings.clone(),
                    Arc::clone(&dependencies.credentials),
                    transport,
                ))
            }
            ConnectionKind::Subscription => {
                let transport = self
                    .subscription
                    .get(&spec.application_kind)
                    .map(|constructor| constructor(spec, Arc::clone(&dependencies.counters)))
                    .transpose()?
                    .ok_or_else(|| unsupported(spec))?;
                Box::new(SubscriptionConnection::new(
                    spec.name.clone(),
                    spec.settings.clone(),
                    Arc::clone(&dependencies.credentials),
                    transport,
                ))
            }
        };

        let pipeline = CyclePipeline::new(
            spec.name.clone(),
            spec.application_kind.unpacker(),
            spec.sensor_model.field_table(),
            Arc::clone(&dependencies.resolver),
            Arc::clone(&dependencies.uploader),
            Arc::clone(&dependencies.counters),
        )
        .with_registered_sensors(spec.sensors.clone());

        Ok(Connection::new(
            source,
            pipeline,
            Arc::clone(&dependencies.counters),
        ))
    }
}

fn unsupported(spec: &ApplicationSpec) -> DomainError {
    DomainError::Configuration(format!(
        "application {}: no {} transport registered for {}",
        spec.name, spec.connection_kind, spec.application_kind
    ))
}
