use common::domain::{ConnectionIdentity, ConnectionState, DomainError, DomainResult};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::{
    ApplicationConfig, Connection, ConnectionDependencies, StopOutcome, TransportFactory,
};

/// Owns one connection per configured application.
///
/// Every application is validated before any connection is constructed, so
/// a bad entry fails the whole set before a single worker exists.
pub struct ConnectionSupervisor {
    connections: Vec<Connection>,
    stop_timeout: Duration,
}

impl ConnectionSupervisor {
    pub fn build(
        applications: &[ApplicationConfig],
        factory: &TransportFactory,
        dependencies: &ConnectionDependencies,
        stop_timeout: Duration,
    ) -> DomainResult<Self> {
        let mut names = HashSet::new();
        let mut specs = Vec::with_capacity(applications.len());

        for application in applications {
            let spec = application.validate()?;
            if !names.insert(spec.name.clone()) {
                return Err(DomainError::DuplicateApplication(spec.name));
            }
            factory.ensure_supported(&spec)?;
            specs.push(spec);
        }

        let connections = specs
            .iter()
            .map(|spec| factory.build(spec, dependencies))
            .collect::<DomainResult<Vec<_>>>()?;

        info!(connections = connections.len(), "connection set built");
        Ok(Self {
            connections,
            stop_timeout,
        })
    }

    /// Assemble a supervisor from prebuilt connections
    pub fn from_connections(connections: Vec<Connection>, stop_timeout: Duration) -> DomainResult<Self> {
        let mut names = HashSet::new();
        for connection in &connections {
            let name = connection.identity().application_name();
            if !names.insert(name.to_string()) {
                return Err(DomainError::DuplicateApplication(name.to_string()));
            }
        }

        Ok(Self {
            connections,
            stop_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn connection(&self, application_name: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.identity().application_name() == application_name)
    }

    pub fn start_all(&mut self) {
        for connection in &mut self.connections {
            connection.start();
        }
        info!(connections = self.connections.len(), "all connections started");
    }

    pub fn states(&self) -> Vec<(ConnectionIdentity, ConnectionState)> {
        self.connections
            .iter()
            .map(|c| (c.identity().clone(), c.state()))
            .collect()
    }

    /// Resolves once every connection has reached `Stopped`
    pub async fn all_stopped(&self) {
        for connection in &self.connections {
            connection.stopped().await;
        }
    }

    /// Stop every connection, continuing past ones that fail to stop in time
    pub async fn shutdown(&mut self) -> Vec<(ConnectionIdentity, StopOutcome)> {
        info!(
            connections = self.connections.len(),
            timeout_secs = self.stop_timeout.as_secs(),
            "shutting down connections"
        );

        let mut outcomes = Vec::with_capacity(self.connections.len());
        for connection in &mut self.connections {
            let outcome = connection.stop(self.stop_timeout).await;
            match outcome {
                StopOutcome::Graceful | StopOutcome::NotStarted => {}
                StopOutcome::Abandoned => {
                    warn!(connection = %connection.identity(), "connection abandoned during shutdown")
                }
                StopOutcome::Panicked => {
                    error!(connection = %connection.identity(), "connection worker panicked")
                }
            }
            outcomes.push((connection.identity().clone(), outcome));
        }

        info!("all connections stopped");
        outcomes
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("connections", &self.connections)
            .field("stop_timeout", &self.stop_timeout)
            .finish()
    }
}
