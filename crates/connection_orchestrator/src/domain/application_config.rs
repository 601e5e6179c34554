use application_transform::{ApplicationKind, SensorModel};
use common::domain::{ConnectionIdentity, ConnectionKind, DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Timing and retry settings for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Consecutive failures (or empty dequeues) tolerated before stopping
    pub max_retries: u32,
    /// Per-request timeout for polling, dequeue timeout for subscriptions
    pub timeout: Duration,
    /// Pause between polling cycles
    pub request_interval: Duration,
    /// Backoff after a failed polling cycle
    pub retry_delay: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout: Duration::from_secs(default_timeout_secs()),
            request_interval: Duration::from_secs(default_interval_secs()),
            retry_delay: Duration::from_secs(default_retry_delay_secs()),
        }
    }
}

/// One configured application, as read from the service configuration.
///
/// Kinds are kept as strings so that an unknown kind is reported by
/// [`ApplicationConfig::validate`] with the offending value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,

    /// `polling` (HTTP) or `subscription` (MQTT)
    pub connection_kind: String,

    #[serde(default = "default_application_kind")]
    pub application_kind: String,

    pub sensor_model: String,

    /// Base URL for polling, broker host for subscriptions
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    /// Subscription topic; defaults to the application's uplink topic
    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub tls: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Sensor ids this application may report; empty accepts any sensor
    #[serde(default)]
    pub sensors: Vec<String>,
}

fn default_application_kind() -> String {
    "null".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_interval_secs() -> u64 {
    60
}

fn default_retry_delay_secs() -> u64 {
    10
}

/// A validated application: kinds resolved, settings converted
#[derive(Debug, Clone)]
pub struct ApplicationSpec {
    pub name: String,
    pub connection_kind: ConnectionKind,
    pub application_kind: ApplicationKind,
    pub sensor_model: SensorModel,
    pub host: String,
    pub port: Option<u16>,
    pub topic: Option<String>,
    pub tls: bool,
    pub settings: ConnectionSettings,
    pub sensors: BTreeSet<String>,
}

impl ApplicationSpec {
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity::new(self.name.clone(), self.connection_kind)
    }
}

impl ApplicationConfig {
    pub fn validate(&self) -> DomainResult<ApplicationSpec> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::Configuration(
                "application name must not be empty".to_string(),
            ));
        }

        let connection_kind = self.connection_kind.parse::<ConnectionKind>()?;
        let application_kind = self.application_kind.parse::<ApplicationKind>()?;
        let sensor_model = self.sensor_model.parse::<SensorModel>()?;

        if self.host.trim().is_empty() {
            return Err(DomainError::Configuration(format!(
                "application {} has no host",
                name
            )));
        }
        if self.max_retries == 0 {
            return Err(DomainError::Configuration(format!(
                "application {}: max_retries must be at least 1",
                name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(DomainError::Configuration(format!(
                "application {}: timeout_secs must be positive",
                name
            )));
        }

        Ok(ApplicationSpec {
            name: name.to_string(),
            connection_kind,
            application_kind,
            sensor_model,
            host: self.host.trim().to_string(),
            port: self.port,
            topic: self.topic.clone(),
            tls: self.tls,
            settings: ConnectionSettings {
                max_retries: self.max_retries,
                timeout: Duration::from_secs(self.timeout_secs),
                request_interval: Duration::from_secs(self.interval_secs),
                retry_delay: Duration::from_secs(self.retry_delay_secs),
            },
            sensors: self.sensors.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
pub(crate) fn test_application(name: &str, connection_kind: &str) -> ApplicationConfig {
    ApplicationConfig {
        name: name.to_string(),
        connection_kind: connection_kind.to_string(),
        application_kind: "null".to_string(),
        sensor_model: "netatmo.nws03".to_string(),
        host: "http://localhost:8080".to_string(),
        port: None,
        topic: None,
        tls: false,
        timeout_secs: 5,
        max_retries: 3,
        interval_secs: 60,
        retry_delay_secs: 10,
        sensors: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_resolves_kinds() {
        let mut config = test_application("office", "mqtt");
        config.application_kind = "the_things_stack".to_string();
        config.sensor_model = "milesight.am308l".to_string();
        config.sensors = vec!["24E124707C481005".to_string()];

        let spec = config.validate().unwrap();
        assert_eq!(spec.connection_kind, ConnectionKind::Subscription);
        assert_eq!(spec.application_kind, ApplicationKind::TheThingsStack);
        assert_eq!(spec.sensor_model, SensorModel::MilesightAm308l);
        assert!(spec.sensors.contains("24E124707C481005"));
        assert_eq!(spec.settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_unknown_connection_kind() {
        let config = test_application("office", "websocket");
        assert!(matches!(
            config.validate(),
            Err(DomainError::UnknownConnectionKind(kind)) if kind == "websocket"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_sensor_model() {
        let mut config = test_application("office", "polling");
        config.sensor_model = "acme.x1".to_string();
        assert!(matches!(
            config.validate(),
            Err(DomainError::UnknownSensorModel(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = test_application("office", "polling");
        config.max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: ApplicationConfig = serde_json::from_value(serde_json::json!({
            "name": "netatmo",
            "connection_kind": "polling",
            "sensor_model": "netatmo.nws03",
            "host": "https://api.netatmo.com"
        }))
        .unwrap();

        assert_eq!(config.application_kind, "null");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.interval_secs, 60);
        assert!(config.sensors.is_empty());
    }
}
