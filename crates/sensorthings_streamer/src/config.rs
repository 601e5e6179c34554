use common::domain::{DomainError, DomainResult};
use common::telemetry::{LogFormat, TelemetryConfig};
use ::config::{Config, ConfigError, Environment, File, FileFormat};
use connection_orchestrator::ApplicationConfig;
use frost_client::FrostConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming the YAML configuration file
pub const CONFIG_FILE_ENV: &str = "ST_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "config/streamer.yaml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    // FROST configuration
    /// SensorThings service root
    #[serde(default = "default_frost_endpoint")]
    pub frost_endpoint: String,

    /// Environment variable holding `{"username": ..., "password": ...}` for FROST
    #[serde(default = "default_frost_credentials_env")]
    pub frost_credentials_env: String,

    /// Timeout for FROST requests in seconds
    #[serde(default = "default_frost_request_timeout_secs")]
    pub frost_request_timeout_secs: u64,

    /// Directory holding `.<application>.credentials` files
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,

    /// Per-connection stop timeout during shutdown in seconds
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Interval between liveness counter reports in seconds
    #[serde(default = "default_counter_report_interval_secs")]
    pub counter_report_interval_secs: u64,

    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_frost_endpoint() -> String {
    "http://localhost:8080/FROST-Server/v1.1".to_string()
}

fn default_frost_credentials_env() -> String {
    "FROST_CREDENTIALS".to_string()
}

fn default_frost_request_timeout_secs() -> u64 {
    30
}

fn default_credentials_dir() -> String {
    "credentials".to_string()
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_counter_report_interval_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize)]
struct FrostCredentials {
    username: String,
    #[serde(default)]
    password: Option<String>,
}

impl ServiceConfig {
    /// Load from the file named by `ST_CONFIG_FILE` (or the default path),
    /// with `ST_*` environment variables taking precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(&path)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .add_source(Environment::with_prefix("ST"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.counter_report_interval_secs == 0 {
            return Err(ConfigError::Message(
                "counter_report_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn counter_report_interval(&self) -> Duration {
        Duration::from_secs(self.counter_report_interval_secs)
    }

    pub fn telemetry(&self) -> DomainResult<TelemetryConfig> {
        let log_format = self
            .log_format
            .parse::<LogFormat>()
            .map_err(DomainError::Configuration)?;

        Ok(TelemetryConfig {
            log_level: self.log_level.clone(),
            log_format,
            ..TelemetryConfig::default()
        })
    }

    /// FROST settings, with credentials read from `frost_credentials_env` if set
    pub fn frost(&self) -> DomainResult<FrostConfig> {
        let credentials = match std::env::var(&self.frost_credentials_env) {
            Ok(raw) => Some(parse_frost_credentials(&self.frost_credentials_env, &raw)?),
            Err(_) => None,
        };

        Ok(FrostConfig {
            endpoint: self.frost_endpoint.clone(),
            username: credentials.as_ref().map(|c| c.username.clone()),
            password: credentials.and_then(|c| c.password),
            request_timeout_secs: self.frost_request_timeout_secs,
        })
    }
}

fn parse_frost_credentials(var: &str, raw: &str) -> DomainResult<FrostCredentials> {
    serde_json::from_str(raw)
        .map_err(|e| DomainError::Configuration(format!("{} is not valid credentials JSON: {}", var, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Config tests read the process environment
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let _lock = TEST_LOCK.lock().unwrap();
        std::env::remove_var("ST_LOG_LEVEL");

        let config = ServiceConfig::from_file("/nonexistent/streamer.yaml").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "json");
        assert_eq!(config.stop_timeout(), Duration::from_secs(10));
        assert!(config.applications.is_empty());
    }

    #[test]
    fn test_load_applications_from_yaml() {
        let _lock = TEST_LOCK.lock().unwrap();
        std::env::remove_var("ST_LOG_LEVEL");

        let file = write_config(
            r#"
frost_endpoint: "http://frost:8080/FROST-Server/v1.1"
applications:
  - name: netatmo
    connection_kind: polling
    application_kind: netatmo
    sensor_model: netatmo.nws03
    host: https://api.netatmo.com
    interval_secs: 300
  - name: office-sensors
    connection_kind: subscription
    application_kind: the_things_stack
    sensor_model: milesight.am308l
    host: mqtts://eu1.cloud.thethings.network
    sensors: ["24E124707C481005"]
"#,
        );

        let config = ServiceConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.frost_endpoint, "http://frost:8080/FROST-Server/v1.1");
        assert_eq!(config.applications.len(), 2);
        assert_eq!(config.applications[0].interval_secs, 300);
        assert_eq!(config.applications[1].sensors, vec!["24E124707C481005"]);
        assert_eq!(config.applications[1].max_retries, 3);
    }

    #[test]
    fn test_environment_overrides_file() {
        let _lock = TEST_LOCK.lock().unwrap();
        let file = write_config("log_level: debug\n");

        std::env::set_var("ST_LOG_LEVEL", "warn");
        let config = ServiceConfig::from_file(file.path().to_str().unwrap());
        std::env::remove_var("ST_LOG_LEVEL");

        assert_eq!(config.unwrap().log_level, "warn");
    }

    #[test]
    fn test_zero_report_interval_is_rejected() {
        let _lock = TEST_LOCK.lock().unwrap();
        std::env::remove_var("ST_LOG_LEVEL");
        let file = write_config("counter_report_interval_secs: 0\n");

        let result = ServiceConfig::from_file(file.path().to_str().unwrap());
        assert!(matches!(
            result,
            Err(ConfigError::Message(msg)) if msg.contains("counter_report_interval_secs")
        ));
    }

    #[test]
    fn test_telemetry_rejects_unknown_format() {
        let _lock = TEST_LOCK.lock().unwrap();
        std::env::remove_var("ST_LOG_LEVEL");

        let mut config = ServiceConfig::from_file("/nonexistent/streamer.yaml").unwrap();
        config.log_format = "xml".to_string();
        assert!(matches!(
            config.telemetry(),
            Err(DomainError::Configuration(_))
        ));

        config.log_format = "pretty".to_string();
        assert_eq!(config.telemetry().unwrap().log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_frost_credentials() {
        let parsed =
            parse_frost_credentials("FROST_CREDENTIALS", r#"{"username": "writer", "password": "pw"}"#)
                .unwrap();
        assert_eq!(parsed.username, "writer");
        assert_eq!(parsed.password.as_deref(), Some("pw"));

        assert!(parse_frost_credentials("FROST_CREDENTIALS", "writer:pw").is_err());
    }
}
