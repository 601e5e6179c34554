use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Duplicate application name: {0}")]
    DuplicateApplication(String),

    #[error("Unknown connection kind: {0}")]
    UnknownConnectionKind(String),

    #[error("Unknown application kind: {0}")]
    UnknownApplicationKind(String),

    #[error("Unknown sensor model: {0}")]
    UnknownSensorModel(String),

    #[error("Authentication failed for {application}: {reason}")]
    Authentication { application: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Payload from {origin} is missing keys: {}", .keys.join(", "))]
    MissingPayloadKeys {
        origin: String,
        keys: Vec<String>,
    },

    #[error("Sensor {sensor_id} is not registered for {application}")]
    UnregisteredSensor {
        application: String,
        sensor_id: String,
    },

    #[error("Datastream not found: sensor {sensor_id}, datastream {datastream_name}")]
    DatastreamNotFound {
        sensor_id: String,
        datastream_name: String,
    },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl DomainError {
    /// Payload-level errors only cost the message they arrived in.
    pub fn is_message_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingPayloadKeys { .. } | Self::UnregisteredSensor { .. }
        )
    }

    pub fn missing_keys<I, S>(origin: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingPayloadKeys {
            origin: origin.to_string(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}
