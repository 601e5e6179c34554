use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for a SensorThings (FROST) server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrostConfig {
    /// Service root, e.g. `http://localhost:8080/FROST-Server/v1.1`
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for FrostConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/FROST-Server/v1.1".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 30,
        }
    }
}

impl FrostConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
