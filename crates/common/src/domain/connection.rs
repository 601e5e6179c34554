use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a connection acquires raw payloads from its application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Pull-based acquisition on a fixed interval (HTTP)
    Polling,
    /// Push-based acquisition through a broker subscription (MQTT)
    Subscription,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

impl std::str::FromStr for ConnectionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polling" | "http" => Ok(Self::Polling),
            "subscription" | "mqtt" => Ok(Self::Subscription),
            other => Err(DomainError::UnknownConnectionKind(other.to_string())),
        }
    }
}

/// Identity of a connection, unique per application
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionIdentity {
    application_name: String,
    kind: ConnectionKind,
}

impl ConnectionIdentity {
    pub fn new(application_name: impl Into<String>, kind: ConnectionKind) -> Self {
        Self {
            application_name: application_name.into(),
            kind,
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.application_name, self.kind)
    }
}

/// Lifecycle state of a connection. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Authenticating,
    Running,
    Degraded,
    Stopped,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether a worker is (or is about to be) executing for this state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Authenticating | Self::Running | Self::Degraded)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
