use common::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::unpackers::{NETATMO_UNPACKER, NULL_UNPACKER, THE_THINGS_STACK_UNPACKER};
use crate::ApplicationUnpacker;

/// Closed set of supported applications, each bound to one unpacker
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    /// Payloads already arrive as `sensor id -> fields`
    #[default]
    Null,
    /// Netatmo weather station API
    Netatmo,
    /// The Things Stack LoRaWAN network server
    TheThingsStack,
}

impl ApplicationKind {
    /// Unpacker registered for this application kind
    pub fn unpacker(&self) -> &'static dyn ApplicationUnpacker {
        match self {
            Self::Null => &NULL_UNPACKER,
            Self::Netatmo => &NETATMO_UNPACKER,
            Self::TheThingsStack => &THE_THINGS_STACK_UNPACKER,
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Netatmo => write!(f, "netatmo"),
            Self::TheThingsStack => write!(f, "the_things_stack"),
        }
    }
}

impl std::str::FromStr for ApplicationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "null" | "none" => Ok(Self::Null),
            "netatmo" => Ok(Self::Netatmo),
            "the_things_stack" | "thethingsstack" | "tts" | "ttn" => Ok(Self::TheThingsStack),
            other => Err(DomainError::UnknownApplicationKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(
            "TheThingsStack".parse::<ApplicationKind>().unwrap(),
            ApplicationKind::TheThingsStack
        );
        assert_eq!("netatmo".parse::<ApplicationKind>().unwrap(), ApplicationKind::Netatmo);
        assert_eq!("none".parse::<ApplicationKind>().unwrap(), ApplicationKind::Null);
    }

    #[test]
    fn test_unknown_kind_fails() {
        assert!(matches!(
            "milesight-cloud".parse::<ApplicationKind>(),
            Err(DomainError::UnknownApplicationKind(_))
        ));
    }

    #[test]
    fn test_registry_binds_unpackers() {
        assert_eq!(ApplicationKind::Null.unpacker().name(), "null");
        assert_eq!(ApplicationKind::Netatmo.unpacker().name(), "netatmo");
        assert_eq!(
            ApplicationKind::TheThingsStack.unpacker().name(),
            "the_things_stack"
        );
    }
}
