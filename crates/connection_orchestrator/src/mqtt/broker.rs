use common::domain::{DomainError, DomainResult};

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTTS_PORT: u16 = 8883;

/// Where and how to reach an MQTT broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse a broker host in the form `[scheme://]host[:port]`.
///
/// `mqtts://` and `ssl://` imply TLS. An explicit `port` overrides any port
/// in the host string.
pub fn parse_broker_address(host: &str, port: Option<u16>, tls: bool) -> DomainResult<BrokerAddress> {
    let (rest, tls) = match host.split_once("://") {
        Some(("mqtts" | "ssl", rest)) => (rest, true),
        Some(("mqtt" | "tcp", rest)) => (rest, tls),
        Some((scheme, _)) => {
            return Err(DomainError::Configuration(format!(
                "unsupported broker scheme: {}",
                scheme
            )))
        }
        None => (host, tls),
    };
    let rest = rest.trim_end_matches('/');

    let (hostname, embedded_port) = match rest.split(':').collect::<Vec<_>>().as_slice() {
        [hostname] => (*hostname, None),
        [hostname, port] => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::Configuration(format!("invalid port in broker host: {}", port))
            })?;
            (*hostname, Some(port))
        }
        _ => {
            return Err(DomainError::Configuration(format!(
                "invalid broker host format: {}",
                host
            )))
        }
    };

    if hostname.is_empty() {
        return Err(DomainError::Configuration(format!(
            "broker host is empty: {}",
            host
        )));
    }

    let default_port = if tls { DEFAULT_MQTTS_PORT } else { DEFAULT_MQTT_PORT };
    Ok(BrokerAddress {
        host: hostname.to_string(),
        port: port.or(embedded_port).unwrap_or(default_port),
        tls,
    })
}

/// Uplink topic of a The Things Stack application
pub fn default_uplink_topic(application_name: &str) -> String {
    format!("v3/{}@ttn/devices/+/up", application_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_port() {
        let address = parse_broker_address("mqtt://localhost:1884", None, false).unwrap();
        assert_eq!(address.host, "localhost");
        assert_eq!(address.port, 1884);
        assert!(!address.tls);
    }

    #[test]
    fn test_parse_without_scheme_uses_default_port() {
        let address = parse_broker_address("eu1.cloud.thethings.network", None, false).unwrap();
        assert_eq!(address.port, DEFAULT_MQTT_PORT);
    }

    #[test]
    fn test_tls_scheme_defaults_to_secure_port() {
        let address = parse_broker_address("mqtts://eu1.cloud.thethings.network", None, false).unwrap();
        assert!(address.tls);
        assert_eq!(address.port, DEFAULT_MQTTS_PORT);
    }

    #[test]
    fn test_explicit_port_wins() {
        let address = parse_broker_address("tcp://broker.local:1883", Some(2883), false).unwrap();
        assert_eq!(address.port, 2883);
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(parse_broker_address("ws://broker.local", None, false).is_err());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(parse_broker_address("broker.local:abc", None, false).is_err());
    }

    #[test]
    fn test_default_uplink_topic() {
        assert_eq!(
            default_uplink_topic("office-sensors"),
            "v3/office-sensors@ttn/devices/+/up"
        );
    }
}
