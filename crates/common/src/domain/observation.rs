use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Vendor-assigned sensor identifier (MAC address, LoRaWAN DevEUI, ...)
pub type SensorId = String;

/// Vendor-native payload as received from an application
pub type RawPayload = Value;

/// Field name to raw value for one sensor, in payload order
pub type FieldMap = Map<String, Value>;

/// Sensor id to field map, produced by an application unpacker.
///
/// Only reachable sensors of the issuing application appear as keys.
pub type UnpackedPayload = BTreeMap<SensorId, FieldMap>;

/// A standardized (sensor, datastream, time, value) observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObservation {
    pub sensor_id: SensorId,
    pub datastream_name: String,
    pub phenomenon_time: DateTime<Utc>,
    pub result: Value,
}

/// Parse a device-reported timestamp.
///
/// Devices report either epoch seconds (Netatmo `time_utc`) or RFC 3339
/// strings (LoRaWAN network server `received_at`).
pub fn parse_phenomenon_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                Utc.timestamp_opt(secs, 0).single()
            } else {
                let secs = n.as_f64()?;
                Utc.timestamp_opt(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
                    .single()
            }
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}
