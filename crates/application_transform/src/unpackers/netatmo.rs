use common::domain::{DomainError, DomainResult, RawPayload, UnpackedPayload};
use serde_json::Value;
use tracing::warn;

use crate::ApplicationUnpacker;

/// Unpacker for the Netatmo weather station API.
///
/// The station list looks like:
///
/// ```json
/// [
///   {
///     "_id": "70:ee:50:7f:9d:32",
///     "station_name": "Room120 (Indoor)",
///     "reachable": true,
///     "dashboard_data": {
///       "time_utc": 1765374089,
///       "Temperature": 23.3,
///       "CO2": 871,
///       "Humidity": 46,
///       "temp_trend": "stable"
///     },
///     "modules": [...]
///   }
/// ]
/// ```
///
/// Each reachable station becomes one entry keyed by `_id` holding its
/// `dashboard_data`. Unreachable stations are logged and skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetatmoUnpacker;

pub static NETATMO_UNPACKER: NetatmoUnpacker = NetatmoUnpacker;

impl ApplicationUnpacker for NetatmoUnpacker {
    fn unpack(&self, raw: &RawPayload, application_name: &str) -> DomainResult<UnpackedPayload> {
        let stations = raw
            .as_array()
            .ok_or_else(|| DomainError::missing_keys(application_name, ["devices"]))?;

        let mut unpacked = UnpackedPayload::new();
        for (index, station) in stations.iter().enumerate() {
            let station_id = station
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| DomainError::missing_keys(application_name, [format!("[{}]._id", index)]))?;

            let reachable = station
                .get("reachable")
                .and_then(Value::as_bool)
                .ok_or_else(|| {
                    DomainError::missing_keys(application_name, [format!("{}.reachable", station_id)])
                })?;

            if !reachable {
                warn!(
                    application = %application_name,
                    station_id = %station_id,
                    "netatmo station is unreachable, skipping"
                );
                continue;
            }

            let dashboard_data = station
                .get("dashboard_data")
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    DomainError::missing_keys(
                        application_name,
                        [format!("{}.dashboard_data", station_id)],
                    )
                })?;

            unpacked.insert(station_id.to_string(), dashboard_data.clone());
        }

        Ok(unpacked)
    }

    fn name(&self) -> &'static str {
        "netatmo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn station(id: &str, reachable: bool) -> Value {
        json!({
            "_id": id,
            "reachable": reachable,
            "dashboard_data": {"time_utc": 1700000000, "Temperature": 21.5, "Humidity": 40}
        })
    }

    #[test]
    fn test_unpack_reachable_station() {
        let raw = json!([station("A1", true)]);
        let unpacked = NetatmoUnpacker.unpack(&raw, "netatmo").unwrap();

        let expected = json!({"time_utc": 1700000000, "Temperature": 21.5, "Humidity": 40});
        assert_eq!(unpacked.len(), 1);
        assert_eq!(Value::Object(unpacked["A1"].clone()), expected);
    }

    #[test]
    fn test_unreachable_station_is_dropped() {
        let raw = json!([station("A1", false)]);
        let unpacked = NetatmoUnpacker.unpack(&raw, "netatmo").unwrap();
        assert!(unpacked.is_empty());
    }

    #[test]
    fn test_unreachable_station_does_not_hide_others() {
        let raw = json!([station("A1", false), station("B2", true)]);
        let unpacked = NetatmoUnpacker.unpack(&raw, "netatmo").unwrap();
        assert_eq!(unpacked.keys().collect::<Vec<_>>(), vec!["B2"]);
    }

    #[test]
    fn test_every_key_came_from_payload() {
        let raw = json!([station("A1", true), station("B2", false), station("C3", true)]);
        let unpacked = NetatmoUnpacker.unpack(&raw, "netatmo").unwrap();
        for key in unpacked.keys() {
            let source = raw
                .as_array()
                .unwrap()
                .iter()
                .find(|s| s["_id"] == json!(key))
                .expect("key not present in raw payload");
            assert_eq!(source["reachable"], json!(true));
        }
    }

    #[test]
    fn test_missing_dashboard_data() {
        let raw = json!([{"_id": "A1", "reachable": true}]);
        let err = NetatmoUnpacker.unpack(&raw, "netatmo").unwrap_err();
        match err {
            DomainError::MissingPayloadKeys { keys, .. } => {
                assert_eq!(keys, vec!["A1.dashboard_data".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_id() {
        let raw = json!([{"reachable": true, "dashboard_data": {}}]);
        let result = NetatmoUnpacker.unpack(&raw, "netatmo");
        assert!(matches!(result, Err(DomainError::MissingPayloadKeys { .. })));
    }

    #[test]
    fn test_payload_must_be_station_list() {
        let result = NetatmoUnpacker.unpack(&json!({"body": {}}), "netatmo");
        assert!(matches!(result, Err(DomainError::MissingPayloadKeys { .. })));
    }
}
