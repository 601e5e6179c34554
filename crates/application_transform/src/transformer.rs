use chrono::{DateTime, Utc};
use common::domain::{
    parse_phenomenon_time, CanonicalObservation, DomainError, DomainResult, FieldMap,
};
use serde_json::map::Iter;

use crate::FieldTable;

/// Lazy stream of observations for one sensor's field map.
///
/// Fields absent from the table are skipped; they are vendor metadata
/// (trend indicators, signal strength), not measurements.
pub struct ObservationStream<'a> {
    sensor_id: &'a str,
    phenomenon_time: DateTime<Utc>,
    table: &'static FieldTable,
    fields: Iter<'a>,
}

impl<'a> Iterator for ObservationStream<'a> {
    type Item = CanonicalObservation;

    fn next(&mut self) -> Option<Self::Item> {
        for (field_name, value) in self.fields.by_ref() {
            if let Some(datastream_name) = self.table.datastream_for(field_name) {
                return Some(CanonicalObservation {
                    sensor_id: self.sensor_id.to_string(),
                    datastream_name: datastream_name.to_string(),
                    phenomenon_time: self.phenomenon_time,
                    result: value.clone(),
                });
            }
        }
        None
    }
}

/// Transform one sensor's field map into canonical observations.
///
/// Fails only when the table's time field is missing or unparseable.
pub fn transform<'a>(
    sensor_id: &'a str,
    field_map: &'a FieldMap,
    table: &'static FieldTable,
) -> DomainResult<ObservationStream<'a>> {
    let phenomenon_time = field_map
        .get(table.time_field)
        .and_then(parse_phenomenon_time)
        .ok_or_else(|| DomainError::missing_keys(sensor_id, [table.time_field]))?;

    Ok(ObservationStream {
        sensor_id,
        phenomenon_time,
        table,
        fields: field_map.iter(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorModel;
    use serde_json::{json, Value};

    static TEMPERATURE_HUMIDITY: FieldTable = FieldTable {
        time_field: "time_utc",
        fields: &[("Temperature", "temperature_indoor"), ("Humidity", "humidity")],
    };

    fn field_map(value: Value) -> FieldMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_transform_station_reading() {
        let fields = field_map(json!({"time_utc": 1700000000, "Temperature": 21.5, "Humidity": 40}));
        let observations: Vec<_> = transform("A1", &fields, &TEMPERATURE_HUMIDITY)
            .unwrap()
            .collect();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].sensor_id, "A1");
        assert_eq!(observations[0].datastream_name, "temperature_indoor");
        assert_eq!(observations[0].phenomenon_time.timestamp(), 1700000000);
        assert_eq!(observations[0].result, json!(21.5));
        assert_eq!(observations[1].datastream_name, "humidity");
        assert_eq!(observations[1].result, json!(40));
    }

    #[test]
    fn test_unmapped_fields_are_dropped() {
        let fields = field_map(json!({
            "time_utc": 1765374089,
            "Temperature": 23.3,
            "CO2": 871,
            "temp_trend": "stable",
            "pressure_trend": "up"
        }));
        let table = SensorModel::NetatmoNws03.field_table();
        let observations: Vec<_> = transform("70:ee:50:7f:9d:32", &fields, table)
            .unwrap()
            .collect();

        let names: Vec<_> = observations.iter().map(|o| o.datastream_name.as_str()).collect();
        assert_eq!(names, vec!["temperature_indoor", "co2"]);
        for observation in &observations {
            assert!(table.datastream_names().any(|d| d == observation.datastream_name));
        }
    }

    #[test]
    fn test_stream_is_restartable() {
        let fields = field_map(json!({"time_utc": 1700000000, "Humidity": 40}));
        let first: Vec<_> = transform("A1", &fields, &TEMPERATURE_HUMIDITY).unwrap().collect();
        let second: Vec<_> = transform("A1", &fields, &TEMPERATURE_HUMIDITY).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rfc3339_time_field() {
        let fields = field_map(json!({"phenomenon_time": "2025-12-10T13:41:29Z", "co2": 612}));
        let table = SensorModel::MilesightAm103l.field_table();
        let observations: Vec<_> = transform("24E124710C408089", &fields, table).unwrap().collect();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].datastream_name, "co2_indoor");
        assert_eq!(observations[0].phenomenon_time.timestamp(), 1765374089);
    }

    #[test]
    fn test_missing_time_field() {
        let fields = field_map(json!({"Temperature": 21.5}));
        let result = transform("A1", &fields, &TEMPERATURE_HUMIDITY);
        assert!(matches!(result, Err(DomainError::MissingPayloadKeys { .. })));
    }
}
