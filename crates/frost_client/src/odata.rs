/// Quote a string as an OData literal: single quotes, inner `'` doubled
pub fn escape_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `$filter` selecting a sensor's datastream by name
pub fn datastream_filter(sensor_id: &str, datastream_name: &str) -> String {
    format!(
        "name eq {} and Sensor/name eq {}",
        escape_literal(datastream_name),
        escape_literal(sensor_id)
    )
}
