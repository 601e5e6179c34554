use common::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field-to-datastream table for one sensor model
#[derive(Debug, PartialEq, Eq)]
pub struct FieldTable {
    /// Field holding the device-reported observation time
    pub time_field: &'static str,
    /// Vendor field name to datastream name
    pub fields: &'static [(&'static str, &'static str)],
}

impl FieldTable {
    pub fn datastream_for(&self, field_name: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == field_name)
            .map(|(_, datastream)| *datastream)
    }

    pub fn datastream_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|(_, datastream)| *datastream)
    }
}

static NETATMO_NWS03: FieldTable = FieldTable {
    time_field: "time_utc",
    fields: &[
        ("Temperature", "temperature_indoor"),
        ("CO2", "co2"),
        ("Humidity", "humidity"),
        ("Noise", "noise"),
        ("Pressure", "gauge_pressure"),
        ("AbsolutePressure", "absolute_pressure"),
    ],
};

static MILESIGHT_AM103L: FieldTable = FieldTable {
    time_field: "phenomenon_time",
    fields: &[
        ("battery", "battery_level"),
        ("temperature", "temperature_indoor"),
        ("humidity", "humidity_indoor"),
        ("co2", "co2_indoor"),
    ],
};

static MILESIGHT_AM308L: FieldTable = FieldTable {
    time_field: "phenomenon_time",
    fields: &[
        ("battery", "battery_level"),
        ("temperature", "temperature_indoor"),
        ("humidity", "humidity_indoor"),
        ("co2", "co2_indoor"),
        ("light_level", "light_level_indoor"),
        ("pir", "passive_infrared"),
        ("pm10", "particulate_matter_10"),
        ("pm2_5", "particulate_matter_2_5"),
        ("pressure", "gauge_pressure"),
        ("tvoc", "total_volatile_organic_compounds"),
    ],
};

/// Supported sensor models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorModel {
    #[serde(rename = "netatmo.nws03")]
    NetatmoNws03,
    #[serde(rename = "milesight.am103l")]
    MilesightAm103l,
    #[serde(rename = "milesight.am308l")]
    MilesightAm308l,
}

impl SensorModel {
    pub fn field_table(&self) -> &'static FieldTable {
        match self {
            Self::NetatmoNws03 => &NETATMO_NWS03,
            Self::MilesightAm103l => &MILESIGHT_AM103L,
            Self::MilesightAm308l => &MILESIGHT_AM308L,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetatmoNws03 => "netatmo.nws03",
            Self::MilesightAm103l => "milesight.am103l",
            Self::MilesightAm308l => "milesight.am308l",
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SensorModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "netatmo.nws03" => Ok(Self::NetatmoNws03),
            "milesight.am103l" => Ok(Self::MilesightAm103l),
            "milesight.am308l" => Ok(Self::MilesightAm308l),
            other => Err(DomainError::UnknownSensorModel(other.to_string())),
        }
    }
}
