use common::domain::{DomainError, DomainResult, RawPayload, UnpackedPayload};
use serde_json::Value;

use crate::ApplicationUnpacker;

/// Identity unpacker for applications with no vendor wrapping.
///
/// The payload must already be an object of `sensor id -> field object`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUnpacker;

pub static NULL_UNPACKER: NullUnpacker = NullUnpacker;

impl ApplicationUnpacker for NullUnpacker {
    fn unpack(&self, raw: &RawPayload, application_name: &str) -> DomainResult<UnpackedPayload> {
        let sensors = raw
            .as_object()
            .ok_or_else(|| DomainError::missing_keys(application_name, ["<sensor id>"]))?;

        let mut unpacked = UnpackedPayload::new();
        for (sensor_id, fields) in sensors {
            match fields {
                Value::Object(map) => {
                    unpacked.insert(sensor_id.clone(), map.clone());
                }
                _ => {
                    return Err(DomainError::missing_keys(
                        application_name,
                        [format!("{}.<fields>", sensor_id)],
                    ))
                }
            }
        }
        Ok(unpacked)
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
