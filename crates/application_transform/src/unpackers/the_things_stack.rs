use common::domain::{DomainError, DomainResult, FieldMap, RawPayload, UnpackedPayload};
use serde_json::Value;

use crate::ApplicationUnpacker;

/// Field injected into each uplink's field map carrying the gateway receive time
pub const PHENOMENON_TIME_FIELD: &str = "phenomenon_time";

/// Unpacker for The Things Stack uplink messages.
///
/// One uplink carries one device: the device EUI comes from
/// `end_device_ids.dev_eui`, the fields from `uplink_message.decoded_payload`,
/// and the observation time from the first gateway's `received_at`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TheThingsStackUnpacker;

pub static THE_THINGS_STACK_UNPACKER: TheThingsStackUnpacker = TheThingsStackUnpacker;

fn received_at(uplink: &Value) -> Option<&Value> {
    uplink
        .pointer("/rx_metadata/0/received_at")
        .or_else(|| uplink.get("received_at"))
}

impl ApplicationUnpacker for TheThingsStackUnpacker {
    fn unpack(&self, raw: &RawPayload, application_name: &str) -> DomainResult<UnpackedPayload> {
        let dev_eui = raw
            .pointer("/end_device_ids/dev_eui")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::missing_keys(application_name, ["end_device_ids.dev_eui"]))?;

        let uplink = raw
            .get("uplink_message")
            .ok_or_else(|| DomainError::missing_keys(application_name, ["uplink_message"]))?;

        let decoded = uplink
            .get("decoded_payload")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                DomainError::missing_keys(application_name, ["uplink_message.decoded_payload"])
            })?;

        let time = received_at(uplink).ok_or_else(|| {
            DomainError::missing_keys(
                application_name,
                ["uplink_message.rx_metadata[0].received_at"],
            )
        })?;

        let mut fields: FieldMap = decoded.clone();
        fields.insert(PHENOMENON_TIME_FIELD.to_string(), time.clone());

        let mut unpacked = UnpackedPayload::new();
        unpacked.insert(dev_eui.to_string(), fields);
        Ok(unpacked)
    }

    fn name(&self) -> &'static str {
        "the_things_stack"
    }
}
