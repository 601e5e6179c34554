use common::domain::{DomainResult, RawPayload, UnpackedPayload};

/// Maps a vendor-native payload to a per-sensor field map.
///
/// Implementations are pure. A payload missing a required key fails with
/// `DomainError::MissingPayloadKeys`; devices the vendor marks as unreachable
/// are dropped from the result without error.
pub trait ApplicationUnpacker: Send + Sync {
    fn unpack(&self, raw: &RawPayload, application_name: &str) -> DomainResult<UnpackedPayload>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}
