use crate::domain::{CanonicalObservation, DomainResult};
use async_trait::async_trait;

/// Location observations for one (sensor, datastream) pair are pushed to
pub type DatastreamLink = String;

/// Trait for publishing canonical observations to the time-series store
///
/// Implementations must tolerate concurrent calls from every connection and
/// must not assume observations of different applications arrive in time order.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Push a single observation to a resolved datastream
    ///
    /// # Returns
    /// () on success, DomainError::Upload on failure
    async fn push(
        &self,
        link: &str,
        observation: &CanonicalObservation,
        application_name: &str,
    ) -> DomainResult<()>;
}

/// Trait for looking up where a sensor's datastream accepts observations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DatastreamResolver: Send + Sync {
    /// Resolve a datastream link
    ///
    /// # Returns
    /// Some(link) if found, None if the datastream has not been set up
    async fn resolve(
        &self,
        sensor_id: &str,
        datastream_name: &str,
    ) -> DomainResult<Option<DatastreamLink>>;
}
