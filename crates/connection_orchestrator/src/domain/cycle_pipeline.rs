use application_transform::{transform, ApplicationUnpacker, FieldTable};
use common::domain::{
    CanonicalObservation, CountersSink, DatastreamResolver, DomainError, DomainResult,
    LivenessCounter, RawPayload, Uploader,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tally of one processed payload
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Sensors whose records were transformed
    pub sensors: usize,
    /// Observations handed to the uploader
    pub pushed: usize,
    /// Observations dropped because no datastream link was found
    pub unresolved: usize,
    /// Observations whose resolution or push failed
    pub failed: usize,
    /// Sensor records dropped as malformed or unregistered
    pub rejected: usize,
}

/// Unpack, transform and upload one raw payload.
pub struct CyclePipeline {
    application_name: String,
    unpacker: &'static dyn ApplicationUnpacker,
    field_table: &'static FieldTable,
    registered_sensors: BTreeSet<String>,
    resolver: Arc<dyn DatastreamResolver>,
    uploader: Arc<dyn Uploader>,
    counters: Arc<dyn CountersSink>,
}

impl CyclePipeline {
    pub fn new(
        application_name: impl Into<String>,
        unpacker: &'static dyn ApplicationUnpacker,
        field_table: &'static FieldTable,
        resolver: Arc<dyn DatastreamResolver>,
        uploader: Arc<dyn Uploader>,
        counters: Arc<dyn CountersSink>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            unpacker,
            field_table,
            registered_sensors: BTreeSet::new(),
            resolver,
            uploader,
            counters,
        }
    }

    /// Restrict accepted sensor ids. An empty set accepts every sensor.
    pub fn with_registered_sensors(mut self, sensors: BTreeSet<String>) -> Self {
        self.registered_sensors = sensors;
        self
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    fn check_registered(&self, sensor_id: &str) -> DomainResult<()> {
        if self.registered_sensors.is_empty() || self.registered_sensors.contains(sensor_id) {
            Ok(())
        } else {
            Err(DomainError::UnregisteredSensor {
                application: self.application_name.clone(),
                sensor_id: sensor_id.to_string(),
            })
        }
    }

    /// Process one payload.
    ///
    /// Fails only when the payload cannot be unpacked at all. A bad sensor
    /// record is dropped on its own and counted as rejected.
    pub async fn process(&self, raw: &RawPayload) -> DomainResult<CycleReport> {
        let unpacked = self.unpacker.unpack(raw, &self.application_name)?;
        let mut report = CycleReport::default();

        for (sensor_id, field_map) in &unpacked {
            let observations = match self
                .check_registered(sensor_id)
                .and_then(|_| transform(sensor_id, field_map, self.field_table))
            {
                Ok(observations) => observations,
                Err(e) => {
                    warn!(
                        application = %self.application_name,
                        sensor_id = %sensor_id,
                        error = %e,
                        "dropping sensor record"
                    );
                    self.counters.increment(
                        LivenessCounter::RejectedPayload,
                        &self.application_name,
                        1,
                    );
                    report.rejected += 1;
                    continue;
                }
            };

            report.sensors += 1;
            for observation in observations {
                self.upload(&observation, &mut report).await;
            }
        }

        debug!(
            application = %self.application_name,
            sensors = report.sensors,
            pushed = report.pushed,
            unresolved = report.unresolved,
            failed = report.failed,
            rejected = report.rejected,
            "processed payload"
        );
        Ok(report)
    }

    async fn upload(&self, observation: &CanonicalObservation, report: &mut CycleReport) {
        let link = match self
            .resolver
            .resolve(&observation.sensor_id, &observation.datastream_name)
            .await
        {
            Ok(Some(link)) => link,
            Ok(None) => {
                warn!(
                    application = %self.application_name,
                    sensor_id = %observation.sensor_id,
                    datastream = %observation.datastream_name,
                    "no datastream URL found, dropping observation"
                );
                report.unresolved += 1;
                return;
            }
            Err(e) => {
                warn!(
                    application = %self.application_name,
                    sensor_id = %observation.sensor_id,
                    datastream = %observation.datastream_name,
                    error = %e,
                    "failed to resolve datastream"
                );
                self.counters
                    .increment(LivenessCounter::PushFail, &self.application_name, 1);
                report.failed += 1;
                return;
            }
        };

        match self
            .uploader
            .push(&link, observation, &self.application_name)
            .await
        {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                warn!(
                    application = %self.application_name,
                    sensor_id = %observation.sensor_id,
                    datastream = %observation.datastream_name,
                    error = %e,
                    "failed to push observation"
                );
                self.counters
                    .increment(LivenessCounter::PushFail, &self.application_name, 1);
                report.failed += 1;
            }
        }
    }
}

impl std::fmt::Debug for CyclePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclePipeline")
            .field("application_name", &self.application_name)
            .field("unpacker", &self.unpacker.name())
            .field("registered_sensors", &self.registered_sensors)
            .finish()
    }
}
