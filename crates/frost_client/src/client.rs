use async_trait::async_trait;
use common::domain::{
    CanonicalObservation, DatastreamLink, DatastreamResolver, DomainError, DomainResult, Uploader,
};
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::{datastream_filter, FrostConfig};

const OBSERVATIONS_LINK: &str = "Observations@iot.navigationLink";

/// HTTP client for a SensorThings (FROST) server.
///
/// Resolves datastream links by (sensor, datastream) name and pushes
/// observations to them. Resolved links are cached for the process lifetime.
pub struct FrostClient {
    http: reqwest::Client,
    config: FrostConfig,
    links: DashMap<(String, String), DatastreamLink>,
}

impl FrostClient {
    pub fn new(config: FrostConfig) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DomainError::Configuration(format!("invalid HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            links: DashMap::new(),
        })
    }

    fn datastreams_url(&self) -> String {
        format!("{}/Datastreams", self.config.endpoint.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_ref()),
            None => request,
        }
    }
}

/// Pull the observations link of the first datastream in a query response
pub(crate) fn first_observations_link(response: &Value) -> Option<DatastreamLink> {
    response
        .get("value")?
        .as_array()?
        .first()?
        .get(OBSERVATIONS_LINK)?
        .as_str()
        .map(str::to_string)
}

pub(crate) fn observation_body(observation: &CanonicalObservation) -> Value {
    json!({
        "result": observation.result,
        "phenomenonTime": observation.phenomenon_time.to_rfc3339(),
    })
}

#[async_trait]
impl DatastreamResolver for FrostClient {
    #[instrument(skip(self))]
    async fn resolve(
        &self,
        sensor_id: &str,
        datastream_name: &str,
    ) -> DomainResult<Option<DatastreamLink>> {
        let key = (sensor_id.to_string(), datastream_name.to_string());
        if let Some(link) = self.links.get(&key) {
            return Ok(Some(link.clone()));
        }

        let filter = datastream_filter(sensor_id, datastream_name);
        let response = self
            .authorize(self.http.get(self.datastreams_url()))
            .query(&[("$filter", filter.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DomainError::Transport(format!("datastream query failed: {}", e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| DomainError::Transport(format!("invalid datastream response: {}", e)))?;

        let link = first_observations_link(&body);
        if let Some(link) = &link {
            debug!(link = %link, "resolved datastream");
            self.links.insert(key, link.clone());
        }
        Ok(link)
    }
}

#[async_trait]
impl Uploader for FrostClient {
    async fn push(
        &self,
        link: &str,
        observation: &CanonicalObservation,
        application_name: &str,
    ) -> DomainResult<()> {
        self.authorize(self.http.post(link))
            .json(&observation_body(observation))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DomainError::Upload(format!(
                    "{} {} for {}: {}",
                    observation.sensor_id, observation.datastream_name, application_name, e
                ))
            })?;
        Ok(())
    }
}
