#![allow(dead_code)]

use application_transform::{ApplicationKind, SensorModel};
use async_trait::async_trait;
use common::counters::LivenessCounters;
use common::domain::{
    CanonicalObservation, Credential, CredentialSource, DatastreamResolver, DomainError,
    DomainResult, MockCredentialSource, RawPayload, Uploader,
};
use connection_orchestrator::http::PollingTransport;
use connection_orchestrator::mqtt::{Inbox, SubscriptionTransport};
use connection_orchestrator::CyclePipeline;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Polling transport that replays scripted responses, then fails
#[derive(Default)]
pub struct ScriptedPollingTransport {
    script: Mutex<VecDeque<DomainResult<RawPayload>>>,
    pub fetches: AtomicUsize,
    pub closed: AtomicBool,
}

impl ScriptedPollingTransport {
    pub fn new(responses: impl IntoIterator<Item = DomainResult<RawPayload>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollingTransport for ScriptedPollingTransport {
    async fn authenticate(&self, _credential: &Credential) -> DomainResult<()> {
        Ok(())
    }

    async fn fetch(&self) -> DomainResult<RawPayload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DomainError::Transport("connection refused".to_string())))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// Polling transport whose fetch never completes
#[derive(Default)]
pub struct StallingPollingTransport {
    pub closed: AtomicBool,
}

#[async_trait]
impl PollingTransport for StallingPollingTransport {
    async fn authenticate(&self, _credential: &Credential) -> DomainResult<()> {
        Ok(())
    }

    async fn fetch(&self) -> DomainResult<RawPayload> {
        std::future::pending::<DomainResult<RawPayload>>().await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// Subscription transport that hands the inbox to the test
#[derive(Default)]
pub struct ChannelSubscriptionTransport {
    inbox: Mutex<Option<Inbox>>,
    pub subscribes: AtomicUsize,
    pub closed: AtomicBool,
}

impl ChannelSubscriptionTransport {
    pub fn publish(&self, message: Value) -> bool {
        match self.inbox.lock().unwrap().as_ref() {
            Some(inbox) => inbox.send(message).is_ok(),
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionTransport for ChannelSubscriptionTransport {
    async fn subscribe(&self, _credential: &Credential, inbox: Inbox) -> DomainResult<()> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        *self.inbox.lock().unwrap() = Some(inbox);
        Ok(())
    }

    async fn close(&self) {
        self.inbox.lock().unwrap().take();
        self.closed.store(true, Ordering::SeqCst);
    }
}

// Uploader that records every push
#[derive(Default)]
pub struct RecordingUploader {
    pushes: Mutex<Vec<(String, CanonicalObservation)>>,
}

impl RecordingUploader {
    pub fn pushes(&self) -> Vec<(String, CanonicalObservation)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn push(
        &self,
        link: &str,
        observation: &CanonicalObservation,
        _application_name: &str,
    ) -> DomainResult<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((link.to_string(), observation.clone()));
        Ok(())
    }
}

// Resolver that knows every datastream
pub struct LinkResolver;

#[async_trait]
impl DatastreamResolver for LinkResolver {
    async fn resolve(&self, sensor_id: &str, datastream_name: &str) -> DomainResult<Option<String>> {
        Ok(Some(format!(
            "http://frost/v1.1/Datastreams('{}:{}')/Observations",
            sensor_id, datastream_name
        )))
    }
}

pub fn credentials() -> Arc<dyn CredentialSource> {
    let mut source = MockCredentialSource::new();
    source
        .expect_load()
        .returning(|_, _| Ok([("access_token", "token")].into_iter().collect()));
    Arc::new(source)
}

pub fn rejected_credentials() -> Arc<dyn CredentialSource> {
    let mut source = MockCredentialSource::new();
    source.expect_load().returning(|name, _| {
        Err(DomainError::Authentication {
            application: name.to_string(),
            reason: "no credentials file".to_string(),
        })
    });
    Arc::new(source)
}

pub fn pipeline(
    application_name: &str,
    kind: ApplicationKind,
    model: SensorModel,
    uploader: Arc<RecordingUploader>,
    counters: Arc<LivenessCounters>,
) -> CyclePipeline {
    CyclePipeline::new(
        application_name,
        kind.unpacker(),
        model.field_table(),
        Arc::new(LinkResolver),
        uploader,
        counters,
    )
}
