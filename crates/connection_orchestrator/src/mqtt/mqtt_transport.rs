use async_trait::async_trait;
use common::domain::{CountersSink, Credential, DomainError, DomainResult, LivenessCounter};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, SubAck, SubscribeReasonCode, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::mqtt::{BrokerAddress, Inbox, SubscriptionTransport};

pub const MQTT_USERNAME: &str = "username";
pub const MQTT_PASSWORD: &str = "password";

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

struct Session {
    client: AsyncClient,
    poller: JoinHandle<()>,
}

/// MQTT broker subscription backed by rumqttc.
///
/// `subscribe` drives the event loop until the broker acknowledges the
/// subscription, then hands it to its own task which decodes each publish
/// as JSON and pushes it onto the connection's unbounded inbox. Undecodable
/// messages are logged and counted as rejected. The task ends, dropping
/// the inbox, on the first event loop error.
pub struct MqttTransport {
    application_name: String,
    broker: BrokerAddress,
    topic: String,
    handshake_timeout: Duration,
    counters: Arc<dyn CountersSink>,
    session: Mutex<Option<Session>>,
}

impl MqttTransport {
    pub fn new(
        application_name: impl Into<String>,
        broker: BrokerAddress,
        topic: impl Into<String>,
        handshake_timeout: Duration,
        counters: Arc<dyn CountersSink>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            broker,
            topic: topic.into(),
            handshake_timeout,
            counters,
            session: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn options(&self, credential: &Credential) -> MqttOptions {
        let client_id = format!("sensorthings-{}-{}", self.application_name, std::process::id());
        let mut options = MqttOptions::new(client_id, self.broker.host.clone(), self.broker.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        if let Some(username) = credential.get(MQTT_USERNAME) {
            let password = credential.get(MQTT_PASSWORD).unwrap_or_default();
            options.set_credentials(username, password);
        }
        if self.broker.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }

    /// Poll until SUBACK, delivering anything published in the meantime
    async fn await_subscription(
        &self,
        eventloop: &mut EventLoop,
        inbox: &Inbox,
    ) -> DomainResult<()> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(application = %self.application_name, "connected to MQTT broker");
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    return check_subscription(&ack, &self.application_name);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    deliver(&publish.payload, inbox, self.counters.as_ref(), &self.application_name);
                }
                Ok(_) => {}
                Err(e) => return Err(connection_error(e, &self.application_name)),
            }
        }
    }
}

/// Refused credentials are fatal; every other connection failure is retryable
pub(crate) fn connection_error(error: ConnectionError, application_name: &str) -> DomainError {
    match error {
        ConnectionError::ConnectionRefused(
            code @ (ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized),
        ) => DomainError::Authentication {
            application: application_name.to_string(),
            reason: format!("broker refused connection: {:?}", code),
        },
        other => DomainError::Transport(format!("MQTT connection failed: {}", other)),
    }
}

pub(crate) fn check_subscription(ack: &SubAck, application_name: &str) -> DomainResult<()> {
    if ack
        .return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        return Err(DomainError::Authentication {
            application: application_name.to_string(),
            reason: "broker rejected the subscription".to_string(),
        });
    }
    Ok(())
}

/// Decode one publish payload and enqueue it
pub(crate) fn deliver(
    payload: &[u8],
    inbox: &Inbox,
    counters: &dyn CountersSink,
    application_name: &str,
) {
    match serde_json::from_slice(payload) {
        Ok(message) => {
            if inbox.send(message).is_err() {
                debug!("inbox closed, dropping message");
            }
        }
        Err(e) => {
            warn!(error = %e, payload_size = payload.len(), "failed to decode MQTT message");
            counters.increment(LivenessCounter::RejectedPayload, application_name, 1);
        }
    }
}

async fn poll_events(
    mut eventloop: EventLoop,
    inbox: Inbox,
    counters: Arc<dyn CountersSink>,
    application_name: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(topic = %publish.topic, "message received");
                deliver(&publish.payload, &inbox, counters.as_ref(), &application_name);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                // The subscription does not survive a reconnect with a clean session
                warn!(error = %e, "MQTT session lost");
                break;
            }
        }
    }
}

#[async_trait]
impl SubscriptionTransport for MqttTransport {
    async fn subscribe(&self, credential: &Credential, inbox: Inbox) -> DomainResult<()> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            previous.poller.abort();
        }

        info!(
            application = %self.application_name,
            broker = %self.broker.host,
            port = self.broker.port,
            topic = %self.topic,
            "subscribing to MQTT topic"
        );

        let (client, mut eventloop) = AsyncClient::new(self.options(credential), 100);
        client
            .subscribe(&self.topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| DomainError::Transport(format!("failed to subscribe: {}", e)))?;

        tokio::time::timeout(
            self.handshake_timeout,
            self.await_subscription(&mut eventloop, &inbox),
        )
        .await
        .map_err(|_| {
            DomainError::Transport(format!(
                "no subscription acknowledgement within {:?}",
                self.handshake_timeout
            ))
        })??;

        let span = info_span!(
            "mqtt_event_loop",
            application = %self.application_name,
            broker = %self.broker.host,
        );
        let poller = tokio::spawn(
            poll_events(
                eventloop,
                inbox,
                Arc::clone(&self.counters),
                self.application_name.clone(),
            )
            .instrument(span),
        );

        debug!(application = %self.application_name, "subscription acknowledged");
        *session = Some(Session { client, poller });
        Ok(())
    }

    async fn close(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };

        let _ = session.client.unsubscribe(&self.topic).await;
        let _ = session.client.disconnect().await;

        if tokio::time::timeout(DISCONNECT_GRACE, &mut session.poller)
            .await
            .is_err()
        {
            session.poller.abort();
        }
        info!(application = %self.application_name, "disconnected from MQTT broker");
    }
}
