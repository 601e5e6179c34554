use application_transform::ApplicationKind;
use connection_orchestrator::http::{HttpJsonTransport, NetatmoTransport};
use connection_orchestrator::mqtt::{default_uplink_topic, parse_broker_address, MqttTransport};
use connection_orchestrator::TransportFactory;
use std::sync::Arc;

/// Factory with every production transport registered
pub fn transport_factory() -> TransportFactory {
    let mut factory = TransportFactory::new();

    factory.register_polling(ApplicationKind::Netatmo, |spec| {
        Ok(Arc::new(NetatmoTransport::new(
            &spec.name,
            &spec.host,
            spec.settings.timeout,
        )?))
    });
    factory.register_polling(ApplicationKind::Null, |spec| {
        Ok(Arc::new(HttpJsonTransport::new(
            &spec.host,
            spec.settings.timeout,
        )?))
    });

    for kind in [ApplicationKind::TheThingsStack, ApplicationKind::Null] {
        factory.register_subscription(kind, |spec, counters| {
            let broker = parse_broker_address(&spec.host, spec.port, spec.tls)?;
            let topic = spec
                .topic
                .clone()
                .unwrap_or_else(|| default_uplink_topic(&spec.name));
            Ok(Arc::new(MqttTransport::new(
                &spec.name,
                broker,
                topic,
                spec.settings.timeout,
                counters,
            )))
        });
    }

    factory
}
