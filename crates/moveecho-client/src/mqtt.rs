//! MQTT transport built on `rumqttc`

use crate::transport::{BrokerTransport, TransportEvent, TransportHandle, TransportSession};
use async_trait::async_trait;
use bytes::Bytes;
use moveecho_core::{
    BrokerAddress, BrokerConfig, ClientId, ConnectError, PublishError, QoS, SubscribeError,
};
use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
    Outgoing, Packet,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacity of the inbound event channel per session
const EVENT_CAPACITY: usize = 256;

/// How long a session nobody listens to waits for the client's DISCONNECT
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Plain-TCP MQTT 3.1.1 transport.
///
/// Each [`connect`](BrokerTransport::connect) builds a fresh `rumqttc`
/// client and polls its event loop until the broker's CONNACK. After that a
/// background task keeps polling, forwarding incoming PUBLISH packets and
/// reporting the first event-loop error as a lost connection.
#[derive(Debug, Clone)]
pub struct MqttTransport {
    address: BrokerAddress,
    keep_alive: Duration,
    connect_timeout_secs: u64,
    clean_session: bool,
    request_capacity: usize,
}

impl MqttTransport {
    pub fn new(config: &BrokerConfig) -> Result<Self, ConnectError> {
        let address = config
            .address()
            .map_err(|reason| ConnectError::InvalidAddress {
                uri: config.uri.clone(),
                reason,
            })?;

        Ok(Self {
            address,
            keep_alive: config.keep_alive(),
            connect_timeout_secs: config.connect_timeout_secs,
            clean_session: config.clean_session,
            request_capacity: config.request_capacity,
        })
    }

    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }

    fn options(&self, client_id: &ClientId) -> MqttOptions {
        let mut options = MqttOptions::new(
            client_id.as_str(),
            self.address.host.clone(),
            self.address.port,
        );
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(self.clean_session);
        options
    }

    fn event_loop(&self, client_id: &ClientId) -> (AsyncClient, EventLoop) {
        let (client, mut eventloop) =
            AsyncClient::new(self.options(client_id), self.request_capacity);
        eventloop
            .network_options
            .set_connection_timeout(self.connect_timeout_secs);
        (client, eventloop)
    }
}

#[async_trait]
impl BrokerTransport for MqttTransport {
    async fn connect(&self, client_id: &ClientId) -> Result<TransportSession, ConnectError> {
        let (client, mut eventloop) = self.event_loop(client_id);

        debug!(broker = %self.address, client_id = %client_id, "Sending CONNECT");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(ConnectError::refused(format!("{:?}", ack.code)));
                    }
                    break;
                }
                Ok(_) => {}
                Err(ConnectionError::ConnectionRefused(code)) => {
                    return Err(ConnectError::refused(format!("{:?}", code)));
                }
                Err(e) => return Err(ConnectError::transport(e.to_string())),
            }
        }

        info!(broker = %self.address, client_id = %client_id, "MQTT session established");

        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        tokio::spawn(forward_events(eventloop, events_tx));

        Ok(TransportSession::new(
            Arc::new(MqttHandle { client }),
            events_rx,
        ))
    }

    fn describe(&self) -> String {
        self.address.to_string()
    }
}

/// Polls the event loop of an established session until it fails or the
/// client disconnects. Once nobody listens any more the loop is still polled
/// for a short grace period so that a following disconnect reaches the broker.
async fn forward_events(mut eventloop: EventLoop, events: mpsc::Sender<TransportEvent>) {
    loop {
        let polled = tokio::select! {
            _ = events.closed() => None,
            polled = eventloop.poll() => Some(polled),
        };

        let Some(polled) = polled else {
            debug!("Event receiver dropped, waiting for client disconnect");
            drain_until_disconnect(eventloop).await;
            return;
        };

        let lost = match polled {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let event = TransportEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                if events.send(event).await.is_err() {
                    return;
                }
                continue;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => "broker closed the session".to_string(),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Client disconnect sent, stopping MQTT event loop");
                return;
            }
            Ok(_) => continue,
            Err(e) => e.to_string(),
        };

        warn!(reason = %lost, "MQTT connection lost");
        let _ = events.send(TransportEvent::ConnectionLost(lost)).await;
        return;
    }
}

async fn drain_until_disconnect(mut eventloop: EventLoop) {
    let drained = tokio::time::timeout(CLOSE_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    })
    .await;

    match drained {
        Ok(true) => debug!("Client disconnect sent, stopping MQTT event loop"),
        Ok(false) => debug!("MQTT event loop closed before client disconnect"),
        Err(_) => debug!("No client disconnect within grace period, dropping MQTT session"),
    }
}

struct MqttHandle {
    client: AsyncClient,
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[async_trait]
impl TransportHandle for MqttHandle {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SubscribeError> {
        self.client
            .subscribe(topic, to_mqtt_qos(qos))
            .await
            .map_err(|e| SubscribeError::Transport {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), SubscribeError> {
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| SubscribeError::Transport {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn try_publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, to_mqtt_qos(qos), retained, payload.to_vec())
            .map_err(|e| match e {
                // Full or closed request queue; either way nothing was written
                ClientError::TryRequest(_) => PublishError::Backpressure,
                other => PublishError::transport(other.to_string()),
            })
    }

    async fn disconnect(&self) -> Result<(), ConnectError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| ConnectError::transport(e.to_string()))
    }
}
