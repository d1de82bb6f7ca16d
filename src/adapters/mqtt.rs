//! MQTT transport on ESP-IDF.
//!
//! [`MqttLink`] is the outbound [`Publisher`]. Inbound traffic is drained
//! by a dedicated `mqtt_rx` thread that polls the connection, copies each
//! command body out of the event and only then hands it to the receiver,
//! so the MQTT task is never held while a response is being published.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};

use crate::app::ports::{PublishError, Publisher};
use crate::command::receiver;
use crate::config::NodeConfig;
use crate::context::NodeContext;
use crate::drivers::task::{spawn_task, TaskSpec};
use crate::error::CommsError;

const MQTT_RX_TASK: TaskSpec = TaskSpec {
    name: "mqtt_rx\0",
    priority: 5,
    stack_kb: 6,
};

pub struct MqttLink {
    client: Mutex<EspMqttClient<'static>>,
    connected: AtomicBool,
}

impl MqttLink {
    /// Create the client. The returned connection must be passed to
    /// [`MqttLink::spawn_receiver`] or the client never makes progress.
    pub fn connect(config: &NodeConfig) -> Result<(Arc<Self>, EspMqttConnection), CommsError> {
        let conf = MqttClientConfiguration {
            client_id: Some(config.client_id.as_str()),
            keep_alive_interval: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let (client, connection) = EspMqttClient::new(&config.broker_url, &conf).map_err(|e| {
            warn!("MQTT: client init failed: {:?}", e);
            CommsError::MqttConnectFailed
        })?;
        info!("MQTT: client created for {}", config.broker_url);
        Ok((
            Arc::new(Self {
                client: Mutex::new(client),
                connected: AtomicBool::new(false),
            }),
            connection,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Block until the broker session is up or `timeout` passes.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_connected() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        true
    }

    fn subscribe(&self, topic: &str) -> Result<(), CommsError> {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| info!("MQTT: subscribed to {}", topic))
            .map_err(|e| {
                warn!("MQTT: subscribe {} failed: {:?}", topic, e);
                CommsError::MqttSubscribeFailed
            })
    }

    /// Drain connection events on `mqtt_rx`, (re)subscribing to the command
    /// topic on every connect and feeding command bodies to the receiver.
    pub fn spawn_receiver(
        self: &Arc<Self>,
        mut connection: EspMqttConnection,
        ctx: Arc<NodeContext>,
    ) -> Result<(), CommsError> {
        let link = self.clone();
        spawn_task(MQTT_RX_TASK, move || {
            let command_topic = ctx.topics.command.clone();
            loop {
                let inbound = match connection.next() {
                    Ok(event) => match event.payload() {
                        EventPayload::Connected(_) => {
                            link.connected.store(true, Ordering::Release);
                            info!("MQTT: connected");
                            Inbound::Connected
                        }
                        EventPayload::Disconnected => {
                            link.connected.store(false, Ordering::Release);
                            warn!("MQTT: disconnected");
                            Inbound::Nothing
                        }
                        EventPayload::Received { topic, data, .. } if topic == Some(command_topic.as_str()) => {
                            Inbound::Command(data.to_vec())
                        }
                        EventPayload::Received { topic, .. } => {
                            debug!("MQTT: ignoring message on {:?}", topic);
                            Inbound::Nothing
                        }
                        EventPayload::Error(e) => {
                            warn!("MQTT: {:?}", e);
                            Inbound::Nothing
                        }
                        _ => Inbound::Nothing,
                    },
                    Err(e) => {
                        warn!("MQTT: connection closed: {:?}", e);
                        break;
                    }
                };
                // The event is released here, so publishing cannot stall the MQTT task.
                match inbound {
                    Inbound::Connected => {
                        let _ = link.subscribe(&command_topic);
                    }
                    Inbound::Command(body) => {
                        let _ = receiver::on_message(&ctx, &body);
                    }
                    Inbound::Nothing => {}
                }
            }
        })
        .map(|_| ())
        .map_err(|e| {
            warn!("MQTT: rx task spawn failed: {}", e);
            CommsError::MqttConnectFailed
        })
    }
}

enum Inbound {
    Connected,
    Command(Vec<u8>),
    Nothing,
}

impl Publisher for MqttLink {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                debug!("MQTT: publish to {} failed: {:?}", topic, e);
                PublishError::Rejected
            })
    }
}
