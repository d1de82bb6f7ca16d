//! Node context: everything the reception callback, the dispatcher, the
//! reporter and the OTA controller share, built once at boot and handed
//! around as `Arc<NodeContext>`.

use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

use crate::actuator::ActuatorControl;
use crate::adapters::time::MonotonicClock;
use crate::app::ports::{ActuatorPort, FirmwareSource, FlashPort, Publisher};
use crate::command::dispatcher::CommandStats;
use crate::command::pulse::DispatchPulse;
use crate::command::queue::CommandQueue;
use crate::config::NodeConfig;
use crate::ota::{OtaController, OtaPorts};
use crate::telemetry::SoilReading;

/// Resolved topic names for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub response: String,
    pub ota_status: String,
    pub status: String,
    pub data: String,
}

impl Topics {
    pub fn for_config(config: &NodeConfig) -> Self {
        Self {
            command: config.topic("command"),
            response: config.topic("response"),
            ota_status: config.topic("ota_status"),
            status: config.topic("status"),
            data: config.topic("data"),
        }
    }
}

/// Platform adapters the node is assembled from.
pub struct NodePorts {
    pub publisher: Arc<dyn Publisher>,
    pub firmware: Arc<dyn FirmwareSource>,
    pub flash: Arc<dyn FlashPort>,
    pub actuator: Box<dyn ActuatorPort>,
}

pub struct NodeContext {
    pub config: NodeConfig,
    pub topics: Topics,
    pub clock: MonotonicClock,
    pub queue: CommandQueue,
    pub actuator: ActuatorControl,
    pub ota: OtaController,
    pub stats: CommandStats,
    pub pulse: DispatchPulse,
    publisher: Arc<dyn Publisher>,
    reading: Mutex<Option<SoilReading>>,
}

impl NodeContext {
    pub fn new(config: NodeConfig, ports: NodePorts) -> Self {
        let clock = MonotonicClock::new();
        let topics = Topics::for_config(&config);
        let ota = OtaController::new(
            OtaPorts {
                source: ports.firmware,
                flash: ports.flash,
                publisher: ports.publisher.clone(),
            },
            topics.ota_status.clone(),
            config.ota_reboot_grace(),
            clock,
        );
        Self {
            queue: CommandQueue::new(clock),
            actuator: ActuatorControl::new(ports.actuator),
            stats: CommandStats::default(),
            pulse: DispatchPulse::new(),
            publisher: ports.publisher,
            reading: Mutex::new(None),
            ota,
            topics,
            clock,
            config,
        }
    }

    /// Publish a human-readable command response. Failures are logged only.
    pub fn respond(&self, text: &str) {
        self.publish(&self.topics.response, text.as_bytes());
    }

    pub fn publish(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.publisher.publish(topic, payload) {
            warn!("MQTT: publish to {} failed: {}", topic, e);
        }
    }

    /// Store the latest soil sample.
    pub fn record_reading(&self, reading: SoilReading) {
        *self.reading.lock().unwrap_or_else(PoisonError::into_inner) = Some(reading);
    }

    pub fn latest_reading(&self) -> Option<SoilReading> {
        *self.reading.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
