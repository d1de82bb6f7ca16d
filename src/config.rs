//! Node configuration parameters
//!
//! All tunable parameters for the SoilSense node. Timing values are in
//! milliseconds so host tests can shrink the watering hold and reboot grace
//! without touching the dispatch or OTA logic.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- MQTT ---
    /// Broker URI, e.g. `mqtt://test.mosquitto.org:1883`
    pub broker_url: heapless::String<96>,
    /// MQTT client identifier (must be unique per broker)
    pub client_id: heapless::String<48>,
    /// Prefix for every topic (`<prefix>/command`, `<prefix>/response`, ...)
    pub topic_prefix: heapless::String<48>,

    // --- Dispatcher ---
    /// Maximum wait for a queued command before the idle tick (ms)
    pub dispatch_poll_ms: u32,
    /// How long the pump stays on for one WATER command (ms)
    pub water_hold_ms: u32,

    // --- OTA ---
    /// HTTP timeout for the firmware download (ms)
    pub ota_timeout_ms: u32,
    /// Delay between the final status message and the restart (ms)
    pub ota_reboot_grace_ms: u32,
    /// Restart into the new image as soon as it is boot-selected
    pub ota_auto_reboot: bool,

    // --- Reporting ---
    /// Soil data report interval (ms)
    pub data_interval_ms: u32,
    /// System status report interval (ms)
    pub status_interval_ms: u32,

    // --- Pins ---
    pub pump_gpio: i32,
    pub indicator_gpio: i32,
    /// Indicator LED is active-low (ESP32-C3 on-board LED)
    pub indicator_active_low: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // MQTT
            broker_url: bounded_const("mqtt://test.mosquitto.org:1883"),
            client_id: bounded_const("soilsensorcapture_esp32c3"),
            topic_prefix: bounded_const("soilsensorcapture/esp"),

            // Dispatcher
            dispatch_poll_ms: 1000,
            water_hold_ms: 1500,

            // OTA
            ota_timeout_ms: 30_000,
            ota_reboot_grace_ms: 3000,
            ota_auto_reboot: true,

            // Reporting
            data_interval_ms: 2000,    // 0.5 Hz
            status_interval_ms: 30_000, // 1 per 30 s

            // Pins
            pump_gpio: pins::PUMP_GPIO,
            indicator_gpio: pins::LED_GPIO,
            indicator_active_low: true,
        }
    }
}

impl NodeConfig {
    /// Parse a JSON document (missing fields fall back to defaults) and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode a postcard blob as persisted in NVS.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Encode for NVS storage.
    pub fn to_postcard(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::IoError)
    }

    /// Reject values that would stall the dispatcher or the OTA worker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_prefix.is_empty() {
            return Err(ConfigError::ValidationFailed("topic_prefix is empty"));
        }
        if self.dispatch_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("dispatch_poll_ms must be > 0"));
        }
        if self.water_hold_ms == 0 || self.water_hold_ms > 60_000 {
            return Err(ConfigError::ValidationFailed("water_hold_ms must be 1..=60000"));
        }
        if self.ota_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("ota_timeout_ms must be > 0"));
        }
        if self.status_interval_ms == 0 || self.data_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("report intervals must be > 0"));
        }
        Ok(())
    }

    pub fn dispatch_poll(&self) -> Duration {
        Duration::from_millis(self.dispatch_poll_ms as u64)
    }

    pub fn water_hold(&self) -> Duration {
        Duration::from_millis(self.water_hold_ms as u64)
    }

    pub fn ota_timeout(&self) -> Duration {
        Duration::from_millis(self.ota_timeout_ms as u64)
    }

    pub fn ota_reboot_grace(&self) -> Duration {
        Duration::from_millis(self.ota_reboot_grace_ms as u64)
    }

    pub fn data_interval(&self) -> Duration {
        Duration::from_millis(self.data_interval_ms as u64)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms as u64)
    }

    /// Full topic name for a channel suffix.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_prefix, suffix)
    }
}

fn bounded_const<const N: usize>(s: &str) -> heapless::String<N> {
    crate::command::bounded::truncated(s)
}
