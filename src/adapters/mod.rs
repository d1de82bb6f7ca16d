//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                 |
//! |------------|--------------------|-----------------------------|
//! | `flash`    | FlashPort          | ESP-IDF OTA partitions      |
//! | `http`     | FirmwareSource     | ESP-IDF HTTP(S) client      |
//! | `log_sink` | ProgressObserver   | Serial log output           |
//! | `mqtt`     | Publisher          | ESP-IDF MQTT client         |
//! | `nvs`      | ConfigPort         | NVS / in-memory store       |
//! | `time`     | (clock)            | ESP32 system timer          |
//! | `wifi`     | (bring-up)         | ESP-IDF WiFi STA            |
//!
//! The pump/indicator [`ActuatorPort`](crate::app::ports::ActuatorPort)
//! lives in [`drivers::pump`](crate::drivers::pump).

#[cfg(target_os = "espidf")]
pub mod flash;
#[cfg(target_os = "espidf")]
pub mod http;
pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
