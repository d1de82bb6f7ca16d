//! SoilSense node firmware library.
//!
//! Exposes the command pipeline, the OTA state machine, the soil probe and
//! their ports for integration testing on the host. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod actuator;
pub mod adapters;
pub mod app;
pub mod command;
pub mod config;
pub mod context;
pub mod drivers;
pub mod error;
pub mod ota;
pub mod pins;
pub mod sensors;
pub mod telemetry;

mod esp_link_shims;
