//! GPIO / peripheral pin assignments for the SoilSense node (ESP32-C3).
//!
//! Single source of truth: drivers and the default [`NodeConfig`](crate::config::NodeConfig)
//! reference this module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Digital output: HIGH = pump relay energised.
pub const PUMP_GPIO: i32 = 6;
/// On-board LED, active LOW on the ESP32-C3 dev board.
pub const LED_GPIO: i32 = 8;


// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Soil probe analog output: ADC1 channel 0 (GPIO0).
pub const SOIL_ADC_CHANNEL: u32 = 0;
