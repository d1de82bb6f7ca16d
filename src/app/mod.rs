//! Application boundary: port traits only.
//!
//! The node core (command pipeline, actuator control, OTA controller) talks
//! to the outside world exclusively through the traits in [`ports`], keeping
//! it testable on the host without real peripherals or a network.

pub mod ports;
