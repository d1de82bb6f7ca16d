//! Sensor drivers.

pub mod soil;
