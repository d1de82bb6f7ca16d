//! Actuator drivers, GPIO initialisation, and task spawning.

pub mod hw_init;
pub mod pump;
pub mod task;
