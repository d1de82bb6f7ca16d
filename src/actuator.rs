//! Actuator control: pump on/off with a timed auto-off watering cycle.
//!
//! The dispatcher is the only writer; status reports and `GET_STATUS` read
//! the pump flag and watering counter from other threads, so both are
//! atomics. The hardware port sits behind a mutex because GPIO writes are
//! `&mut self`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::info;

use crate::app::ports::ActuatorPort;

pub struct ActuatorControl {
    port: Mutex<Box<dyn ActuatorPort>>,
    pump_on: AtomicBool,
    water_count: AtomicU32,
}

impl ActuatorControl {
    /// Takes ownership of the port and drives it to the safe (off) state.
    pub fn new(mut port: Box<dyn ActuatorPort>) -> Self {
        port.set_pump(false);
        port.set_indicator(false);
        Self {
            port: Mutex::new(port),
            pump_on: AtomicBool::new(false),
            water_count: AtomicU32::new(0),
        }
    }

    /// Drive pump and indicator together.
    pub fn set_pump(&self, on: bool) {
        let mut port = self.port.lock().unwrap_or_else(PoisonError::into_inner);
        port.set_pump(on);
        port.set_indicator(on);
        self.pump_on.store(on, Ordering::Release);
    }

    pub fn is_pump_on(&self) -> bool {
        self.pump_on.load(Ordering::Acquire)
    }

    /// Cumulative completed watering cycles since boot.
    pub fn water_count(&self) -> u32 {
        self.water_count.load(Ordering::Acquire)
    }

    /// Pump on, `on_started`, hold for `hold`, pump off, count.
    ///
    /// Blocks the caller for the whole hold. Returns the new cumulative count.
    pub fn water_cycle(&self, hold: Duration, on_started: impl FnOnce()) -> u32 {
        self.set_pump(true);
        on_started();
        std::thread::sleep(hold);
        self.set_pump(false);
        let count = self.water_count.fetch_add(1, Ordering::AcqRel) + 1;
        info!("PUMP: cycle done after {} ms (total {})", hold.as_millis(), count);
        count
    }
}
