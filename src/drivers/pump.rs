//! Watering pump relay + indicator LED driver.
//!
//! A dumb on/off actuator: the timed cycle lives in
//! [`ActuatorControl`](crate::actuator::ActuatorControl).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real GPIO via hw_init helpers.
//! On host/test: writes land in the hw_init simulated pin register.

use crate::app::ports::ActuatorPort;
use crate::drivers::hw_init;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Running,
}

pub struct PumpDriver {
    pump_gpio: i32,
    indicator_gpio: i32,
    indicator_active_low: bool,
    state: PumpState,
}

impl PumpDriver {
    /// Configures both pins as outputs, pump off, indicator dark.
    pub fn new(
        pump_gpio: i32,
        indicator_gpio: i32,
        indicator_active_low: bool,
    ) -> Result<Self, hw_init::HwInitError> {
        hw_init::init_outputs(&[(pump_gpio, false), (indicator_gpio, indicator_active_low)])?;
        Ok(Self {
            pump_gpio,
            indicator_gpio,
            indicator_active_low,
            state: PumpState::Stopped,
        })
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }
}

impl ActuatorPort for PumpDriver {
    fn set_pump(&mut self, on: bool) {
        hw_init::gpio_write(self.pump_gpio, on);
        self.state = if on { PumpState::Running } else { PumpState::Stopped };
    }

    fn set_indicator(&mut self, on: bool) {
        hw_init::gpio_write(self.indicator_gpio, on != self.indicator_active_low);
    }
}
