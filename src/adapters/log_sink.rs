//! Log-based progress observer.
//!
//! Implements [`ProgressObserver`] by writing OTA progress to the ESP-IDF
//! logger (UART / USB-CDC in production). Useful on its own during bench
//! bring-up and as the default observer in `main`.

use log::{info, warn};

use crate::app::ports::ProgressObserver;
use crate::ota::OtaState;

/// Adapter that logs every progress notification to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressObserver for LogObserver {
    fn on_progress(&self, percent: u8, state: OtaState, message: &str) {
        match state {
            OtaState::Error => warn!("OTA | {:>3}% | {} | {}", percent, state, message),
            _ => info!("OTA | {:>3}% | {} | {}", percent, state, message),
        }
    }
}
