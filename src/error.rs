//! Unified error types for the SoilSense firmware.
//!
//! Subsystem errors stay small `Copy` enums so they can be handed across
//! the reception callback, the dispatcher and the OTA worker without
//! allocation. Anything that has to reach `main()` funnels into [`NodeError`].

use core::fmt;

use crate::app::ports::ConfigError;
use crate::command::dispatcher::CommandError;
use crate::ota::OtaError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Errors surfaced to system initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// A core task or resource could not be created at startup.
    Init(&'static str),
    /// Configuration is invalid or could not be stored.
    Config(ConfigError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Command pipeline failure.
    Command(CommandError),
    /// OTA controller rejected a request.
    Ota(OtaError),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
        }
    }
}

impl std::error::Error for NodeError {}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    MqttConnectFailed,
    MqttSubscribeFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::MqttConnectFailed => write!(f, "MQTT connect failed"),
            Self::MqttSubscribeFailed => write!(f, "MQTT subscribe failed"),
        }
    }
}

impl From<CommsError> for NodeError {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<ConfigError> for NodeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CommandError> for NodeError {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<OtaError> for NodeError {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}
