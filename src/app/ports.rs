//! Port traits: the hexagonal boundary between the node core and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Dispatcher / OtaController (core)
//! ```
//!
//! Driven adapters (MQTT client, HTTP client, OTA partitions, GPIO) implement
//! these traits. The core holds them as `Arc<dyn …>` inside
//! [`NodeContext`](crate::context::NodeContext), so the dispatcher and the
//! OTA worker never touch ESP-IDF directly and every path runs on the host
//! against mocks.
//!
//! Ports shared between execution contexts are `Send + Sync`; per-attempt
//! objects ([`FirmwareStream`], [`WriteSession`]) live on the OTA worker
//! thread only.

use core::fmt;
use core::time::Duration;

use crate::ota::{AppVersion, OtaState};

// ───────────────────────────────────────────────────────────────
// Publisher port (core → message broker)
// ───────────────────────────────────────────────────────────────

/// Outbound half of the publish/subscribe transport.
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`. Delivery is at-least-once on target.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (core → GPIO)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the pump relay and its indicator LED.
pub trait ActuatorPort: Send {
    /// Energise or release the pump.
    fn set_pump(&mut self, on: bool);

    /// Logical indicator state; active-low wiring is the adapter's concern.
    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Progress observer (OTA worker → anyone interested)
// ───────────────────────────────────────────────────────────────

/// Receives OTA progress notifications from the worker thread.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8, state: OtaState, message: &str);
}

// ───────────────────────────────────────────────────────────────
// Firmware source (core ← HTTP)
// ───────────────────────────────────────────────────────────────

/// Opens streaming connections to a firmware URL.
pub trait FirmwareSource: Send + Sync {
    fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn FirmwareStream + '_>, StreamError>;
}

/// One open firmware transfer. Dropping it releases the connection.
pub trait FirmwareStream {
    /// Total body length from the response headers.
    fn content_length(&mut self) -> Result<usize, StreamError>;

    /// Read up to `buf.len()` bytes; `Ok(0)` means the body is exhausted.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;
}

// ───────────────────────────────────────────────────────────────
// Flash port (core → OTA partitions, boot selection, reset)
// ───────────────────────────────────────────────────────────────

/// A writable boot partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub label: heapless::String<16>,
    pub address: u32,
    pub size: u32,
}

/// Abstract OTA partition writer.
pub trait FlashPort: Send + Sync {
    /// Version string embedded in the currently running image.
    fn running_version(&self) -> AppVersion;

    /// Find the inactive boot partition.
    fn acquire_target_region(&self) -> Result<Region, FlashError>;

    /// Open a sequential write session against `region`.
    fn begin_write(&self, region: &Region) -> Result<Box<dyn WriteSession + '_>, FlashError>;

    /// Make `region` the next boot target.
    fn select_boot_region(&self, region: &Region) -> Result<(), FlashError>;

    /// Full device restart.
    fn restart(&self) -> !;
}

/// Sequential write into a boot partition.
///
/// Dropping a session without calling [`finalize`](Self::finalize) leaves the
/// partition unfinished; it is never selected as a boot target.
pub trait WriteSession {
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError>;

    /// Close the session and run the platform image check.
    fn finalize(self: Box<Self>) -> Result<(), FlashError>;

    /// Discard everything written so far.
    fn abort(self: Box<Self>);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration (NVS on target).
pub trait ConfigPort {
    /// Returns [`NodeConfig::default()`](crate::config::NodeConfig) if nothing is stored.
    fn load(&self) -> Result<crate::config::NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &crate::config::NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Broker connection is down.
    NotConnected,
    /// Client refused the message (outbox full, payload too large).
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// Could not connect or send the request.
    Connect,
    /// Response headers missing, malformed, or no usable length.
    Headers,
    /// Body read failed or timed out.
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// No inactive OTA partition exists.
    NoPartition,
    BeginFailed,
    WriteFailed,
    /// Finalize rejected the image (bad magic, checksum, signature).
    ValidationFailed,
    /// Finalize failed for any other reason.
    FinalizeFailed,
    BootSelectFailed,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "broker not connected"),
            Self::Rejected => write!(f, "publish rejected by client"),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection failed"),
            Self::Headers => write!(f, "bad response headers"),
            Self::Read => write!(f, "body read failed"),
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPartition => write!(f, "no inactive OTA partition available"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::ValidationFailed => write!(f, "image validation failed"),
            Self::FinalizeFailed => write!(f, "OTA end failed"),
            Self::BootSelectFailed => write!(f, "set boot partition failed"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
