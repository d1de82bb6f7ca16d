//! OTA state machine vocabulary: states, attempt results, request errors
//! and the per-attempt configuration.

use core::fmt;
use core::time::Duration;

use crate::command::bounded::{truncated, UrlString, VersionString};

// ── State machine ─────────────────────────────────────────────

/// ```text
/// Idle ──▶ Downloading ──▶ Verifying ──▶ Installing ──▶ Success
///               │              │              │
///               └──────────────┴──────────────┴──────▶ Error
/// ```
///
/// `Success` and `Error` persist until the next attempt enters `Downloading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OtaState {
    Idle = 0,
    Downloading = 1,
    Verifying = 2,
    Installing = 3,
    Success = 4,
    Error = 5,
}

impl OtaState {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Downloading,
            2 => Self::Verifying,
            3 => Self::Installing,
            4 => Self::Success,
            5 => Self::Error,
            _ => Self::Idle,
        }
    }

    /// An attempt is in flight.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Downloading | Self::Verifying | Self::Installing)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Installing => "installing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for OtaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Attempt result ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OtaResult {
    Success = 0,
    UrlError = 1,
    DownloadError = 2,
    VerifyError = 3,
    InstallError = 4,
    MemoryError = 5,
    NetworkError = 6,
}

impl OtaResult {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::UrlError,
            2 => Self::DownloadError,
            3 => Self::VerifyError,
            4 => Self::InstallError,
            5 => Self::MemoryError,
            6 => Self::NetworkError,
            _ => Self::Success,
        }
    }

    /// Stable numeric code used in status messages.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OtaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::UrlError => write!(f, "URL error"),
            Self::DownloadError => write!(f, "download error"),
            Self::VerifyError => write!(f, "verification error"),
            Self::InstallError => write!(f, "install error"),
            Self::MemoryError => write!(f, "out of memory"),
            Self::NetworkError => write!(f, "network error"),
        }
    }
}

// ── Request errors ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// An attempt is already in flight.
    AlreadyActive,
    /// Nothing to cancel.
    NotActive,
    /// Empty URL or zero timeout.
    InvalidConfig,
    /// The worker task could not be created.
    SpawnFailed,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "OTA update already in progress"),
            Self::NotActive => write!(f, "no OTA update in progress"),
            Self::InvalidConfig => write!(f, "invalid OTA configuration"),
            Self::SpawnFailed => write!(f, "could not start OTA worker"),
        }
    }
}

// ── Per-attempt configuration ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaConfig {
    pub firmware_url: UrlString,
    /// Informational; the image's own descriptor decides the recorded version.
    pub target_version_hint: VersionString,
    pub auto_reboot: bool,
    pub timeout: Duration,
}

impl OtaConfig {
    /// URL and hint are truncated to 255 / 31 bytes.
    pub fn new(firmware_url: &str, target_version_hint: &str, auto_reboot: bool, timeout: Duration) -> Self {
        Self {
            firmware_url: truncated(firmware_url),
            target_version_hint: truncated(target_version_hint),
            auto_reboot,
            timeout,
        }
    }

    pub fn validate(&self) -> Result<(), OtaError> {
        if self.firmware_url.is_empty() || self.timeout.is_zero() {
            return Err(OtaError::InvalidConfig);
        }
        Ok(())
    }
}
