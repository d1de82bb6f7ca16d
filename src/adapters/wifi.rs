//! WiFi station bring-up.
//!
//! Credentials are validated on every target; the connect path itself only
//! exists on ESP-IDF, where it blocks until the station has an IP or the
//! retry budget is spent.
//!
//! ## Retry policy
//!
//! Failed attempts back off 2 s → 4 s → 8 s … capped at 60 s, for at most
//! [`MAX_CONNECT_ATTEMPTS`] tries.

use core::fmt;

#[cfg(target_os = "espidf")]
use log::{info, warn};

pub const MAX_CONNECT_ATTEMPTS: u32 = 5;
const MAX_BACKOFF_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl From<WifiError> for crate::error::CommsError {
    fn from(_: WifiError) -> Self {
        Self::WifiConnectFailed
    }
}

/// Validated station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, WifiError> {
        if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
            return Err(WifiError::InvalidSsid);
        }
        if !password.is_empty() && !(8..=64).contains(&password.len()) {
            return Err(WifiError::InvalidPassword);
        }
        let mut s = heapless::String::new();
        let mut p = heapless::String::new();
        // Lengths checked above.
        let _ = s.push_str(ssid);
        let _ = p.push_str(password);
        Ok(Self { ssid: s, password: p })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_secs(attempt: u32) -> u32 {
    2u32.saturating_pow(attempt.max(1)).min(MAX_BACKOFF_SECS)
}

/// Start the station and block until it is connected with an IP.
#[cfg(target_os = "espidf")]
pub fn connect(
    modem: esp_idf_svc::hal::modem::Modem,
    sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
    nvs: esp_idf_svc::nvs::EspDefaultNvsPartition,
    credentials: &WifiCredentials,
) -> Result<esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>, WifiError> {
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

    let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(|_| WifiError::ConnectionFailed)?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(|_| WifiError::ConnectionFailed)?;

    let config = Configuration::Client(ClientConfiguration {
        ssid: credentials.ssid.as_str().try_into().map_err(|_| WifiError::InvalidSsid)?,
        password: credentials
            .password
            .as_str()
            .try_into()
            .map_err(|_| WifiError::InvalidPassword)?,
        auth_method: if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    });
    wifi.set_configuration(&config).map_err(|_| WifiError::ConnectionFailed)?;
    wifi.start().map_err(|_| WifiError::ConnectionFailed)?;

    for attempt in 1..=MAX_CONNECT_ATTEMPTS {
        info!("WIFI: connecting to '{}' (attempt {})", credentials.ssid(), attempt);
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                if let Ok(ip) = wifi.wifi().sta_netif().get_ip_info() {
                    info!("WIFI: connected, ip {}", ip.ip);
                }
                return Ok(wifi);
            }
            Err(e) => {
                let delay = backoff_secs(attempt);
                warn!("WIFI: connect failed ({}), retry in {}s", e, delay);
                std::thread::sleep(std::time::Duration::from_secs(delay as u64));
            }
        }
    }
    Err(WifiError::ConnectionFailed)
}
