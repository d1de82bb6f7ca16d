//! Command model: the closed set of remote commands and the wire mapping.
//!
//! Wire format (MQTT message body, UTF-8, case-sensitive, no trimming):
//!
//! | Body                | Kind         | Payload        |
//! |---------------------|--------------|----------------|
//! | `WATER` / `澆水`     | `Water`      |                |
//! | `GET_STATUS`        | `GetStatus`  |                |
//! | `GET_READING`       | `GetReading` |                |
//! | `OTA_UPDATE <url>`  | `OtaUpdate`  | `<url>`        |
//! | `OTA_STATUS`        | `OtaStatus`  |                |
//! | `OTA_CANCEL`        | `OtaCancel`  |                |
//! | anything else       | `Unknown`    | the raw body   |

use core::fmt;

use super::bounded::{truncated, Payload};

/// Separates the `OTA_UPDATE` keyword from the firmware URL.
pub const PAYLOAD_DELIMITER: char = ' ';

/// Localised synonym accepted for `WATER`.
pub const WATER_SYNONYM: &str = "澆水";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    Water = 0,
    GetStatus = 1,
    GetReading = 2,
    OtaUpdate = 3,
    OtaStatus = 4,
    OtaCancel = 5,
    /// Never executed; only counted as an error.
    Unknown = 6,
}

impl CommandKind {
    /// Every kind that has an executor.
    pub const EXECUTABLE: [Self; 6] = [
        Self::Water,
        Self::GetStatus,
        Self::GetReading,
        Self::OtaUpdate,
        Self::OtaStatus,
        Self::OtaCancel,
    ];

    /// Canonical wire keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Water => "WATER",
            Self::GetStatus => "GET_STATUS",
            Self::GetReading => "GET_READING",
            Self::OtaUpdate => "OTA_UPDATE",
            Self::OtaStatus => "OTA_STATUS",
            Self::OtaCancel => "OTA_CANCEL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parsed message body, borrowed from the transport buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub kind: CommandKind,
    pub payload: &'a str,
}

/// Map a raw message body onto a [`CommandKind`] and its payload.
pub fn parse(body: &[u8]) -> ParsedCommand<'_> {
    let Ok(text) = core::str::from_utf8(body) else {
        return ParsedCommand {
            kind: CommandKind::Unknown,
            payload: "",
        };
    };

    let kind = match text {
        "WATER" | WATER_SYNONYM => CommandKind::Water,
        "GET_STATUS" => CommandKind::GetStatus,
        "GET_READING" => CommandKind::GetReading,
        "OTA_UPDATE" => CommandKind::OtaUpdate,
        "OTA_STATUS" => CommandKind::OtaStatus,
        "OTA_CANCEL" => CommandKind::OtaCancel,
        _ => {
            if let Some(url) = text
                .strip_prefix(CommandKind::OtaUpdate.keyword())
                .and_then(|rest| rest.strip_prefix(PAYLOAD_DELIMITER))
            {
                return ParsedCommand {
                    kind: CommandKind::OtaUpdate,
                    payload: url,
                };
            }
            return ParsedCommand {
                kind: CommandKind::Unknown,
                payload: text,
            };
        }
    };

    ParsedCommand { kind, payload: "" }
}

/// One queued command. Immutable once built; consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    payload: Payload,
    received_at: u64,
}

impl Command {
    /// `payload` is truncated to 63 bytes.
    pub fn new(kind: CommandKind, payload: &str, received_at: u64) -> Self {
        Self {
            kind,
            payload: truncated(payload),
            received_at,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Monotonic seconds since boot at submission time.
    pub fn received_at(&self) -> u64 {
        self.received_at
    }
}
