//! ESP application image layout: just enough to pull the version string out
//! of the first bytes of a download.
//!
//! ```text
//! offset  0  esp_image_header_t          (24 bytes)
//! offset 24  esp_image_segment_header_t  ( 8 bytes)
//! offset 32  esp_app_desc_t              (256 bytes)
//!              +0  magic_word        u32
//!              +4  secure_version    u32
//!              +8  reserv1           [u32; 2]
//!             +16  version           [u8; 32]   ◀── compared
//! ```

use core::fmt;

pub const IMAGE_HEADER_LEN: usize = 24;
pub const SEGMENT_HEADER_LEN: usize = 8;
pub const APP_DESC_LEN: usize = 256;

/// Bytes needed before the descriptor can be read.
pub const DESCRIPTOR_SPAN: usize = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN + APP_DESC_LEN;

const VERSION_OFFSET: usize = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN + 16;
pub const VERSION_LEN: usize = 32;

/// The raw 32-byte, NUL-padded version field of an app descriptor.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AppVersion([u8; VERSION_LEN]);

impl AppVersion {
    /// Build from text, keeping at most 31 bytes so the field stays NUL-terminated.
    pub fn new(version: &str) -> Self {
        let mut raw = [0u8; VERSION_LEN];
        let text: heapless::String<{ VERSION_LEN - 1 }> = crate::command::bounded::truncated(version);
        raw[..text.len()].copy_from_slice(text.as_bytes());
        Self(raw)
    }

    pub const fn from_bytes(raw: [u8; VERSION_LEN]) -> Self {
        Self(raw)
    }

    pub const fn empty() -> Self {
        Self([0u8; VERSION_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; VERSION_LEN] {
        &self.0
    }

    /// Text up to the first NUL; `"?"` if the field is not UTF-8.
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(VERSION_LEN);
        core::str::from_utf8(&self.0[..end]).unwrap_or("?")
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppVersion({:?})", self.as_str())
    }
}

/// Collects the leading bytes of a download until the descriptor is covered.
pub struct DescriptorProbe {
    head: heapless::Vec<u8, DESCRIPTOR_SPAN>,
    version: Option<AppVersion>,
}

impl Default for DescriptorProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorProbe {
    pub fn new() -> Self {
        Self {
            head: heapless::Vec::new(),
            version: None,
        }
    }

    /// Feed the next chunk. Returns the version exactly once, on the chunk
    /// that completes the descriptor.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<AppVersion> {
        if self.version.is_some() {
            return None;
        }
        let take = (DESCRIPTOR_SPAN - self.head.len()).min(chunk.len());
        // `take` never exceeds the remaining capacity.
        let _ = self.head.extend_from_slice(&chunk[..take]);
        if self.head.len() < DESCRIPTOR_SPAN {
            return None;
        }
        let mut raw = [0u8; VERSION_LEN];
        raw.copy_from_slice(&self.head[VERSION_OFFSET..VERSION_OFFSET + VERSION_LEN]);
        let version = AppVersion::from_bytes(raw);
        self.version = Some(version);
        Some(version)
    }

    pub fn version(&self) -> Option<AppVersion> {
        self.version
    }
}

/// Build a minimal image prefix carrying `version` (host tests and fuzzing).
pub fn synthetic_header(version: &str) -> [u8; DESCRIPTOR_SPAN] {
    let mut head = [0u8; DESCRIPTOR_SPAN];
    head[0] = 0xE9; // ESP_IMAGE_HEADER_MAGIC
    head[IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN..IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN + 4]
        .copy_from_slice(&0xABCD_5432u32.to_le_bytes());
    head[VERSION_OFFSET..VERSION_OFFSET + VERSION_LEN].copy_from_slice(AppVersion::new(version).as_bytes());
    head
}
