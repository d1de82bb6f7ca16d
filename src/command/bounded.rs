//! Length-bounded owned strings.
//!
//! Wire payloads, URLs and version strings are stored in fixed-capacity
//! `heapless::String`s. Oversized input is truncated silently at the last
//! UTF-8 boundary that fits.

/// Copy `s` into a `heapless::String<N>`, dropping whatever does not fit.
pub fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = heapless::String::new();
    // `end <= N`, so this cannot overflow.
    let _ = out.push_str(&s[..end]);
    out
}

/// Command payload: at most 63 bytes.
pub type Payload = heapless::String<63>;

/// Firmware URL: at most 255 bytes.
pub type UrlString = heapless::String<255>;

/// Version hint: at most 31 bytes.
pub type VersionString = heapless::String<31>;
