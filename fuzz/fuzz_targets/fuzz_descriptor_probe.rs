//! Fuzz target: `DescriptorProbe::feed`
//!
//! The first byte picks a chunk size; the rest is streamed through the
//! probe as a firmware download would be. A version must appear exactly
//! once, and only when the full descriptor span has been seen.
//!
//! cargo fuzz run fuzz_descriptor_probe

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilsense::ota::image::{DescriptorProbe, DESCRIPTOR_SPAN};

fuzz_target!(|data: &[u8]| {
    let Some((&step, body)) = data.split_first() else {
        return;
    };
    let step = usize::from(step).max(1);

    let mut probe = DescriptorProbe::new();
    let mut reported = 0;
    for chunk in body.chunks(step) {
        if probe.feed(chunk).is_some() {
            reported += 1;
        }
    }

    let expected = usize::from(body.len() >= DESCRIPTOR_SPAN);
    assert_eq!(reported, expected);
    assert_eq!(probe.version().is_some(), expected == 1);
});
