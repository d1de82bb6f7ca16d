//! Fuzz target: `command::parse` and `Command::new`
//!
//! Arbitrary message bodies must never panic the parser, and whatever it
//! returns must fit in a queued command without splitting a character.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilsense::command::{parse, Command, CommandKind};

fuzz_target!(|data: &[u8]| {
    let parsed = parse(data);
    if !matches!(parsed.kind, CommandKind::Unknown | CommandKind::OtaUpdate) {
        assert!(parsed.payload.is_empty(), "keyword commands carry no payload");
    }

    let cmd = Command::new(parsed.kind, parsed.payload, 0);
    assert!(cmd.payload().len() <= 63);
    assert!(parsed.payload.starts_with(cmd.payload()));
});
