//! One-shot completion pulse raised by the dispatcher after each command.
//!
//! Bits are raised and cleared again before the dispatcher waits for the
//! next command, so a reader polling [`DispatchPulse::bits`] only ever sees
//! the outcome of the command being handled right now. Waiters use the
//! generation counter instead, so a pulse that fires between "submit" and
//! "wait" is not lost.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// The last command was executed successfully.
pub const PROCESSED: u8 = 1 << 0;
/// The last command failed or was unknown.
pub const ERROR: u8 = 1 << 1;

#[derive(Default)]
struct PulseState {
    bits: u8,
    last: u8,
    generation: u64,
}

#[derive(Default)]
pub struct DispatchPulse {
    state: Mutex<PulseState>,
    cond: Condvar,
}

impl DispatchPulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raise(&self, bits: u8) {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        s.bits |= bits;
        s.last = bits;
        s.generation = s.generation.wrapping_add(1);
        self.cond.notify_all();
    }

    pub(crate) fn clear(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).bits = 0;
    }

    /// Bits currently raised (zero between commands).
    pub fn bits(&self) -> u8 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).bits
    }

    /// Number of pulses raised so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Wait for the first pulse after `generation`; returns its bits.
    pub fn wait_since(&self, generation: u64, timeout: Duration) -> Option<u8> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, result) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| s.generation == generation)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            None
        } else {
            Some(guard.last)
        }
    }
}
