//! Bounded command queue between the reception context and the dispatcher.
//!
//! Backed by an `embassy-sync` channel behind a critical-section mutex, so
//! any number of producers may submit while the single dispatcher drains it.
//!
//! ```text
//! ┌──────────────────┐  Command   ┌────────────────┐
//! │ MQTT callback    │──────────▶│  Dispatcher    │
//! │ (try_send, never │  depth 10  │  (timed wait)  │
//! │  blocks)         │            │                │
//! └──────────────────┘            └────────────────┘
//! ```

use core::fmt;
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::debug;

use super::model::{Command, CommandKind};
use crate::adapters::time::MonotonicClock;

/// Fixed queue capacity.
pub const COMMAND_QUEUE_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue at capacity; the submitter should retry later.
    Full,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "command queue full"),
        }
    }
}

pub struct CommandQueue {
    channel: Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>,
    clock: MonotonicClock,
}

impl CommandQueue {
    pub fn new(clock: MonotonicClock) -> Self {
        Self {
            channel: Channel::new(),
            clock,
        }
    }

    /// Stamp and enqueue a command without blocking.
    pub fn submit(&self, kind: CommandKind, payload: &str) -> Result<(), QueueError> {
        let command = Command::new(kind, payload, self.clock.uptime_secs());
        match self.channel.try_send(command) {
            Ok(()) => {
                debug!("CMD: queued {} ({} pending)", kind, self.channel.len());
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(QueueError::Full),
        }
    }

    /// Wait up to `timeout` for the next command.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<Command> {
        if let Ok(command) = self.channel.try_receive() {
            return Some(command);
        }
        let timeout = embassy_time::Duration::from_micros(timeout.as_micros() as u64);
        futures_lite::future::block_on(embassy_time::with_timeout(timeout, self.channel.receive())).ok()
    }

    /// Take the next command if one is already waiting.
    pub fn try_receive(&self) -> Option<Command> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        COMMAND_QUEUE_DEPTH
    }
}
