//! Remote command pipeline.
//!
//! ```text
//!  transport ─▶ receiver::on_message ─▶ CommandQueue (10) ─▶ dispatcher
//! ```

pub mod bounded;
pub mod dispatcher;
pub mod model;
pub mod pulse;
pub mod queue;
pub mod receiver;

pub use dispatcher::{CommandCounts, CommandError, CommandStats};
pub use model::{parse, Command, CommandKind, ParsedCommand};
pub use queue::{CommandQueue, QueueError, COMMAND_QUEUE_DEPTH};
