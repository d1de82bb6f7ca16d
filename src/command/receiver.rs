//! Reception side of the pipeline: runs inside the transport callback, so
//! it only parses and enqueues. Nothing here blocks.

use log::warn;

use super::model::parse;
use super::queue::QueueError;
use crate::context::NodeContext;

/// Parse an inbound message body and queue it for the dispatcher.
///
/// Unknown bodies are queued too, so they are counted and answered in order.
/// A full queue is answered here with a single busy response.
pub fn on_message(ctx: &NodeContext, body: &[u8]) -> Result<(), QueueError> {
    let parsed = parse(body);
    ctx.queue.submit(parsed.kind, parsed.payload).inspect_err(|_| {
        warn!("CMD: {} dropped, queue full", parsed.kind);
        ctx.respond("busy, retry later");
    })
}
