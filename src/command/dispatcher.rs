//! Command dispatcher: the single consumer of the command queue and the
//! only place command side effects happen.
//!
//! ```text
//!   loop {
//!       wait ≤ poll interval ──▶ none ──▶ idle tick
//!             │
//!             ▼
//!         execute(kind) ──▶ Ok  ─▶ processed += 1, pulse PROCESSED
//!                       └─▶ Err ─▶ errors    += 1, pulse ERROR, error response
//!   }
//! ```
//!
//! Executors run one at a time on the dispatcher thread. A watering cycle
//! blocks the loop for the whole hold; commands submitted meanwhile wait in
//! the queue.

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use super::model::{Command, CommandKind};
use super::pulse::{ERROR, PROCESSED};
use crate::context::NodeContext;
use crate::drivers::task::{StoppableTask, DISPATCHER_TASK};
use crate::error::NodeError;
use crate::ota::{OtaConfig, OtaError};

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Required payload missing (e.g. `OTA_UPDATE` without a URL).
    InvalidArgument,
    /// An OTA update is already running.
    AlreadyActive,
    /// Nothing to cancel.
    NotActive,
    /// The OTA controller refused the request.
    OtaRejected(OtaError),
    /// Unrecognised command body.
    Unknown,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "missing or invalid argument"),
            Self::AlreadyActive => write!(f, "OTA update already in progress"),
            Self::NotActive => write!(f, "no OTA update in progress"),
            Self::OtaRejected(e) => write!(f, "OTA rejected: {e}"),
            Self::Unknown => write!(f, "unknown command"),
        }
    }
}

// ── Counters ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandCounts {
    pub processed: u32,
    pub errors: u32,
}

#[derive(Default)]
pub struct CommandStats {
    processed: AtomicU32,
    errors: AtomicU32,
}

impl CommandStats {
    pub fn snapshot(&self) -> CommandCounts {
        CommandCounts {
            processed: self.processed.load(Ordering::Acquire),
            errors: self.errors.load(Ordering::Acquire),
        }
    }

    fn record(&self, ok: bool) {
        let counter = if ok { &self.processed } else { &self.errors };
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

// ── Loop ──────────────────────────────────────────────────────

/// Start the dispatcher task. Failing to create it is fatal at boot.
pub fn spawn(ctx: Arc<NodeContext>) -> Result<StoppableTask, NodeError> {
    StoppableTask::spawn(DISPATCHER_TASK, move |stop| run(&ctx, &stop)).map_err(|e| {
        log::error!("CMD: dispatcher spawn failed: {}", e);
        NodeError::Init("dispatcher task")
    })
}

/// Consume commands until `stop` is observed at a poll boundary.
pub fn run(ctx: &NodeContext, stop: &AtomicBool) {
    let poll = ctx.config.dispatch_poll();
    info!("CMD: dispatcher running (poll {} ms)", poll.as_millis());
    while !stop.load(Ordering::Acquire) {
        match ctx.queue.receive_timeout(poll) {
            Some(command) => {
                let _ = dispatch_one(ctx, &command);
            }
            None => idle_tick(ctx),
        }
    }
    info!("CMD: dispatcher stopped");
}

/// Execute one command, count it, pulse and answer failures.
pub fn dispatch_one(ctx: &NodeContext, command: &Command) -> Result<(), CommandError> {
    debug!(
        "CMD: handling {} (queued at {}s)",
        command.kind(),
        command.received_at()
    );
    let result = execute(ctx, command);
    ctx.stats.record(result.is_ok());
    match result {
        Ok(()) => ctx.pulse.raise(PROCESSED),
        Err(e) => {
            warn!("CMD: {} failed: {}", command.kind(), e);
            ctx.respond(&error_response(command, e));
            ctx.pulse.raise(ERROR);
        }
    }
    ctx.pulse.clear();
    result
}

/// Runs when a poll interval passes without a command. Nothing to do yet.
fn idle_tick(_ctx: &NodeContext) {}

fn error_response(command: &Command, e: CommandError) -> String {
    match e {
        CommandError::Unknown => format!("unknown command: {}", command.payload()),
        _ => format!("{} failed: {}", command.kind(), e),
    }
}

// ── Executors ─────────────────────────────────────────────────

fn execute(ctx: &NodeContext, command: &Command) -> Result<(), CommandError> {
    match command.kind() {
        CommandKind::Water => water(ctx),
        CommandKind::GetStatus => get_status(ctx),
        CommandKind::GetReading => get_reading(ctx),
        CommandKind::OtaUpdate => ota_update(ctx, command.payload()),
        CommandKind::OtaStatus => ota_status(ctx),
        CommandKind::OtaCancel => ota_cancel(ctx),
        CommandKind::Unknown => Err(CommandError::Unknown),
    }
}

fn water(ctx: &NodeContext) -> Result<(), CommandError> {
    let hold = ctx.config.water_hold();
    let count = ctx.actuator.water_cycle(hold, || {
        ctx.respond(&format!("watering started ({} ms)", hold.as_millis()));
    });
    ctx.respond(&format!("watering completed, total {count}"));
    Ok(())
}

fn get_status(ctx: &NodeContext) -> Result<(), CommandError> {
    let counts = ctx.stats.snapshot();
    ctx.respond(&format!(
        "status: running, water_count={}, processed={}, errors={}, pump={}",
        ctx.actuator.water_count(),
        counts.processed,
        counts.errors,
        on_off(ctx.actuator.is_pump_on()),
    ));
    Ok(())
}

fn get_reading(ctx: &NodeContext) -> Result<(), CommandError> {
    let pump = on_off(ctx.actuator.is_pump_on());
    let text = match ctx.latest_reading() {
        Some(r) => format!(
            "reading: moisture={:.1}%, voltage={:.3}V, raw_adc={}, pump={}",
            r.moisture_percent, r.voltage, r.raw_adc, pump
        ),
        None => format!("reading: no reading yet, pump={pump}"),
    };
    ctx.respond(&text);
    Ok(())
}

fn ota_update(ctx: &NodeContext, url: &str) -> Result<(), CommandError> {
    if url.is_empty() {
        return Err(CommandError::InvalidArgument);
    }
    if ctx.ota.is_active() {
        return Err(CommandError::AlreadyActive);
    }
    let config = OtaConfig::new(
        url,
        ctx.ota.running_version().as_str(),
        ctx.config.ota_auto_reboot,
        ctx.config.ota_timeout(),
    );
    ctx.ota.start(config).map_err(|e| match e {
        OtaError::AlreadyActive => CommandError::AlreadyActive,
        other => CommandError::OtaRejected(other),
    })?;
    ctx.respond(&format!("OTA update started: {url}"));
    Ok(())
}

fn ota_status(ctx: &NodeContext) -> Result<(), CommandError> {
    let stats = ctx.ota.statistics();
    ctx.respond(&format!(
        "OTA: version={}, state={}, progress={}%, attempts={}, ok={}, failed={}, last_result={}",
        ctx.ota.running_version(),
        ctx.ota.state(),
        ctx.ota.progress(),
        stats.total_attempts,
        stats.successful_updates,
        stats.failed_updates,
        stats.last_result,
    ));
    Ok(())
}

fn ota_cancel(ctx: &NodeContext) -> Result<(), CommandError> {
    ctx.ota.cancel().map_err(|_| CommandError::NotActive)?;
    ctx.respond("OTA cancellation requested");
    Ok(())
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}
