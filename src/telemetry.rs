//! Periodic JSON reports: soil data every couple of seconds, system status
//! every half minute.
//!
//! Field names are consumed by the existing dashboard and must not change.

use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use crate::context::NodeContext;
use crate::drivers::task::{StoppableTask, REPORTER_TASK};

/// Sensor reading in dry air.
pub const ADC_AIR_VALUE: u16 = 3000;
/// Sensor reading fully submerged.
pub const ADC_WATER_VALUE: u16 = 1400;
const ADC_FULL_SCALE: f32 = 4095.0;
const ADC_VREF: f32 = 3.3;

/// Reporter wake-up granularity; also bounds how long a stop takes.
const REPORTER_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilReading {
    pub raw_adc: u16,
    pub voltage: f32,
    pub moisture_percent: f32,
    /// Uptime seconds when the sample was taken.
    pub taken_at: u64,
}

impl SoilReading {
    /// Convert an averaged 12-bit sample using the uncalibrated linear model.
    pub fn from_raw(raw_adc: u16, taken_at: u64) -> Self {
        let voltage = f32::from(raw_adc) * ADC_VREF / ADC_FULL_SCALE;
        let span = f32::from(ADC_AIR_VALUE - ADC_WATER_VALUE);
        let moisture = (f32::from(ADC_AIR_VALUE) - f32::from(raw_adc)) * 100.0 / span;
        Self {
            raw_adc,
            voltage,
            moisture_percent: moisture.clamp(0.0, 100.0),
            taken_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: u64,
    pub system: &'static str,
    pub uptime: u64,
    pub gpio_status: bool,
    pub commands_processed: u32,
    pub command_errors: u32,
    pub water_count: u32,
    pub firmware_version: String,
    pub ota_updates: u32,
    pub ota_success: u32,
    pub ota_failed: u32,
    pub ota_state: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataReport {
    pub timestamp: u64,
    pub voltage: f32,
    pub moisture: f32,
    pub raw_adc: u16,
    pub gpio_status: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

pub fn status_report(ctx: &NodeContext) -> StatusReport {
    let now = ctx.clock.uptime_secs();
    let counts = ctx.stats.snapshot();
    let ota = ctx.ota.statistics();
    StatusReport {
        timestamp: now,
        system: "online",
        uptime: now,
        gpio_status: ctx.actuator.is_pump_on(),
        commands_processed: counts.processed,
        command_errors: counts.errors,
        water_count: ctx.actuator.water_count(),
        firmware_version: ctx.ota.running_version().to_string(),
        ota_updates: ota.total_attempts,
        ota_success: ota.successful_updates,
        ota_failed: ota.failed_updates,
        ota_state: ctx.ota.state().label(),
        kind: "system_status",
    }
}

/// `None` until the first sample has been recorded.
pub fn data_report(ctx: &NodeContext) -> Option<DataReport> {
    ctx.latest_reading().map(|r| DataReport {
        timestamp: ctx.clock.uptime_secs(),
        voltage: r.voltage,
        moisture: r.moisture_percent,
        raw_adc: r.raw_adc,
        gpio_status: ctx.actuator.is_pump_on(),
        kind: "soil_data",
    })
}

pub fn publish_status(ctx: &NodeContext) {
    match serde_json::to_vec(&status_report(ctx)) {
        Ok(json) => ctx.publish(&ctx.topics.status, &json),
        Err(e) => warn!("REPORT: status encode failed: {}", e),
    }
}

pub fn publish_data(ctx: &NodeContext) {
    let Some(report) = data_report(ctx) else {
        return;
    };
    match serde_json::to_vec(&report) {
        Ok(json) => {
            debug!(
                "REPORT: adc={} {:.3}V {:.1}% pump={}",
                report.raw_adc,
                report.voltage,
                report.moisture,
                if report.gpio_status { "ON" } else { "OFF" }
            );
            ctx.publish(&ctx.topics.data, &json);
        }
        Err(e) => warn!("REPORT: data encode failed: {}", e),
    }
}

/// Start the reporter loop on its own task.
pub fn spawn_reporter(ctx: Arc<NodeContext>) -> io::Result<StoppableTask> {
    StoppableTask::spawn(REPORTER_TASK, move |stop| {
        let data_every = ctx.config.data_interval();
        let status_every = ctx.config.status_interval();
        let mut since_data = Duration::ZERO;
        let mut since_status = status_every;
        while !stop.load(Ordering::Acquire) {
            if since_data >= data_every {
                publish_data(&ctx);
                since_data = Duration::ZERO;
            }
            if since_status >= status_every {
                publish_status(&ctx);
                since_status = Duration::ZERO;
            }
            std::thread::sleep(REPORTER_TICK);
            since_data += REPORTER_TICK;
            since_status += REPORTER_TICK;
        }
        debug!("REPORT: stopped");
    })
}
