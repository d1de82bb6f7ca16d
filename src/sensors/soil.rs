//! Capacitive soil-moisture probe.
//!
//! Reads the probe's analog output through an ADC1 oneshot channel and
//! averages a short burst of samples per reading. The sampler task stores
//! one reading per data interval in the node context, where `GET_READING`
//! and the data report pick it up.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

use core::sync::atomic::{AtomicU16, Ordering};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::context::NodeContext;
use crate::drivers::hw_init::{self, HwInitError};
use crate::drivers::task::{StoppableTask, SAMPLER_TASK};
use crate::telemetry::SoilReading;

static SIM_SOIL_ADC: AtomicU16 = AtomicU16::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_soil_adc(raw: u16) {
    SIM_SOIL_ADC.store(raw, Ordering::Relaxed);
}

/// Samples averaged into one reading.
pub const SAMPLE_COUNT: u32 = 10;
const SAMPLE_SPACING: Duration = Duration::from_millis(10);

/// Sampler wake-up granularity; also bounds how long a stop takes.
const SAMPLER_TICK: Duration = Duration::from_millis(100);

pub struct SoilProbe {
    channel: u32,
    spacing: Duration,
    total_reads: u32,
}

impl SoilProbe {
    pub fn new(channel: u32) -> Result<Self, HwInitError> {
        hw_init::init_adc(channel)?;
        Ok(Self {
            channel,
            spacing: SAMPLE_SPACING,
            total_reads: 0,
        })
    }

    /// Override the delay between burst samples.
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn total_reads(&self) -> u32 {
        self.total_reads
    }

    /// Average one burst and convert it, stamped with `taken_at`.
    pub fn read(&mut self, taken_at: u64) -> SoilReading {
        self.total_reads = self.total_reads.saturating_add(1);
        let mut sum = 0u32;
        for i in 0..SAMPLE_COUNT {
            sum += u32::from(self.read_adc());
            if i + 1 < SAMPLE_COUNT {
                std::thread::sleep(self.spacing);
            }
        }
        SoilReading::from_raw((sum / SAMPLE_COUNT) as u16, taken_at)
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(self.channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_SOIL_ADC.load(Ordering::Relaxed)
    }
}

/// Start the sampler loop: one reading right away, then one per data interval.
pub fn spawn_sampler(ctx: Arc<NodeContext>, mut probe: SoilProbe) -> io::Result<StoppableTask> {
    StoppableTask::spawn(SAMPLER_TASK, move |stop| {
        let every = ctx.config.data_interval();
        let mut since = every;
        info!(
            "SENSOR: sampling ADC1 ch{} every {} ms",
            probe.channel(),
            every.as_millis()
        );
        while !stop.load(Ordering::Acquire) {
            if since >= every {
                let reading = probe.read(ctx.clock.uptime_secs());
                debug!(
                    "SENSOR: adc={} {:.3}V {:.1}%",
                    reading.raw_adc, reading.voltage, reading.moisture_percent
                );
                ctx.record_reading(reading);
                since = Duration::ZERO;
            }
            std::thread::sleep(SAMPLER_TICK);
            since += SAMPLER_TICK;
        }
        debug!("SENSOR: stopped after {} reads", probe.total_reads());
    })
}
