//! SoilSense firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │  MqttLink        HttpFirmwareSource   OtaFlash     PumpDriver │
//! │  (Publisher)     (FirmwareSource)     (FlashPort)  (Actuator) │
//! │                                                               │
//! │  ─────────────────── Port trait boundary ───────────────────  │
//! │                                                               │
//! │   mqtt_rx ─▶ receiver ─▶ CommandQueue ─▶ dispatcher           │
//! │                                              │                │
//! │                                              ▼                │
//! │                                   OtaController ─▶ ota_task   │
//! │   sampler ─▶ latest reading ─▶ reporter ─▶ status / data JSON │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use soilsense::adapters::flash::OtaFlash;
use soilsense::adapters::http::HttpFirmwareSource;
use soilsense::adapters::log_sink::LogObserver;
use soilsense::adapters::mqtt::MqttLink;
use soilsense::adapters::nvs::NvsConfigStore;
use soilsense::adapters::wifi::{self, WifiCredentials};
use soilsense::app::ports::ConfigPort;
use soilsense::command::dispatcher;
use soilsense::config::NodeConfig;
use soilsense::context::{NodeContext, NodePorts};
use soilsense::drivers::pump::PumpDriver;
use soilsense::error::NodeError;
use soilsense::pins;
use soilsense::sensors::soil::{self, SoilProbe};
use soilsense::telemetry;

const WIFI_SSID: &str = match option_env!("SOILSENSE_WIFI_SSID") {
    Some(s) => s,
    None => "soilsense",
};
const WIFI_PASS: &str = match option_env!("SOILSENSE_WIFI_PASS") {
    Some(s) => s,
    None => "",
};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("SoilSense v{} starting", env!("CARGO_PKG_VERSION"));

    let flash = Arc::new(OtaFlash);
    flash.mark_running_valid();

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let mut config = match NvsConfigStore::new().and_then(|store| store.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            NodeConfig::default()
        }
    };
    if let Some(url) = option_env!("SOILSENSE_BROKER_URL") {
        config.broker_url = soilsense::command::bounded::truncated(url);
    }
    config.validate().map_err(NodeError::from)?;

    // ── 3. Hardware ───────────────────────────────────────────
    let pump = PumpDriver::new(config.pump_gpio, config.indicator_gpio, config.indicator_active_low)
        .map_err(|e| anyhow::anyhow!("pump GPIO init: {e}"))?;
    let probe = SoilProbe::new(pins::SOIL_ADC_CHANNEL).map_err(|e| anyhow::anyhow!("soil ADC init: {e}"))?;

    // ── 4. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_part = EspDefaultNvsPartition::take()?;
    let credentials = WifiCredentials::new(WIFI_SSID, WIFI_PASS).map_err(|e| anyhow::anyhow!("{e}"))?;
    let _wifi = wifi::connect(peripherals.modem, sysloop, nvs_part, &credentials)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let (mqtt, connection) = MqttLink::connect(&config).map_err(|e| anyhow::anyhow!("{e}"))?;

    // ── 5. Core ───────────────────────────────────────────────
    let ctx = Arc::new(NodeContext::new(
        config,
        NodePorts {
            publisher: mqtt.clone(),
            firmware: Arc::new(HttpFirmwareSource),
            flash,
            actuator: Box::new(pump),
        },
    ));
    ctx.ota.set_observer(Arc::new(LogObserver::new()));

    mqtt.spawn_receiver(connection, ctx.clone())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if !mqtt.wait_connected(Duration::from_secs(10)) {
        warn!("MQTT: broker not reachable yet, continuing");
    }

    // Losing the dispatcher leaves the node deaf; treat it as fatal.
    let dispatcher = dispatcher::spawn(ctx.clone()).map_err(|e| {
        error!("{}", e);
        anyhow::anyhow!("{e}")
    })?;
    let sampler = match soil::spawn_sampler(ctx.clone(), probe) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("Sampler spawn failed ({}), running without readings", e);
            None
        }
    };
    let reporter = match telemetry::spawn_reporter(ctx.clone()) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("Reporter spawn failed ({}), running without reports", e);
            None
        }
    };

    info!(
        "Ready: commands on {}, responses on {}",
        ctx.topics.command, ctx.topics.response
    );

    // ── 6. Park main; the task handles must outlive it ────────
    let _tasks = (dispatcher, sampler, reporter);
    loop {
        std::thread::sleep(Duration::from_secs(60));
        let counts = ctx.stats.snapshot();
        info!(
            "Heartbeat: up {}s, {} processed, {} errors, ota {}",
            ctx.clock.uptime_secs(),
            counts.processed,
            counts.errors,
            ctx.ota.state()
        );
    }
}
