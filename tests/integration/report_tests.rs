//! Periodic JSON reports on the status and data topics.

use std::time::Duration;

use soilsense::command::{dispatcher, Command, CommandKind};
use soilsense::config::NodeConfig;
use soilsense::sensors::soil::{self, SoilProbe};
use soilsense::telemetry::{self, SoilReading};

use crate::mock_hw::{fast_config, MockFirmware, MockFlash, TestNode};

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}

#[test]
fn status_report_reflects_counters() {
    let node = TestNode::standard();
    let ctx = &node.ctx;
    dispatcher::dispatch_one(ctx, &Command::new(CommandKind::Water, "", 0)).unwrap();
    let _ = dispatcher::dispatch_one(ctx, &Command::new(CommandKind::Unknown, "?", 0));

    telemetry::publish_status(ctx);
    let status = node.publisher.on(&ctx.topics.status);
    assert_eq!(status.len(), 1);

    let v = json(&status[0]);
    assert_eq!(v["type"], "system_status");
    assert_eq!(v["system"], "online");
    assert_eq!(v["commands_processed"], 1);
    assert_eq!(v["command_errors"], 1);
    assert_eq!(v["water_count"], 1);
    assert_eq!(v["gpio_status"], false);
    assert_eq!(v["firmware_version"], "1.0.0");
    assert_eq!(v["ota_state"], "idle");
    assert_eq!(v["ota_updates"], 0);
}

#[test]
fn no_data_report_before_first_sample() {
    let node = TestNode::standard();
    telemetry::publish_data(&node.ctx);
    assert!(node.publisher.on(&node.ctx.topics.data).is_empty());

    node.ctx.record_reading(SoilReading::from_raw(1400, 9));
    telemetry::publish_data(&node.ctx);
    let data = node.publisher.on(&node.ctx.topics.data);
    let v = json(&data[0]);
    assert_eq!(v["type"], "soil_data");
    assert_eq!(v["raw_adc"], 1400);
    assert_eq!(v["moisture"], 100.0);
}

#[test]
fn reporter_sends_status_at_start_and_data_on_interval() {
    let config = NodeConfig {
        data_interval_ms: 200,
        ..fast_config()
    };
    let node = TestNode::new(
        config,
        MockFirmware::with_version("2.0.0", 1024),
        MockFlash::running("1.0.0"),
    );
    node.ctx.record_reading(SoilReading::from_raw(2200, 0));

    let task = telemetry::spawn_reporter(node.ctx.clone()).unwrap();
    let status = node
        .publisher
        .wait_for(&node.ctx.topics.status, 1, Duration::from_secs(1));
    let data = node
        .publisher
        .wait_for(&node.ctx.topics.data, 1, Duration::from_secs(2));
    task.shutdown();

    assert_eq!(status.len(), 1);
    assert!(!data.is_empty());
    assert_eq!(json(&data[0])["raw_adc"], 2200);
}

#[test]
fn sampler_feeds_reading_command_and_data_report() {
    let config = NodeConfig {
        data_interval_ms: 200,
        ..fast_config()
    };
    let node = TestNode::new(
        config,
        MockFirmware::with_version("2.0.0", 1024),
        MockFlash::running("1.0.0"),
    );
    assert!(node.ctx.latest_reading().is_none());

    soil::sim_set_soil_adc(1800);
    let probe = SoilProbe::new(0).unwrap().with_spacing(Duration::ZERO);
    let sampler = soil::spawn_sampler(node.ctx.clone(), probe).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while node.ctx.latest_reading().is_none() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    sampler.shutdown();

    let reading = node.ctx.latest_reading().unwrap();
    assert_eq!(reading.raw_adc, 1800);

    dispatcher::dispatch_one(&node.ctx, &Command::new(CommandKind::GetReading, "", 0)).unwrap();
    let text = node.responses().pop().unwrap();
    assert!(text.starts_with("reading: moisture=75.0%, voltage=1.45"), "{text}");

    telemetry::publish_data(&node.ctx);
    let data = node.publisher.on(&node.ctx.topics.data);
    assert_eq!(json(&data[0])["raw_adc"], 1800);
}
