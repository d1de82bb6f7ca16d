//! Command pipeline: reception → queue → dispatcher → responses.

use std::time::Duration;

use soilsense::command::pulse::{ERROR, PROCESSED};
use soilsense::command::queue::QueueError;
use soilsense::command::receiver::on_message;
use soilsense::command::{dispatcher, Command, CommandError, CommandKind, COMMAND_QUEUE_DEPTH};
use soilsense::telemetry::SoilReading;

use crate::mock_hw::TestNode;

const WAIT: Duration = Duration::from_secs(2);

fn command(kind: CommandKind, payload: &str) -> Command {
    Command::new(kind, payload, 0)
}

// ── Single-command execution ─────────────────────────────────

#[test]
fn water_runs_one_timed_cycle() {
    let node = TestNode::standard();
    let ctx = &node.ctx;

    assert_eq!(dispatcher::dispatch_one(ctx, &command(CommandKind::Water, "")), Ok(()));

    assert_eq!(
        node.responses(),
        vec!["watering started (20 ms)", "watering completed, total 1"]
    );
    // Initial safe state, then one on/off cycle.
    assert_eq!(node.actuator.pump_history(), vec![false, true, false]);
    assert!(!ctx.actuator.is_pump_on());
    assert_eq!(ctx.actuator.water_count(), 1);
    assert_eq!(ctx.stats.snapshot().processed, 1);
}

#[test]
fn status_reports_counters_before_counting_itself() {
    let node = TestNode::standard();
    let ctx = &node.ctx;

    dispatcher::dispatch_one(ctx, &command(CommandKind::Water, "")).unwrap();
    let _ = dispatcher::dispatch_one(ctx, &command(CommandKind::Unknown, "PING"));
    dispatcher::dispatch_one(ctx, &command(CommandKind::GetStatus, "")).unwrap();

    let last = node.responses().pop().unwrap();
    assert_eq!(
        last,
        "status: running, water_count=1, processed=1, errors=1, pump=OFF"
    );
    let counts = ctx.stats.snapshot();
    assert_eq!((counts.processed, counts.errors), (2, 1));
}

#[test]
fn reading_without_sample() {
    let node = TestNode::standard();
    dispatcher::dispatch_one(&node.ctx, &command(CommandKind::GetReading, "")).unwrap();
    assert_eq!(node.responses(), vec!["reading: no reading yet, pump=OFF"]);
}

#[test]
fn reading_reports_latest_sample() {
    let node = TestNode::standard();
    // Halfway between the air and water calibration points.
    node.ctx.record_reading(SoilReading::from_raw(2200, 3));
    dispatcher::dispatch_one(&node.ctx, &command(CommandKind::GetReading, "")).unwrap();

    let text = node.responses().pop().unwrap();
    assert!(text.starts_with("reading: moisture=50.0%, voltage=1.77"), "{text}");
    assert!(text.ends_with("raw_adc=2200, pump=OFF"), "{text}");
}

#[test]
fn unknown_body_is_answered_and_counted() {
    let node = TestNode::standard();
    let err = dispatcher::dispatch_one(&node.ctx, &command(CommandKind::Unknown, "REBOOT"));

    assert_eq!(err, Err(CommandError::Unknown));
    assert_eq!(node.responses(), vec!["unknown command: REBOOT"]);
    assert_eq!(node.ctx.stats.snapshot().errors, 1);
    assert_eq!(node.ctx.actuator.water_count(), 0);
}

#[test]
fn ota_update_without_url_is_invalid() {
    let node = TestNode::standard();
    let err = dispatcher::dispatch_one(&node.ctx, &command(CommandKind::OtaUpdate, ""));

    assert_eq!(err, Err(CommandError::InvalidArgument));
    assert_eq!(
        node.responses(),
        vec!["OTA_UPDATE failed: missing or invalid argument"]
    );
    assert!(node.firmware.opened.lock().unwrap().is_empty());
    assert_eq!(node.ctx.ota.statistics().total_attempts, 0);
}

#[test]
fn cancel_without_update_is_not_active() {
    let node = TestNode::standard();
    let err = dispatcher::dispatch_one(&node.ctx, &command(CommandKind::OtaCancel, ""));

    assert_eq!(err, Err(CommandError::NotActive));
    assert_eq!(
        node.responses(),
        vec!["OTA_CANCEL failed: no OTA update in progress"]
    );
}

#[test]
fn ota_status_when_idle() {
    let node = TestNode::standard();
    dispatcher::dispatch_one(&node.ctx, &command(CommandKind::OtaStatus, "")).unwrap();
    assert_eq!(
        node.responses(),
        vec!["OTA: version=1.0.0, state=idle, progress=0%, attempts=0, ok=0, failed=0, last_result=success"]
    );
}

#[test]
fn pulse_bits_are_cleared_after_each_command() {
    let node = TestNode::standard();
    let ctx = &node.ctx;

    let gen0 = ctx.pulse.generation();
    dispatcher::dispatch_one(ctx, &command(CommandKind::GetStatus, "")).unwrap();
    assert_eq!(ctx.pulse.bits(), 0);
    assert_eq!(ctx.pulse.generation(), gen0 + 1);

    let _ = dispatcher::dispatch_one(ctx, &command(CommandKind::Unknown, "x"));
    assert_eq!(ctx.pulse.bits(), 0);
    assert_eq!(ctx.pulse.generation(), gen0 + 2);
}

// ── Reception and queueing ───────────────────────────────────

#[test]
fn full_queue_rejects_with_busy_response() {
    let node = TestNode::standard();
    let ctx = &node.ctx;

    for _ in 0..COMMAND_QUEUE_DEPTH {
        on_message(ctx, b"GET_STATUS").unwrap();
    }
    assert_eq!(on_message(ctx, b"WATER"), Err(QueueError::Full));

    assert_eq!(ctx.queue.len(), COMMAND_QUEUE_DEPTH);
    assert_eq!(node.responses(), vec!["busy, retry later"]);
    // Rejected at the door: never reaches the dispatcher counters.
    assert_eq!(ctx.stats.snapshot().errors, 0);
}

#[test]
fn receiver_queues_parsed_kind_and_payload() {
    let node = TestNode::standard();
    on_message(&node.ctx, b"OTA_UPDATE http://10.0.0.2/fw.bin").unwrap();
    on_message(&node.ctx, &[0xff, 0xfe]).unwrap();

    let first = node.ctx.queue.try_receive().unwrap();
    assert_eq!(first.kind(), CommandKind::OtaUpdate);
    assert_eq!(first.payload(), "http://10.0.0.2/fw.bin");

    let second = node.ctx.queue.try_receive().unwrap();
    assert_eq!(second.kind(), CommandKind::Unknown);
    assert!(node.ctx.queue.is_empty());
    assert!(node.responses().is_empty());
}

// ── Running dispatcher task ──────────────────────────────────

#[test]
fn dispatcher_task_executes_in_arrival_order() {
    let node = TestNode::standard();
    let ctx = node.ctx.clone();

    on_message(&ctx, b"GET_READING").unwrap();
    on_message(&ctx, "澆水".as_bytes()).unwrap();
    on_message(&ctx, b"BOGUS").unwrap();
    on_message(&ctx, b"GET_STATUS").unwrap();

    let task = dispatcher::spawn(ctx.clone()).unwrap();
    let responses = node.publisher.wait_for(&ctx.topics.response, 5, WAIT);
    task.shutdown();

    assert_eq!(
        responses,
        vec![
            "reading: no reading yet, pump=OFF",
            "watering started (20 ms)",
            "watering completed, total 1",
            "unknown command: BOGUS",
            "status: running, water_count=1, processed=2, errors=1, pump=OFF",
        ]
    );
}

#[test]
fn waiter_sees_pulse_for_its_command() {
    let node = TestNode::standard();
    let ctx = node.ctx.clone();
    let task = dispatcher::spawn(ctx.clone()).unwrap();

    let seen = ctx.pulse.generation();
    on_message(&ctx, b"GET_STATUS").unwrap();
    assert_eq!(ctx.pulse.wait_since(seen, WAIT), Some(PROCESSED));

    let seen = ctx.pulse.generation();
    on_message(&ctx, b"OTA_CANCEL").unwrap();
    assert_eq!(ctx.pulse.wait_since(seen, WAIT), Some(ERROR));

    task.shutdown();
}

#[test]
fn idle_dispatcher_stops_within_a_poll() {
    let node = TestNode::standard();
    let task = dispatcher::spawn(node.ctx.clone()).unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let started = std::time::Instant::now();
    task.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(node.responses().is_empty());
}
