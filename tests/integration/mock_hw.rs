//! Mock platform adapters for integration tests.
//!
//! Every port records what the core did to it, so tests assert on the full
//! history (published messages, pump levels, flash writes) without a broker,
//! an HTTP server or OTA partitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use soilsense::app::ports::{
    ActuatorPort, FirmwareSource, FirmwareStream, FlashError, FlashPort, ProgressObserver,
    PublishError, Publisher, Region, StreamError, WriteSession,
};
use soilsense::command::bounded::truncated;
use soilsense::config::NodeConfig;
use soilsense::context::{NodeContext, NodePorts};
use soilsense::ota::image::synthetic_header;
use soilsense::ota::{AppVersion, OtaState};

// ── Publisher ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    /// Bodies published on `topic`, oldest first.
    pub fn on(&self, topic: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    /// Poll until `topic` has at least `n` messages.
    pub fn wait_for(&self, topic: &str, n: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let got = self.on(topic);
            if got.len() >= n || Instant::now() >= deadline {
                return got;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let body = String::from_utf8_lossy(payload).into_owned();
        self.messages.lock().unwrap().push((topic.to_owned(), body));
        Ok(())
    }
}

// ── Actuator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Pump(bool),
    Indicator(bool),
}

#[derive(Clone, Default)]
pub struct RecordingActuator {
    pub levels: Arc<Mutex<Vec<Level>>>,
}

#[allow(dead_code)]
impl RecordingActuator {
    pub fn pump_history(&self) -> Vec<bool> {
        self.levels
            .lock()
            .unwrap()
            .iter()
            .filter_map(|l| match l {
                Level::Pump(on) => Some(*on),
                Level::Indicator(_) => None,
            })
            .collect()
    }
}

impl ActuatorPort for RecordingActuator {
    fn set_pump(&mut self, on: bool) {
        self.levels.lock().unwrap().push(Level::Pump(on));
    }

    fn set_indicator(&mut self, on: bool) {
        self.levels.lock().unwrap().push(Level::Indicator(on));
    }
}

// ── Firmware source ───────────────────────────────────────────

/// Holds reads until opened; lets a test act while a download is in flight.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub fn pass(&self) {
        let guard = self.open.lock().unwrap();
        let _unused = self.cond.wait_while(guard, |open| !*open).unwrap();
    }
}

pub struct MockFirmware {
    image: Vec<u8>,
    /// Overrides the advertised length (defaults to the image size).
    pub declared_len: Option<usize>,
    pub refuse_connect: bool,
    /// Body reads fail once this many bytes have been served.
    pub read_error_after: Option<usize>,
    pub gate: Option<Arc<Gate>>,
    pub opened: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockFirmware {
    /// An image whose descriptor carries `version`, padded to `len` bytes.
    pub fn with_version(version: &str, len: usize) -> Self {
        let mut image = synthetic_header(version).to_vec();
        image.resize(len.max(image.len()), 0xA5);
        Self::from_bytes(image)
    }

    pub fn from_bytes(image: Vec<u8>) -> Self {
        Self {
            image,
            declared_len: None,
            refuse_connect: false,
            read_error_after: None,
            gate: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }
}

impl FirmwareSource for MockFirmware {
    fn open(&self, url: &str, _timeout: Duration) -> Result<Box<dyn FirmwareStream + '_>, StreamError> {
        self.opened.lock().unwrap().push(url.to_owned());
        if self.refuse_connect {
            return Err(StreamError::Connect);
        }
        Ok(Box::new(MockStream { source: self, pos: 0 }))
    }
}

struct MockStream<'a> {
    source: &'a MockFirmware,
    pos: usize,
}

impl FirmwareStream for MockStream<'_> {
    fn content_length(&mut self) -> Result<usize, StreamError> {
        Ok(self.source.declared_len.unwrap_or(self.source.image.len()))
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if let Some(gate) = &self.source.gate {
            gate.pass();
        }
        if self.source.read_error_after.is_some_and(|n| self.pos >= n) {
            return Err(StreamError::Read);
        }
        let rest = &self.source.image[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

// ── Flash ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FlashLog {
    pub written: Vec<u8>,
    pub finalized: bool,
    pub aborted: bool,
    pub boot_selected: Option<Region>,
}

/// Flash operation a [`MockFlash`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStep {
    Region,
    Begin,
    Write,
    Finalize,
    BootSelect,
}

pub struct MockFlash {
    running: AppVersion,
    pub reject_image: bool,
    pub fail_at: Option<FlashStep>,
    /// Held before finalize (worker parked in `Verifying`).
    pub finalize_gate: Option<Arc<Gate>>,
    /// Held before boot selection (worker parked in `Installing`).
    pub boot_gate: Option<Arc<Gate>>,
    pub log: Mutex<FlashLog>,
    restarted: AtomicBool,
}

#[allow(dead_code)]
impl MockFlash {
    pub fn running(version: &str) -> Self {
        Self {
            running: AppVersion::new(version),
            reject_image: false,
            fail_at: None,
            finalize_gate: None,
            boot_gate: None,
            log: Mutex::new(FlashLog::default()),
            restarted: AtomicBool::new(false),
        }
    }

    pub fn restarted(&self) -> bool {
        self.restarted.load(Ordering::Acquire)
    }

    pub fn wait_restart(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.restarted() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }

    fn fails_at(&self, step: FlashStep) -> bool {
        self.fail_at == Some(step)
    }

    pub fn region() -> Region {
        Region {
            label: truncated("ota_1"),
            address: 0x0021_0000,
            size: 0x001F_0000,
        }
    }
}

impl FlashPort for MockFlash {
    fn running_version(&self) -> AppVersion {
        self.running
    }

    fn acquire_target_region(&self) -> Result<Region, FlashError> {
        if self.fails_at(FlashStep::Region) {
            return Err(FlashError::NoPartition);
        }
        Ok(Self::region())
    }

    fn begin_write(&self, _region: &Region) -> Result<Box<dyn WriteSession + '_>, FlashError> {
        if self.fails_at(FlashStep::Begin) {
            return Err(FlashError::BeginFailed);
        }
        Ok(Box::new(MockSession { flash: self }))
    }

    fn select_boot_region(&self, region: &Region) -> Result<(), FlashError> {
        if let Some(gate) = &self.boot_gate {
            gate.pass();
        }
        if self.fails_at(FlashStep::BootSelect) {
            return Err(FlashError::BootSelectFailed);
        }
        self.log.lock().unwrap().boot_selected = Some(region.clone());
        Ok(())
    }

    fn restart(&self) -> ! {
        self.restarted.store(true, Ordering::Release);
        // A real restart never returns; keep the worker thread parked.
        loop {
            std::thread::park();
        }
    }
}

struct MockSession<'a> {
    flash: &'a MockFlash,
}

impl WriteSession for MockSession<'_> {
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        if self.flash.fails_at(FlashStep::Write) {
            return Err(FlashError::WriteFailed);
        }
        self.flash.log.lock().unwrap().written.extend_from_slice(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), FlashError> {
        if let Some(gate) = &self.flash.finalize_gate {
            gate.pass();
        }
        if self.flash.reject_image {
            return Err(FlashError::ValidationFailed);
        }
        if self.flash.fails_at(FlashStep::Finalize) {
            return Err(FlashError::FinalizeFailed);
        }
        self.flash.log.lock().unwrap().finalized = true;
        Ok(())
    }

    fn abort(self: Box<Self>) {
        self.flash.log.lock().unwrap().aborted = true;
    }
}

// ── Progress observer ─────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<(u8, OtaState)>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, percent: u8, state: OtaState, _message: &str) {
        self.events.lock().unwrap().push((percent, state));
    }
}

// ── Node assembly ─────────────────────────────────────────────

/// Short timings so watering and reboot grace do not slow the suite.
pub fn fast_config() -> NodeConfig {
    NodeConfig {
        dispatch_poll_ms: 20,
        water_hold_ms: 20,
        ota_reboot_grace_ms: 10,
        ota_auto_reboot: false,
        ..NodeConfig::default()
    }
}

pub struct TestNode {
    pub ctx: Arc<NodeContext>,
    pub publisher: Arc<RecordingPublisher>,
    pub firmware: Arc<MockFirmware>,
    pub flash: Arc<MockFlash>,
    pub actuator: RecordingActuator,
}

#[allow(dead_code)]
impl TestNode {
    pub fn new(config: NodeConfig, firmware: MockFirmware, flash: MockFlash) -> Self {
        let publisher = Arc::new(RecordingPublisher::default());
        let firmware = Arc::new(firmware);
        let flash = Arc::new(flash);
        let actuator = RecordingActuator::default();
        let ctx = Arc::new(NodeContext::new(
            config,
            NodePorts {
                publisher: publisher.clone(),
                firmware: firmware.clone(),
                flash: flash.clone(),
                actuator: Box::new(actuator.clone()),
            },
        ));
        Self {
            ctx,
            publisher,
            firmware,
            flash,
            actuator,
        }
    }

    /// Node running 1.0.0 with a 2.0.0 image on offer.
    pub fn standard() -> Self {
        Self::new(
            fast_config(),
            MockFirmware::with_version("2.0.0", 4096),
            MockFlash::running("1.0.0"),
        )
    }

    /// Poll until the OTA state machine reaches `state`.
    pub fn wait_ota_state(&self, state: OtaState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.ctx.ota.state() != state {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }

    pub fn responses(&self) -> Vec<String> {
        self.publisher.on(&self.ctx.topics.response)
    }

    pub fn ota_messages(&self) -> Vec<String> {
        self.publisher.on(&self.ctx.topics.ota_status)
    }
}
