//! One OTA attempt, run to completion on its own thread.
//!
//! Every exit path funnels into exactly one of [`Worker::succeed`] or
//! [`Worker::fail`], which update the counters, publish one status message
//! and leave the state machine in a terminal state. The firmware stream and
//! the write session are dropped before either runs. The controller joins
//! this thread before starting the next attempt.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::controller::{OtaPorts, OtaShared};
use super::image::{AppVersion, DescriptorProbe};
use super::state::{OtaConfig, OtaResult, OtaState};
use crate::adapters::time::MonotonicClock;
use crate::app::ports::{FirmwareStream, ProgressObserver, WriteSession};

/// Download chunk size.
pub const OTA_CHUNK_SIZE: usize = 1024;

/// Why an attempt ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Failure {
    result: OtaResult,
    reason: &'static str,
}

impl Failure {
    const fn new(result: OtaResult, reason: &'static str) -> Self {
        Self { result, reason }
    }
}

pub(super) struct Worker {
    pub(super) shared: Arc<OtaShared>,
    pub(super) ports: OtaPorts,
    pub(super) observer: Option<Arc<dyn ProgressObserver>>,
    pub(super) config: OtaConfig,
    pub(super) clock: MonotonicClock,
    pub(super) status_topic: String,
    pub(super) reboot_grace: Duration,
}

impl Worker {
    pub(super) fn run(self) {
        self.notify(0, OtaState::Downloading, "downloading firmware");
        match self.attempt() {
            Ok(version) => self.succeed(version),
            Err(failure) => self.fail(failure),
        }
    }

    fn attempt(&self) -> Result<AppVersion, Failure> {
        let flash = &self.ports.flash;
        let mut stream = self
            .ports
            .source
            .open(&self.config.firmware_url, self.config.timeout)
            .map_err(|e| {
                warn!("OTA: open {} failed: {}", self.config.firmware_url, e);
                Failure::new(OtaResult::NetworkError, "connection failed")
            })?;

        let region = flash.acquire_target_region().map_err(|e| {
            warn!("OTA: {}", e);
            Failure::new(OtaResult::InstallError, "no update partition")
        })?;
        info!(
            "OTA: writing partition {} at 0x{:08x} ({} bytes)",
            region.label, region.address, region.size
        );

        let mut session = flash.begin_write(&region).map_err(|e| {
            warn!("OTA: {}", e);
            Failure::new(OtaResult::InstallError, "could not open partition")
        })?;

        let version = match self.download(stream.as_mut(), session.as_mut()) {
            Ok(v) => v,
            Err(failure) => {
                session.abort();
                return Err(failure);
            }
        };
        drop(stream);

        self.transition(OtaState::Verifying, "verifying image");
        session.finalize().map_err(|e| {
            warn!("OTA: {}", e);
            match e {
                crate::app::ports::FlashError::ValidationFailed => {
                    Failure::new(OtaResult::VerifyError, "image validation failed")
                }
                _ => Failure::new(OtaResult::InstallError, "could not close partition"),
            }
        })?;

        self.transition(OtaState::Installing, "selecting boot partition");
        flash.select_boot_region(&region).map_err(|e| {
            warn!("OTA: {}", e);
            Failure::new(OtaResult::InstallError, "could not select boot partition")
        })?;

        Ok(version)
    }

    /// Stream the body into `session`, checking the image descriptor on the way.
    fn download(
        &self,
        stream: &mut dyn FirmwareStream,
        session: &mut dyn WriteSession,
    ) -> Result<AppVersion, Failure> {
        let total = match stream.content_length() {
            Ok(0) | Err(_) => return Err(Failure::new(OtaResult::DownloadError, "no content length")),
            Ok(n) => n,
        };
        info!("OTA: image is {} bytes", total);

        let running = self.ports.flash.running_version();
        let mut probe = DescriptorProbe::new();
        let mut buf = [0u8; OTA_CHUNK_SIZE];
        let mut received = 0usize;
        let mut last_decile = 0u8;

        loop {
            if self.shared.cancel_requested() {
                info!("OTA: cancelled after {} bytes", received);
                return Err(Failure::new(OtaResult::DownloadError, "cancelled"));
            }
            let n = stream
                .read_chunk(&mut buf)
                .map_err(|_| Failure::new(OtaResult::DownloadError, "read failed"))?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];

            if let Some(incoming) = probe.feed(chunk) {
                info!("OTA: incoming {} (running {})", incoming, running);
                if incoming == running {
                    return Err(Failure::new(OtaResult::VerifyError, "same version as running"));
                }
            }

            session
                .write(chunk)
                .map_err(|_| Failure::new(OtaResult::InstallError, "flash write failed"))?;
            received += n;

            let percent = self.shared.advance_progress(percent_of(received, total));
            if percent / 10 > last_decile {
                last_decile = percent / 10;
                debug!("OTA: {} / {} bytes", received, total);
                self.notify(percent, OtaState::Downloading, "downloading");
            }
        }

        if received < total {
            warn!("OTA: body ended at {} of {} bytes", received, total);
            return Err(Failure::new(OtaResult::DownloadError, "incomplete download"));
        }
        probe
            .version()
            .ok_or(Failure::new(OtaResult::VerifyError, "image too short for descriptor"))
    }

    fn succeed(&self, version: AppVersion) {
        // Progress and counters settle before the state turns terminal.
        let percent = self.shared.advance_progress(100);
        self.shared.stats.record_success(version, self.clock.uptime_secs());
        self.shared.set_state(OtaState::Success);
        self.notify(percent, OtaState::Success, "update complete");
        info!("OTA: installed {}", version);

        if self.config.auto_reboot {
            self.publish_status(&format!(
                "OTA update succeeded: {}, restarting in {}s",
                version,
                self.reboot_grace.as_secs()
            ));
            std::thread::sleep(self.reboot_grace);
            info!("OTA: restarting");
            self.ports.flash.restart();
        }
        self.publish_status(&format!(
            "OTA update succeeded: {}, active after next restart",
            version
        ));
    }

    fn fail(&self, failure: Failure) {
        let result = failure.result;
        let percent = self.shared.progress();
        self.shared.stats.record_failure(result, self.clock.uptime_secs());
        self.shared.set_state(OtaState::Error);
        warn!("OTA: failed ({}): {}", result, failure.reason);
        self.notify(percent, OtaState::Error, failure.reason);
        self.publish_status(&format!(
            "OTA update failed: {} (code {})",
            result,
            result.code()
        ));
    }

    fn transition(&self, state: OtaState, message: &str) {
        self.shared.set_state(state);
        self.notify(self.shared.progress(), state, message);
    }

    fn notify(&self, percent: u8, state: OtaState, message: &str) {
        if let Some(observer) = &self.observer {
            observer.on_progress(percent, state, message);
        }
    }

    fn publish_status(&self, message: &str) {
        if let Err(e) = self
            .ports
            .publisher
            .publish(&self.status_topic, message.as_bytes())
        {
            warn!("OTA: status publish failed: {}", e);
        }
    }
}

/// `part * 100 / whole`, clamped to 100.
pub fn percent_of(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = (part as u64).saturating_mul(100) / whole as u64;
    pct.min(100) as u8
}
