//! OTA controller: the request-side half of the update state machine.
//!
//! `start` validates, counts the attempt, moves to `Downloading` and spawns
//! a worker thread that owns everything else about the attempt. State,
//! progress and counters are atomics, so `state()`/`progress()`/
//! `statistics()` never block on the worker.
//!
//! ```text
//!  dispatcher ──start()──▶ OtaController ──spawn──▶ worker thread
//!       ▲                        │                       │
//!       └──── state()/stats() ◀──┴──── OtaShared ◀───────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::image::AppVersion;
use super::state::{OtaConfig, OtaError, OtaResult, OtaState};
use super::stats::{OtaStatistics, StatsCell};
use super::worker::Worker;
use crate::adapters::time::MonotonicClock;
use crate::app::ports::{FirmwareSource, FlashPort, ProgressObserver, Publisher};
use crate::drivers::task::{spawn_task, OTA_TASK};

/// State visible to both the controller and its worker.
pub(crate) struct OtaShared {
    state: AtomicU8,
    progress: AtomicU8,
    cancel: AtomicBool,
    pub(crate) stats: StatsCell,
}

impl OtaShared {
    fn new(running: AppVersion) -> Self {
        Self {
            state: AtomicU8::new(OtaState::Idle as u8),
            progress: AtomicU8::new(0),
            cancel: AtomicBool::new(false),
            stats: StatsCell::new(running),
        }
    }

    pub(crate) fn state(&self) -> OtaState {
        OtaState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: OtaState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    /// Progress only moves forward within an attempt.
    pub(crate) fn advance_progress(&self, percent: u8) -> u8 {
        let percent = percent.min(100);
        self.progress.fetch_max(percent, Ordering::AcqRel).max(percent)
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Platform collaborators used by every attempt.
#[derive(Clone)]
pub struct OtaPorts {
    pub source: Arc<dyn FirmwareSource>,
    pub flash: Arc<dyn FlashPort>,
    pub publisher: Arc<dyn Publisher>,
}

pub struct OtaController {
    shared: Arc<OtaShared>,
    ports: OtaPorts,
    status_topic: String,
    reboot_grace: Duration,
    clock: MonotonicClock,
    observer: Mutex<Option<Arc<dyn ProgressObserver>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OtaController {
    /// `status_topic` receives human-readable lifecycle messages.
    pub fn new(ports: OtaPorts, status_topic: String, reboot_grace: Duration, clock: MonotonicClock) -> Self {
        let running = ports.flash.running_version();
        info!("OTA: controller ready, running {}", running);
        Self {
            shared: Arc::new(OtaShared::new(running)),
            ports,
            status_topic,
            reboot_grace,
            clock,
            observer: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Register the observer handed to future attempts.
    pub fn set_observer(&self, observer: Arc<dyn ProgressObserver>) {
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Begin an update. Returns once the worker is running; the outcome is
    /// reported on the status topic.
    pub fn start(&self, config: OtaConfig) -> Result<(), OtaError> {
        if self.is_active() {
            warn!("OTA: start rejected, {} in progress", self.state());
            return Err(OtaError::AlreadyActive);
        }
        config.validate()?;
        self.join_previous();

        self.shared.cancel.store(false, Ordering::Release);
        self.shared.progress.store(0, Ordering::Release);
        self.shared.stats.begin_attempt();
        self.shared.set_state(OtaState::Downloading);
        info!("OTA: starting update from {}", config.firmware_url);
        self.publish_status(&format!("OTA update started: {}", config.firmware_url));

        let worker = Worker {
            shared: self.shared.clone(),
            ports: self.ports.clone(),
            observer: self.observer.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            config,
            clock: self.clock,
            status_topic: self.status_topic.clone(),
            reboot_grace: self.reboot_grace,
        };
        match spawn_task(OTA_TASK, move || worker.run()) {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("OTA: worker spawn failed: {}", e);
                let result = OtaResult::MemoryError;
                self.shared.stats.record_failure(result, self.clock.uptime_secs());
                self.shared.set_state(OtaState::Error);
                self.publish_status(&format!("OTA update failed: {} (code {})", result, result.code()));
                Err(OtaError::SpawnFailed)
            }
        }
    }

    /// Ask the running attempt to stop. It ends in `Error` at its next
    /// chunk boundary; `Installing` is past the point of no return.
    pub fn cancel(&self) -> Result<(), OtaError> {
        if !self.is_active() {
            return Err(OtaError::NotActive);
        }
        info!("OTA: cancel requested during {}", self.state());
        self.shared.cancel.store(true, Ordering::Release);
        Ok(())
    }

    pub fn state(&self) -> OtaState {
        self.shared.state()
    }

    pub fn progress(&self) -> u8 {
        self.shared.progress()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn statistics(&self) -> OtaStatistics {
        self.shared.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.shared.stats.reset();
        info!("OTA: statistics reset");
    }

    pub fn running_version(&self) -> AppVersion {
        self.ports.flash.running_version()
    }

    /// Wait for the most recent worker to exit. Returns `false` if none was
    /// running. Never returns after an auto-reboot success.
    pub fn join_worker(&self) -> bool {
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        match handle {
            Some(h) => {
                if h.join().is_err() {
                    error!("OTA: worker panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Wait out the previous attempt's worker. Its state is already
    /// terminal, so this only covers its final notification and status
    /// message, which must land before the next attempt announces itself.
    fn join_previous(&self) {
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(h) = handle {
            if !h.is_finished() {
                debug!("OTA: waiting for previous worker to finish reporting");
            }
            if h.join().is_err() {
                error!("OTA: previous worker panicked");
            }
        }
    }

    fn publish_status(&self, message: &str) {
        if let Err(e) = self.ports.publisher.publish(&self.status_topic, message.as_bytes()) {
            warn!("OTA: status publish failed: {}", e);
        }
    }
}
