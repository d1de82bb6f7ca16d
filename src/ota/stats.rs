//! Attempt counters shared between the controller, the worker and readers.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use super::image::AppVersion;
use super::state::OtaResult;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaStatistics {
    pub total_attempts: u32,
    pub successful_updates: u32,
    pub failed_updates: u32,
    /// Uptime seconds at the end of the most recent attempt.
    pub last_attempt_time: u64,
    /// Version of the last successfully installed image.
    pub last_version: AppVersion,
    pub last_result: OtaResult,
}

impl OtaStatistics {
    /// Attempts started but not yet finished.
    pub fn in_flight(&self) -> u32 {
        self.total_attempts
            .saturating_sub(self.successful_updates + self.failed_updates)
    }
}

pub(crate) struct StatsCell {
    total: AtomicU32,
    successful: AtomicU32,
    failed: AtomicU32,
    last_time: AtomicU64,
    last_result: AtomicU8,
    last_version: Mutex<AppVersion>,
}

impl StatsCell {
    /// `running` seeds `last_version` until an update succeeds.
    pub(crate) fn new(running: AppVersion) -> Self {
        Self {
            total: AtomicU32::new(0),
            successful: AtomicU32::new(0),
            failed: AtomicU32::new(0),
            last_time: AtomicU64::new(0),
            last_result: AtomicU8::new(OtaResult::Success as u8),
            last_version: Mutex::new(running),
        }
    }

    pub(crate) fn begin_attempt(&self) {
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_success(&self, version: AppVersion, now_secs: u64) {
        *self.last_version.lock().unwrap_or_else(PoisonError::into_inner) = version;
        self.last_time.store(now_secs, Ordering::Release);
        self.last_result.store(OtaResult::Success as u8, Ordering::Release);
        self.successful.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_failure(&self, result: OtaResult, now_secs: u64) {
        self.last_time.store(now_secs, Ordering::Release);
        self.last_result.store(result as u8, Ordering::Release);
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    /// Zero the counters; the last installed version is kept.
    pub(crate) fn reset(&self) {
        self.total.store(0, Ordering::Release);
        self.successful.store(0, Ordering::Release);
        self.failed.store(0, Ordering::Release);
        self.last_time.store(0, Ordering::Release);
        self.last_result.store(OtaResult::Success as u8, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> OtaStatistics {
        OtaStatistics {
            total_attempts: self.total.load(Ordering::Acquire),
            successful_updates: self.successful.load(Ordering::Acquire),
            failed_updates: self.failed.load(Ordering::Acquire),
            last_attempt_time: self.last_time.load(Ordering::Acquire),
            last_version: *self.last_version.lock().unwrap_or_else(PoisonError::into_inner),
            last_result: OtaResult::from_u8(self.last_result.load(Ordering::Acquire)),
        }
    }
}
