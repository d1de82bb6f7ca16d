//! FreeRTOS-backed thread spawning with explicit priority and stack size.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::Builder::spawn`
//! creates a FreeRTOS task with the requested priority and stack. On
//! non-ESP targets, falls back to a plain named thread.
//!
//! # ESP-IDF Threading Model
//!
//! ESP-IDF implements `std::thread` via pthreads, which are thin wrappers
//! around FreeRTOS tasks. `esp_pthread_set_cfg()` sets thread-local
//! configuration that applies to the *next* `pthread_create()` call from
//! the calling thread, so the config→spawn pair must not be interleaved
//! with other thread creation on the same thread.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Scheduling parameters for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Null-terminated on target (e.g. `"cmd_handler\0"`).
    pub name: &'static str,
    pub priority: u8,
    pub stack_kb: usize,
}

/// Command dispatcher: sole executor of command side effects.
pub const DISPATCHER_TASK: TaskSpec = TaskSpec {
    name: "cmd_handler\0",
    priority: 4,
    stack_kb: 6,
};

/// OTA worker: spawned per attempt, above the dispatcher.
pub const OTA_TASK: TaskSpec = TaskSpec {
    name: "ota_task\0",
    priority: 5,
    stack_kb: 8,
};

/// Periodic data/status reporter.
pub const REPORTER_TASK: TaskSpec = TaskSpec {
    name: "reporter\0",
    priority: 5,
    stack_kb: 6,
};

/// Soil probe sampler.
pub const SAMPLER_TASK: TaskSpec = TaskSpec {
    name: "sensor_task\0",
    priority: 5,
    stack_kb: 4,
};

impl TaskSpec {
    pub fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Spawn `f` as a task with `spec`'s priority and stack.
///
/// Fails instead of panicking when the allocator cannot provide the stack,
/// so callers can surface it as a resource error.
#[cfg(target_os = "espidf")]
pub fn spawn_task(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: the default config is plain data; `thread_name` points at a
    // 'static null-terminated string.
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.prio = spec.priority as i32;
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
        }
    }

    log::info!(
        "Spawning '{}' (pri={}, stack={}KB)",
        spec.display_name(),
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
}

/// Simulation fallback; priority is ignored.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_task(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    log::debug!(
        "Spawning '{}' (sim, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    // Host stacks get extra headroom for debug builds and test harness frames.
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb.max(64) * 1024)
        .spawn(f)
}

/// A long-running loop with a cooperative stop flag.
///
/// The body receives the flag and is expected to check it at each poll
/// boundary. Dropping the handle requests a stop without waiting.
pub struct StoppableTask {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StoppableTask {
    pub fn spawn(
        spec: TaskSpec,
        body: impl FnOnce(Arc<AtomicBool>) + Send + 'static,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = spawn_task(spec, move || body(flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop and wait for the loop to exit.
    pub fn shutdown(mut self) {
        self.request_stop();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!("task panicked before shutdown");
            }
        }
    }
}

impl Drop for StoppableTask {
    fn drop(&mut self) {
        self.request_stop();
    }
}
