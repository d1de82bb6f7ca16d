//! ESP-IDF runtime symbol providers for `critical-section` and
//! `embassy-time`, which expect the platform to supply them at link time.
//!
//! The critical section is a process-wide re-entrant lock on top of a std
//! mutex. The time driver reads `esp_timer` and wakes timers from a single
//! `time_wake` thread that sleeps until the earliest deadline.

#[cfg(target_os = "espidf")]
mod imp {
    use core::cell::{Cell, RefCell};
    use core::task::Waker;
    use core::time::Duration;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;
    use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

    static CRITICAL_SECTION_MUTEX: Mutex<()> = Mutex::new(());

    thread_local! {
        static DEPTH: Cell<u8> = const { Cell::new(0) };
        static GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
        DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                let lock = CRITICAL_SECTION_MUTEX
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                GUARD.with(|g| *g.borrow_mut() = Some(lock));
            }
            let next = d.saturating_add(1);
            depth.set(next);
            next
        })
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn _critical_section_1_0_release(_token: u8) {
        DEPTH.with(|depth| match depth.get() {
            0 => {}
            1 => {
                depth.set(0);
                GUARD.with(|g| *g.borrow_mut() = None);
            }
            d => depth.set(d - 1),
        })
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn _embassy_time_now() -> u64 {
        // SAFETY: esp_timer is started by the IDF before app_main.
        unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
    }

    struct Pending {
        at: u64,
        waker: Waker,
    }

    impl PartialEq for Pending {
        fn eq(&self, other: &Self) -> bool {
            self.at == other.at
        }
    }
    impl Eq for Pending {}
    impl PartialOrd for Pending {
        fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for Pending {
        fn cmp(&self, other: &Self) -> core::cmp::Ordering {
            self.at.cmp(&other.at)
        }
    }

    struct WakeQueue {
        heap: Mutex<BinaryHeap<Reverse<Pending>>>,
        cond: Condvar,
    }

    fn wake_queue() -> &'static WakeQueue {
        static QUEUE: OnceLock<WakeQueue> = OnceLock::new();
        QUEUE.get_or_init(|| {
            let spawned = std::thread::Builder::new()
                .name("time_wake".into())
                .stack_size(4 * 1024)
                .spawn(wake_loop);
            if let Err(e) = spawned {
                log::error!("time driver thread spawn failed: {}", e);
            }
            WakeQueue {
                heap: Mutex::new(BinaryHeap::new()),
                cond: Condvar::new(),
            }
        })
    }

    fn wake_loop() {
        let q = wake_queue();
        let mut heap = q.heap.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let now = _embassy_time_now();
            while heap.peek().is_some_and(|Reverse(p)| p.at <= now) {
                if let Some(Reverse(p)) = heap.pop() {
                    p.waker.wake();
                }
            }
            heap = match heap.peek() {
                Some(Reverse(p)) => {
                    let wait = Duration::from_micros(p.at.saturating_sub(now));
                    q.cond
                        .wait_timeout(heap, wait)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => q.cond.wait(heap).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn _embassy_time_schedule_wake(at: u64, waker: *mut core::ffi::c_void) {
        if waker.is_null() {
            return;
        }
        // SAFETY: embassy-time passes a valid `&Waker` for the duration of the call.
        let waker = unsafe { (*(waker as *const Waker)).clone() };
        let q = wake_queue();
        q.heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Reverse(Pending { at, waker }));
        q.cond.notify_one();
    }
}

#[cfg(target_os = "espidf")]
pub use imp::*;
