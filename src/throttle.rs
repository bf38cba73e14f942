use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::error::Result;

/// Set once the process has been asked to stop. Cheap to clone; every clone
/// observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Shutdown {
        Shutdown::default()
    }

    /// Creates a flag that is raised by SIGINT / SIGTERM.
    pub fn install() -> Result<Shutdown> {
        let shutdown = Shutdown::new();
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, finishing the current recipient");
            flag.request();
        })?;
        Ok(shutdown)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed pause between successful sends.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
}

const SLICE: Duration = Duration::from_millis(50);

impl Throttle {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(interval: Duration) -> Throttle {
        Throttle { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits out the interval. Returns `false` as soon as `shutdown` is
    /// raised, `true` if the full interval elapsed.
    pub fn pause(&self, shutdown: &Shutdown) -> bool {
        let deadline = Instant::now() + self.interval;
        loop {
            if shutdown.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLICE.min(deadline - now));
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Throttle::new(Throttle::DEFAULT_INTERVAL)
    }
}
