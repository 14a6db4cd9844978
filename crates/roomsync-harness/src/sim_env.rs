//! Simulated environment.
//!
//! The wall clock is a shared counter advanced explicitly by the test, so
//! invite expiry and operation timestamps are reproducible. Sleeping goes
//! through Tokio's timer; tests that need virtual time run with
//! `#[tokio::test(start_paused = true)]`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use roomsync_core::Environment;

/// Default start time: 2024-01-01T00:00:00Z.
pub const DEFAULT_EPOCH_SECS: u64 = 1_704_067_200;

/// Manually driven environment. Clones share one clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    now: Arc<AtomicU64>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::at(DEFAULT_EPOCH_SECS)
    }
}

impl SimEnv {
    /// Environment starting at [`DEFAULT_EPOCH_SECS`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment starting at `secs` past the Unix epoch.
    pub fn at(secs: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(secs)) }
    }

    /// Move the wall clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }

    /// Current wall clock reading.
    pub fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Environment for SimEnv {
    fn wall_clock_secs(&self) -> u64 {
        self.now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
