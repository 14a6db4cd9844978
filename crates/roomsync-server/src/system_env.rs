//! Production environment using the system clock.
//!
//! `SystemEnv` reads the real wall clock and sleeps on Tokio timers, so
//! behavior is not reproducible. Tests use the harness's simulated clock.

use std::time::Duration;

use roomsync_core::Environment;

/// Production environment using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn wall_clock_secs(&self) -> u64 {
        // A clock before 1970 reads as the epoch rather than failing appends
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
