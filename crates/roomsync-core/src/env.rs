//! Environment abstraction for deterministic testing.
//!
//! Decouples room and log logic from the system clock. Production code uses
//! the real wall clock and Tokio timers; tests drive a manually advanced
//! clock so invite expiry and operation timestamps are reproducible.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `wall_clock_secs()` never goes
/// backwards within a single execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    ///
    /// Used for operation timestamps, invite expiry and event envelopes.
    fn wall_clock_secs(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code (connection loops, maintenance tasks) sleeps; the
    /// state machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
