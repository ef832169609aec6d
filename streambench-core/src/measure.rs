//! Wall-Clock Timing
//!
//! Thin wrappers over `std::time::Instant` returning integer nanoseconds,
//! which is what samples carry over the wire.

use std::time::Duration;

/// Instant used for benchmark timing
#[derive(Debug, Clone, Copy)]
pub struct Instant {
    instant: std::time::Instant,
}

impl Instant {
    /// Capture current instant
    #[inline(always)]
    pub fn now() -> Self {
        Self {
            instant: std::time::Instant::now(),
        }
    }

    /// Compute elapsed time since this instant
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Elapsed time in nanoseconds, saturating at `u64::MAX`
    #[inline(always)]
    pub fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.instant.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Timer for measuring iterations and single invocations
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Nanoseconds since the timer started, without stopping it
    #[inline(always)]
    pub fn elapsed_nanos(&self) -> u64 {
        self.start.elapsed_nanos()
    }

    /// Stop the timer and return elapsed nanoseconds
    #[inline(always)]
    pub fn stop(self) -> u64 {
        self.start.elapsed_nanos()
    }
}
