// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host clock.

use std::time::Instant;

use cadence_core::clock::Clock;
use cadence_core::time::HostTime;

/// Reads [`HostTime`] from the process monotonic clock.
///
/// Times are nanoseconds since the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Creates a clock whose zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> HostTime {
        let nanos = self.origin.elapsed().as_nanos();
        HostTime(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Converts a [`Duration`](cadence_core::time::Duration) to the standard
/// library type.
#[must_use]
pub fn to_std(duration: cadence_core::time::Duration) -> std::time::Duration {
    std::time::Duration::from_nanos(duration.as_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_non_decreasing() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first, "monotonic clock should not go backwards");
    }

    #[test]
    fn duration_conversion() {
        let d = cadence_core::time::Duration::from_millis(16);
        assert_eq!(to_std(d), std::time::Duration::from_millis(16));
    }
}
