// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Injectable time sources.
//!
//! The scheduler never reads a global timer. It is constructed with a
//! [`Clock`] and asks it for the current [`HostTime`] whenever it needs to
//! measure an action or compare against a frame deadline. Production code
//! passes a wall-clock implementation (the host crate provides one backed by
//! `std::time::Instant`); tests pass a [`ManualClock`] and advance virtual
//! time explicitly.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::time::{Duration, HostTime};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> HostTime;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> HostTime {
        (**self).now()
    }
}

/// A clock whose time only moves when told to.
///
/// Clones share the same timeline, so a test can keep one handle while the
/// scheduler (possibly on another thread) owns another.
#[derive(Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now())
            .finish()
    }
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub fn new(start: HostTime) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start.0)),
        }
    }

    /// Moves time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.0, Ordering::SeqCst);
    }

    /// Jumps to `to`. Moving backwards is ignored.
    pub fn set(&self, to: HostTime) {
        self.nanos.fetch_max(to.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.nanos.load(Ordering::SeqCst))
    }
}
