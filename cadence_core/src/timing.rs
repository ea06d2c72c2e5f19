// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Begin-frame timing signals.
//!
//! A begin-frame source (vsync, a synthetic timer, or a test driver) emits a
//! [`FrameSignal::BeginFrame`] once per display interval, followed later by a
//! [`FrameSignal::Deadline`] for the same frame. The scheduler reacts to the
//! first by starting an impl frame (and possibly asking the main context for
//! a new commit), and to the second by drawing whatever is ready.
//!
//! ```text
//!   frame_time                         deadline         frame_time + interval
//!       │ BeginFrame                       │ Deadline             │
//!       ├──────────────────────────────────┼──────────────────────┤
//!       │ send main frame, commit, activate│ draw + swap          │
//! ```

use crate::time::{Duration, HostTime};

/// Whether a begin frame is current or a catch-up for a missed interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BeginFrameKind {
    /// Delivered on time.
    #[default]
    Normal,
    /// Delivered late, after the source detected a missed interval.
    Missed,
}

/// Timing parameters for one begin frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BeginFrameArgs {
    /// Monotonic sequence number assigned by the source.
    pub frame_index: u64,
    /// Time the frame began; animations should sample at this time.
    pub frame_time: HostTime,
    /// Latest time at which drawing for this frame should start.
    pub deadline: HostTime,
    /// Nominal display interval.
    pub interval: Duration,
    /// Whether this frame is on time.
    pub kind: BeginFrameKind,
}

impl BeginFrameArgs {
    /// Default share of the interval available before the deadline, in
    /// percent.
    pub const DEFAULT_DEADLINE_PERCENT: u64 = 80;

    /// Creates arguments for a frame starting at `frame_time`.
    ///
    /// The deadline is placed at [`DEFAULT_DEADLINE_PERCENT`] of the
    /// interval.
    ///
    /// [`DEFAULT_DEADLINE_PERCENT`]: Self::DEFAULT_DEADLINE_PERCENT
    #[must_use]
    pub const fn new(frame_index: u64, frame_time: HostTime, interval: Duration) -> Self {
        let budget = Duration(interval.0 / 100 * Self::DEFAULT_DEADLINE_PERCENT);
        Self {
            frame_index,
            frame_time,
            deadline: frame_time.saturating_add(budget),
            interval,
            kind: BeginFrameKind::Normal,
        }
    }

    /// Returns a copy marked as a missed (late) frame.
    #[must_use]
    pub const fn missed(mut self) -> Self {
        self.kind = BeginFrameKind::Missed;
        self
    }

    /// Returns the time the next frame is expected to begin.
    #[must_use]
    pub const fn next_frame_time(&self) -> HostTime {
        self.frame_time.saturating_add(self.interval)
    }

    /// Returns whether the arguments are internally consistent.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.interval.is_zero() && self.deadline >= self.frame_time
    }
}

/// A timing signal delivered to the impl side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameSignal {
    /// A new frame begins.
    BeginFrame(BeginFrameArgs),
    /// The draw deadline for `frame_index` has been reached.
    Deadline {
        /// The frame whose deadline fired.
        frame_index: u64,
    },
}
