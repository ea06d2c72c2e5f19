// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scheduler trace hooks.
//!
//! The [`Scheduler`](crate::scheduler::Scheduler) reports begin frames,
//! actions, draw outcomes, swap acknowledgements and output sink transitions
//! to a [`TraceSink`]. Sinks override only the events they record.
//!
//! Calls go through [`Tracer`], which holds the sink only when the `trace`
//! feature is enabled. Without it, event construction still type-checks but
//! nothing is dispatched.
//!
//! [`FrameSummaryBuilder`] accumulates phase timestamps over one frame and
//! emits a [`FrameSummary`] once its deadline has run.

use crate::scheduler::{Action, DrawResult};
use crate::time::HostTime;
use crate::timing::{BeginFrameArgs, BeginFrameKind};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a frame is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// From sending a main frame to committing its result.
    MainFrameToCommit,
    /// Promoting the pending tree.
    Activate,
    /// Drawing and swapping.
    Draw,
}

/// Output sink lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputSurfaceTransition {
    /// The embedder was asked for a sink.
    CreationRequested,
    /// A sink was bound.
    Initialized,
    /// Binding a sink failed.
    InitializationFailed,
    /// The bound sink was lost.
    Lost,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a begin frame reaches the scheduler.
#[derive(Clone, Copy, Debug)]
pub struct BeginImplFrameEvent {
    /// Source frame index.
    pub frame_index: u64,
    /// Frame start time.
    pub frame_time: HostTime,
    /// Draw deadline.
    pub deadline: HostTime,
    /// On time or missed.
    pub kind: BeginFrameKind,
    /// Whether the scheduler had no use for the frame and dropped it.
    pub dropped: bool,
}

impl BeginImplFrameEvent {
    /// Creates an event from begin-frame arguments.
    #[must_use]
    pub fn new(args: &BeginFrameArgs, dropped: bool) -> Self {
        Self {
            frame_index: args.frame_index,
            frame_time: args.frame_time,
            deadline: args.deadline,
            kind: args.kind,
            dropped,
        }
    }
}

/// Emitted for every action the scheduler performs.
#[derive(Clone, Copy, Debug)]
pub struct ActionEvent {
    /// Scheduler frame number at the time of the action.
    pub frame_number: u64,
    /// The action.
    pub action: Action,
    /// When the action started.
    pub timestamp: HostTime,
}

/// Emitted after every draw attempt.
#[derive(Clone, Copy, Debug)]
pub struct DrawEvent {
    /// Scheduler frame number.
    pub frame_number: u64,
    /// Outcome of the attempt.
    pub result: DrawResult,
    /// Swaps awaiting acknowledgement after the attempt.
    pub pending_swaps: u32,
    /// When the draw finished.
    pub timestamp: HostTime,
}

/// Emitted when a swap is acknowledged.
#[derive(Clone, Copy, Debug)]
pub struct SwapAckEvent {
    /// Swaps still awaiting acknowledgement.
    pub pending_swaps: u32,
    /// When the acknowledgement was processed.
    pub timestamp: HostTime,
}

/// Emitted on output sink lifecycle transitions.
#[derive(Clone, Copy, Debug)]
pub struct OutputSurfaceEvent {
    /// What happened.
    pub transition: OutputSurfaceTransition,
    /// When it happened.
    pub timestamp: HostTime,
}

/// Per-frame timing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct FrameSummary {
    /// Source frame index.
    pub frame_index: u64,
    /// Frame start time.
    pub frame_time: HostTime,
    /// Draw deadline.
    pub deadline: HostTime,
    /// Main-frame-to-commit duration in nanoseconds (0 if not measured).
    pub main_frame_to_commit_ns: u64,
    /// Activation duration in nanoseconds (0 if not measured).
    pub activate_ns: u64,
    /// Draw duration in nanoseconds (0 if not measured).
    pub draw_ns: u64,
    /// Outcome of the frame's draw, if one was attempted.
    pub draw_result: Option<DrawResult>,
    /// Whether the deadline ran later than scheduled.
    pub missed_deadline: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the scheduler.
///
/// Every method defaults to ignoring its event.
pub trait TraceSink {
    /// Called when a begin frame is received.
    fn on_begin_impl_frame(&mut self, e: &BeginImplFrameEvent) {
        _ = e;
    }

    /// Called before an action is performed.
    fn on_action(&mut self, e: &ActionEvent) {
        _ = e;
    }

    /// Called after a draw attempt.
    fn on_draw(&mut self, e: &DrawEvent) {
        _ = e;
    }

    /// Called when a swap is acknowledged.
    fn on_swap_ack(&mut self, e: &SwapAckEvent) {
        _ = e;
    }

    /// Called on output sink lifecycle transitions.
    fn on_output_surface(&mut self, e: &OutputSurfaceEvent) {
        _ = e;
    }

    /// Called with a per-frame timing summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Dispatch handle passed through scheduler calls.
///
/// Holds a sink only with the `trace` feature; otherwise every method is
/// empty.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer for `sink`.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        Self::from_option(Some(sink))
    }

    /// Creates a tracer that dispatches to `sink` when there is one.
    #[inline]
    #[must_use]
    pub fn from_option(sink: Option<&'a mut dyn TraceSink>) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer without a sink.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::from_option(None)
    }

    #[inline]
    fn emit(&mut self, f: impl FnOnce(&mut dyn TraceSink)) {
        #[cfg(feature = "trace")]
        if let Some(sink) = self.sink.as_deref_mut() {
            f(sink);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = f;
        }
    }

    /// Emits a [`BeginImplFrameEvent`].
    #[inline]
    pub fn begin_impl_frame(&mut self, e: &BeginImplFrameEvent) {
        self.emit(|sink| sink.on_begin_impl_frame(e));
    }

    /// Emits an [`ActionEvent`].
    #[inline]
    pub fn action(&mut self, e: &ActionEvent) {
        self.emit(|sink| sink.on_action(e));
    }

    /// Emits a [`DrawEvent`].
    #[inline]
    pub fn draw(&mut self, e: &DrawEvent) {
        self.emit(|sink| sink.on_draw(e));
    }

    /// Emits a [`SwapAckEvent`].
    #[inline]
    pub fn swap_ack(&mut self, e: &SwapAckEvent) {
        self.emit(|sink| sink.on_swap_ack(e));
    }

    /// Emits an [`OutputSurfaceEvent`].
    #[inline]
    pub fn output_surface(&mut self, e: &OutputSurfaceEvent) {
        self.emit(|sink| sink.on_output_surface(e));
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, e: &FrameSummary) {
        self.emit(|sink| sink.on_frame_summary(e));
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Accumulates phase timestamps for one frame.
#[derive(Clone, Debug)]
pub struct FrameSummaryBuilder {
    args: BeginFrameArgs,
    phase_starts: [Option<HostTime>; 3],
    phase_ends: [Option<HostTime>; 3],
    draw_result: Option<DrawResult>,
    missed_deadline: bool,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given begin frame.
    #[must_use]
    pub fn new(args: &BeginFrameArgs) -> Self {
        Self {
            args: *args,
            phase_starts: [None; 3],
            phase_ends: [None; 3],
            draw_result: None,
            missed_deadline: false,
        }
    }

    /// Marks `phase` as started at `t`.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Marks `phase` as finished at `t`.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Records the outcome of the frame's draw.
    pub fn set_draw_result(&mut self, result: DrawResult) {
        self.draw_result = Some(result);
    }

    /// Records whether the deadline ran late.
    pub fn set_missed_deadline(&mut self, missed: bool) {
        self.missed_deadline = missed;
    }

    /// Produces the summary. Phases without both marks report zero.
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.args.frame_index,
            frame_time: self.args.frame_time,
            deadline: self.args.deadline,
            main_frame_to_commit_ns: self.phase_duration(PhaseKind::MainFrameToCommit),
            activate_ns: self.phase_duration(PhaseKind::Activate),
            draw_ns: self.phase_duration(PhaseKind::Draw),
            draw_result: self.draw_result,
            missed_deadline: self.missed_deadline,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let slot = phase_index(phase);
        match (self.phase_starts[slot], self.phase_ends[slot]) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).as_nanos(),
            _ => 0,
        }
    }
}

const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::MainFrameToCommit => 0,
        PhaseKind::Activate => 1,
        PhaseKind::Draw => 2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
