// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame scheduling for the impl side.
//!
//! The [`Scheduler`] owns a [`SchedulerStateMachine`] and turns begin-frame
//! signals and explicit requests into calls on a [`SchedulerClient`]. It is
//! driven entirely by its caller: every input method only records state, and
//! [`process_scheduled_actions`](Scheduler::process_scheduled_actions) (or
//! one of the frame entry points, which call it) performs whatever became
//! possible.
//!
//! Time is read through an injected [`Clock`], so tests can use a
//! [`ManualClock`](crate::clock::ManualClock) and drive frames
//! deterministically.
//!
//! # Deadlines
//!
//! A begin frame normally waits for its [`FrameSignal::Deadline`] before
//! drawing, so that a main frame sent at the start of the interval can make
//! it into the draw. The deadline runs immediately instead when no main frame
//! is outstanding, or when the estimated main-frame-to-commit time (an
//! exponential moving average) would not fit before the deadline anyway.
//!
//! [`FrameSignal::Deadline`]: crate::timing::FrameSignal::Deadline

mod state_machine;

use alloc::boxed::Box;

pub use state_machine::{
    Action, BeginImplFrameState, CommitEarlyOutReason, CommitState, DrawResult, FramePhase,
    OutputSurfaceState, SchedulerStateMachine,
};

use crate::clock::Clock;
use crate::time::{Duration, HostTime};
use crate::timing::{BeginFrameArgs, FrameSignal};
use crate::trace::{
    ActionEvent, BeginImplFrameEvent, DrawEvent, FrameSummaryBuilder, OutputSurfaceEvent,
    OutputSurfaceTransition, PhaseKind, SwapAckEvent, Tracer,
};

/// Configuration for the [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerSettings {
    /// Whether a committed tree must wait for its content to be prepared
    /// before it may be activated.
    pub impl_side_painting: bool,
    /// Failed draws in a row after which a fresh main frame is requested.
    pub max_consecutive_failed_draws: u32,
    /// EMA smoothing factor for the timing history (0.0–1.0).
    /// Smaller values = more smoothing.
    pub timing_history_alpha: f32,
    /// Safety multiplier applied to the main-frame-to-commit estimate when
    /// deciding whether waiting for the main context is worthwhile.
    pub commit_estimate_multiplier: f32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl SchedulerSettings {
    /// Commits activate as soon as they are made.
    pub const DEFAULT: Self = Self {
        impl_side_painting: false,
        max_consecutive_failed_draws: 3,
        timing_history_alpha: 0.2,
        commit_estimate_multiplier: 1.25,
    };

    /// Activation waits for a prepare-tiles pass after each commit.
    #[must_use]
    pub const fn impl_side_painting() -> Self {
        let mut settings = Self::DEFAULT;
        settings.impl_side_painting = true;
        settings
    }
}

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    fn get(&self) -> Option<f32> {
        self.initialized.then_some(self.value)
    }
}

/// Smoothed durations of recent frames.
#[derive(Clone, Copy, Debug)]
struct TimingHistory {
    draw: Ema,
    main_frame_to_commit: Ema,
}

impl TimingHistory {
    const fn new(alpha: f32) -> Self {
        Self {
            draw: Ema::new(alpha),
            main_frame_to_commit: Ema::new(alpha),
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "frame phase durations are far below f32's exact integer range"
    )]
    fn record(ema: &mut Ema, sample: Duration) {
        ema.update(sample.as_nanos() as f32);
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "EMA of non-negative nanosecond samples fits in u64"
    )]
    fn estimate(ema: &Ema, multiplier: f32) -> Option<Duration> {
        ema.get().map(|v| Duration((v * multiplier) as u64))
    }
}

/// Performs the actions chosen by the [`Scheduler`].
///
/// Implemented by the impl side of a proxy. `can_draw` and
/// `ready_to_activate` are polled before every decision.
pub trait SchedulerClient {
    /// A begin frame is about to be processed.
    fn will_begin_impl_frame(&mut self, args: &BeginFrameArgs) {
        _ = args;
    }

    /// The current begin frame's deadline has completed.
    fn did_finish_impl_frame(&mut self) {}

    /// Ask the main context to produce a frame.
    fn scheduled_action_send_begin_main_frame(&mut self, args: &BeginFrameArgs);

    /// Commit the finished main frame into a pending tree.
    fn scheduled_action_commit(&mut self);

    /// Promote the pending tree to active.
    fn scheduled_action_activate_pending_tree(&mut self);

    /// Tick impl-side animations.
    fn scheduled_action_animate(&mut self) {}

    /// Draw the active tree and swap if possible.
    fn scheduled_action_draw_and_swap_if_possible(&mut self) -> DrawResult;

    /// Update resource priorities (may make the pending tree ready).
    fn scheduled_action_prepare_tiles(&mut self) {}

    /// Ask the embedder for a new output sink.
    fn scheduled_action_begin_output_surface_creation(&mut self);

    /// Whether the active tree can currently produce a frame.
    fn can_draw(&self) -> bool;

    /// Whether the pending tree is ready to be activated.
    fn ready_to_activate(&self) -> bool;
}

/// Impl-side frame scheduler.
pub struct Scheduler {
    settings: SchedulerSettings,
    state: SchedulerStateMachine,
    clock: Box<dyn Clock + Send>,
    timing: TimingHistory,
    current_args: Option<BeginFrameArgs>,
    summary: Option<FrameSummaryBuilder>,
    main_frame_sent_at: Option<HostTime>,
    dropped_begin_frames: u64,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("current_args", &self.current_args)
            .field("dropped_begin_frames", &self.dropped_begin_frames)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler reading time from `clock`.
    #[must_use]
    pub fn new(settings: SchedulerSettings, clock: Box<dyn Clock + Send>) -> Self {
        Self {
            settings,
            state: SchedulerStateMachine::new(settings),
            clock,
            timing: TimingHistory::new(settings.timing_history_alpha),
            current_args: None,
            summary: None,
            main_frame_sent_at: None,
            dropped_begin_frames: 0,
        }
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Returns the decision state.
    #[must_use]
    pub fn state(&self) -> &SchedulerStateMachine {
        &self.state
    }

    /// Returns the coarse conceptual state.
    #[must_use]
    pub fn frame_phase(&self) -> FramePhase {
        self.state.frame_phase()
    }

    /// Returns the number of begin frames dropped because nothing was needed.
    #[must_use]
    pub fn dropped_begin_frames(&self) -> u64 {
        self.dropped_begin_frames
    }

    /// Returns the arguments of the begin frame being processed, if any.
    #[must_use]
    pub fn current_begin_frame_args(&self) -> Option<&BeginFrameArgs> {
        self.current_args.as_ref()
    }

    /// Returns the smoothed draw duration, once at least one draw happened.
    #[must_use]
    pub fn draw_duration_estimate(&self) -> Option<Duration> {
        TimingHistory::estimate(&self.timing.draw, 1.0)
    }

    /// Returns the smoothed main-frame-to-commit duration, once known.
    #[must_use]
    pub fn main_frame_to_commit_estimate(&self) -> Option<Duration> {
        TimingHistory::estimate(&self.timing.main_frame_to_commit, 1.0)
    }

    /// Returns the current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.now()
    }

    // -- Inputs (record only; call `process_scheduled_actions` afterwards) --

    /// Allows the scheduler to begin working.
    pub fn set_can_start(&mut self) {
        self.state.set_can_start();
    }

    /// Updates visibility.
    pub fn set_visible(&mut self, visible: bool) {
        self.state.set_visible(visible);
    }

    /// Requests a draw of the active tree.
    pub fn set_needs_redraw(&mut self) {
        self.state.set_needs_redraw();
    }

    /// Requests an impl-side animation tick.
    pub fn set_needs_animate(&mut self) {
        self.state.set_needs_animate();
    }

    /// Requests a prepare-tiles pass.
    pub fn set_needs_prepare_tiles(&mut self) {
        self.state.set_needs_prepare_tiles();
    }

    /// Requests a main frame.
    pub fn set_needs_begin_main_frame(&mut self) {
        self.state.set_needs_begin_main_frame();
    }

    /// Makes draws wait for the next commit's activation.
    pub fn set_next_commit_waits_for_activation(&mut self) {
        self.state.set_next_commit_waits_for_activation();
    }

    /// Suppresses or resumes sending main frames.
    pub fn set_defer_commits(&mut self, defer: bool) {
        self.state.set_defer_commits(defer);
    }

    /// Updates the swap backpressure limit.
    pub fn set_max_pending_swaps(&mut self, max: u32) {
        self.state.set_max_pending_swaps(max);
    }

    /// The main frame finished; its payload is ready to be committed.
    pub fn notify_ready_to_commit(&mut self) {
        self.state.notify_ready_to_commit();
    }

    /// The main frame ended without a commit.
    pub fn begin_main_frame_aborted(&mut self, reason: CommitEarlyOutReason) {
        self.main_frame_sent_at = None;
        self.state.begin_main_frame_aborted(reason);
    }

    /// A swapped frame was acknowledged.
    pub fn did_swap_buffers_complete(&mut self, tracer: &mut Tracer<'_>) {
        self.state.did_swap_buffers_complete();
        tracer.swap_ack(&SwapAckEvent {
            pending_swaps: self.state.pending_swaps(),
            timestamp: self.clock.now(),
        });
    }

    /// The output sink was lost.
    pub fn did_lose_output_surface(&mut self, tracer: &mut Tracer<'_>) {
        self.state.did_lose_output_surface();
        self.output_surface_event(OutputSurfaceTransition::Lost, tracer);
    }

    /// A new output sink was bound.
    pub fn did_create_and_initialize_output_surface(&mut self, tracer: &mut Tracer<'_>) {
        self.state.did_create_and_initialize_output_surface();
        self.output_surface_event(OutputSurfaceTransition::Initialized, tracer);
    }

    /// Binding an output sink failed. The scheduler keeps waiting for one.
    pub fn did_fail_to_initialize_output_surface(&mut self, tracer: &mut Tracer<'_>) {
        self.output_surface_event(OutputSurfaceTransition::InitializationFailed, tracer);
    }

    // -- Frame entry points --

    /// Dispatches a begin-frame source signal.
    pub fn on_frame_signal(
        &mut self,
        signal: FrameSignal,
        client: &mut dyn SchedulerClient,
        tracer: &mut Tracer<'_>,
    ) {
        match signal {
            FrameSignal::BeginFrame(args) => self.begin_impl_frame(args, client, tracer),
            FrameSignal::Deadline { frame_index } => {
                self.on_begin_impl_frame_deadline(frame_index, client, tracer);
            }
        }
    }

    /// Starts a begin frame.
    ///
    /// If the previous frame's deadline is still pending it runs first.
    /// Frames are dropped (and counted) when nothing needs them.
    pub fn begin_impl_frame(
        &mut self,
        args: BeginFrameArgs,
        client: &mut dyn SchedulerClient,
        tracer: &mut Tracer<'_>,
    ) {
        if self.state.begin_impl_frame_state() == BeginImplFrameState::InsideBeginFrame {
            let missed = true;
            self.run_deadline(missed, client, tracer);
        }

        self.state.set_can_draw(client.can_draw());
        if !args.is_valid() || !self.state.begin_frame_needed() {
            self.dropped_begin_frames += 1;
            tracer.begin_impl_frame(&BeginImplFrameEvent::new(&args, true));
            self.process_scheduled_actions(client, tracer);
            return;
        }

        tracer.begin_impl_frame(&BeginImplFrameEvent::new(&args, false));
        self.current_args = Some(args);
        self.summary = Some(FrameSummaryBuilder::new(&args));
        self.state.on_begin_impl_frame();
        client.will_begin_impl_frame(&args);
        self.process_scheduled_actions(client, tracer);
    }

    /// Runs the deadline of `frame_index`, if that frame is still waiting
    /// for it. Stale deadlines are ignored.
    pub fn on_begin_impl_frame_deadline(
        &mut self,
        frame_index: u64,
        client: &mut dyn SchedulerClient,
        tracer: &mut Tracer<'_>,
    ) {
        if self.state.begin_impl_frame_state() != BeginImplFrameState::InsideBeginFrame {
            return;
        }
        let Some(args) = self.current_args else {
            return;
        };
        if args.frame_index != frame_index {
            return;
        }
        let missed = self.clock.now() > args.deadline.saturating_add(args.interval);
        self.run_deadline(missed, client, tracer);
    }

    /// Performs every action that is currently possible.
    ///
    /// Call after any input method. May run the current frame's deadline
    /// early (see the module docs).
    pub fn process_scheduled_actions(
        &mut self,
        client: &mut dyn SchedulerClient,
        tracer: &mut Tracer<'_>,
    ) {
        self.run_actions(client, tracer);
        if self.deadline_can_run_now() {
            self.run_deadline(false, client, tracer);
        }
    }

    fn deadline_can_run_now(&self) -> bool {
        if self.state.begin_impl_frame_state() != BeginImplFrameState::InsideBeginFrame {
            return false;
        }
        if self.state.should_trigger_deadline_immediately() {
            return true;
        }
        if self.state.commit_state() != CommitState::BeginMainFrameSent {
            return false;
        }
        let (Some(args), Some(sent_at)) = (self.current_args, self.main_frame_sent_at) else {
            return false;
        };
        match TimingHistory::estimate(
            &self.timing.main_frame_to_commit,
            self.settings.commit_estimate_multiplier,
        ) {
            Some(estimate) => sent_at.saturating_add(estimate) > args.deadline,
            None => false,
        }
    }

    fn run_deadline(
        &mut self,
        missed: bool,
        client: &mut dyn SchedulerClient,
        tracer: &mut Tracer<'_>,
    ) {
        self.state.on_begin_impl_frame_deadline();
        self.run_actions(client, tracer);
        self.state.on_begin_impl_frame_idle();
        if let Some(mut summary) = self.summary.take() {
            summary.set_missed_deadline(missed);
            tracer.frame_summary(&summary.finish());
        }
        client.did_finish_impl_frame();
        // Work that must happen between frames (such as output sink creation).
        self.run_actions(client, tracer);
    }

    fn run_actions(&mut self, client: &mut dyn SchedulerClient, tracer: &mut Tracer<'_>) {
        loop {
            self.state.set_can_draw(client.can_draw());
            if self.state.has_pending_tree() && client.ready_to_activate() {
                self.state.notify_ready_to_activate();
            }

            let action = self.state.next_action();
            if action == Action::None {
                break;
            }

            let now = self.clock.now();
            tracer.action(&ActionEvent {
                frame_number: self.state.current_frame_number(),
                action,
                timestamp: now,
            });
            self.state.update_state(action);

            match action {
                Action::None => {}
                Action::SendBeginMainFrame => {
                    let args = self.current_args.unwrap_or_else(|| {
                        BeginFrameArgs::new(0, now, Duration::from_refresh_rate(60.0))
                    });
                    self.main_frame_sent_at = Some(now);
                    if let Some(summary) = &mut self.summary {
                        summary.phase_begin(PhaseKind::MainFrameToCommit, now);
                    }
                    client.scheduled_action_send_begin_main_frame(&args);
                }
                Action::Commit => {
                    if let Some(sent_at) = self.main_frame_sent_at.take() {
                        TimingHistory::record(
                            &mut self.timing.main_frame_to_commit,
                            now.saturating_duration_since(sent_at),
                        );
                    }
                    if let Some(summary) = &mut self.summary {
                        summary.phase_end(PhaseKind::MainFrameToCommit, now);
                    }
                    client.scheduled_action_commit();
                }
                Action::ActivatePendingTree => {
                    client.scheduled_action_activate_pending_tree();
                    if let Some(summary) = &mut self.summary {
                        summary.phase_begin(PhaseKind::Activate, now);
                        summary.phase_end(PhaseKind::Activate, self.clock.now());
                    }
                }
                Action::Animate => client.scheduled_action_animate(),
                Action::DrawAndSwapIfPossible => {
                    let result = client.scheduled_action_draw_and_swap_if_possible();
                    let end = self.clock.now();
                    if result.is_success() {
                        TimingHistory::record(
                            &mut self.timing.draw,
                            end.saturating_duration_since(now),
                        );
                    }
                    self.state.did_draw_if_possible_completed(result);
                    if result == DrawResult::AbortedOutputSurfaceLost {
                        self.output_surface_event(OutputSurfaceTransition::Lost, tracer);
                    }
                    if let Some(summary) = &mut self.summary {
                        summary.phase_begin(PhaseKind::Draw, now);
                        summary.phase_end(PhaseKind::Draw, end);
                        summary.set_draw_result(result);
                    }
                    tracer.draw(&DrawEvent {
                        frame_number: self.state.current_frame_number(),
                        result,
                        pending_swaps: self.state.pending_swaps(),
                        timestamp: end,
                    });
                }
                Action::PrepareTiles => client.scheduled_action_prepare_tiles(),
                Action::BeginOutputSurfaceCreation => {
                    self.output_surface_event(OutputSurfaceTransition::CreationRequested, tracer);
                    client.scheduled_action_begin_output_surface_creation();
                }
            }
        }
    }

    fn output_surface_event(&self, transition: OutputSurfaceTransition, tracer: &mut Tracer<'_>) {
        tracer.output_surface(&OutputSurfaceEvent {
            transition,
            timestamp: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::clock::ManualClock;

    /// Records every action and completes main frames on demand.
    #[derive(Default)]
    struct FakeClient {
        actions: Vec<Action>,
        can_draw: bool,
        ready_to_activate: bool,
        draw_result: Option<DrawResult>,
        main_frames: Vec<u64>,
        finished_frames: u32,
    }

    impl FakeClient {
        fn new() -> Self {
            Self {
                can_draw: true,
                ready_to_activate: true,
                ..Default::default()
            }
        }

        fn count(&self, action: Action) -> usize {
            self.actions.iter().filter(|&&a| a == action).count()
        }
    }

    impl SchedulerClient for FakeClient {
        fn did_finish_impl_frame(&mut self) {
            self.finished_frames += 1;
        }

        fn scheduled_action_send_begin_main_frame(&mut self, args: &BeginFrameArgs) {
            self.actions.push(Action::SendBeginMainFrame);
            self.main_frames.push(args.frame_index);
        }

        fn scheduled_action_commit(&mut self) {
            self.actions.push(Action::Commit);
        }

        fn scheduled_action_activate_pending_tree(&mut self) {
            self.actions.push(Action::ActivatePendingTree);
        }

        fn scheduled_action_draw_and_swap_if_possible(&mut self) -> DrawResult {
            self.actions.push(Action::DrawAndSwapIfPossible);
            self.draw_result.unwrap_or(DrawResult::Swapped)
        }

        fn scheduled_action_prepare_tiles(&mut self) {
            self.actions.push(Action::PrepareTiles);
        }

        fn scheduled_action_begin_output_surface_creation(&mut self) {
            self.actions.push(Action::BeginOutputSurfaceCreation);
        }

        fn can_draw(&self) -> bool {
            self.can_draw
        }

        fn ready_to_activate(&self) -> bool {
            self.ready_to_activate
        }
    }

    const INTERVAL: Duration = Duration(16_000_000);

    fn make_scheduler(clock: &ManualClock) -> Scheduler {
        Scheduler::new(SchedulerSettings::DEFAULT, Box::new(clock.clone()))
    }

    fn make_args(frame_index: u64, clock: &ManualClock) -> BeginFrameArgs {
        BeginFrameArgs::new(frame_index, clock.now(), INTERVAL)
    }

    /// Starts the scheduler and binds an output sink.
    fn make_running(clock: &ManualClock, client: &mut FakeClient) -> Scheduler {
        let mut scheduler = make_scheduler(clock);
        let mut tracer = Tracer::none();
        scheduler.set_can_start();
        scheduler.set_visible(true);
        scheduler.process_scheduled_actions(client, &mut tracer);
        assert_eq!(client.actions, [Action::BeginOutputSurfaceCreation]);
        scheduler.did_create_and_initialize_output_surface(&mut tracer);
        client.actions.clear();
        scheduler
    }

    #[test]
    fn unneeded_begin_frames_are_dropped() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        scheduler.begin_impl_frame(make_args(2, &clock), &mut client, &mut tracer);
        assert_eq!(scheduler.dropped_begin_frames(), 2);
        assert!(client.actions.is_empty());
    }

    #[test]
    fn commit_then_draw_in_one_frame() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        assert_eq!(client.actions, [Action::SendBeginMainFrame]);
        assert_eq!(scheduler.frame_phase(), FramePhase::CommitPending);

        clock.advance(Duration::from_millis(4));
        scheduler.notify_ready_to_commit();
        scheduler.process_scheduled_actions(&mut client, &mut tracer);

        // Commit, activation, and the now-early deadline's draw.
        assert_eq!(
            client.actions,
            [
                Action::SendBeginMainFrame,
                Action::Commit,
                Action::ActivatePendingTree,
                Action::DrawAndSwapIfPossible,
            ]
        );
        assert_eq!(client.finished_frames, 1);
        assert_eq!(
            scheduler.main_frame_to_commit_estimate(),
            Some(Duration::from_millis(4))
        );
        assert_eq!(scheduler.state().pending_swaps(), 1);
    }

    #[test]
    fn redraw_only_frame_draws_immediately() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        // Get an active tree first.
        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        scheduler.notify_ready_to_commit();
        scheduler.process_scheduled_actions(&mut client, &mut tracer);
        scheduler.did_swap_buffers_complete(&mut tracer);
        client.actions.clear();

        scheduler.set_needs_redraw();
        scheduler.begin_impl_frame(make_args(2, &clock), &mut client, &mut tracer);
        assert_eq!(client.actions, [Action::DrawAndSwapIfPossible]);
    }

    #[test]
    fn deadline_signal_draws_without_commit() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        // Main frame is slow; the deadline fires first and finds nothing to draw.
        scheduler.on_frame_signal(
            FrameSignal::Deadline { frame_index: 1 },
            &mut client,
            &mut tracer,
        );
        assert_eq!(client.finished_frames, 1);
        assert_eq!(client.count(Action::DrawAndSwapIfPossible), 0);

        // A stale deadline is ignored.
        scheduler.on_frame_signal(
            FrameSignal::Deadline { frame_index: 1 },
            &mut client,
            &mut tracer,
        );
        assert_eq!(client.finished_frames, 1);

        // The commit lands between frames and is drawn on the next one.
        scheduler.notify_ready_to_commit();
        scheduler.process_scheduled_actions(&mut client, &mut tracer);
        assert_eq!(client.count(Action::ActivatePendingTree), 1);
        scheduler.begin_impl_frame(make_args(2, &clock), &mut client, &mut tracer);
        assert_eq!(client.count(Action::DrawAndSwapIfPossible), 1);
    }

    #[test]
    fn pending_deadline_runs_before_next_begin_frame() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        clock.advance(INTERVAL);
        scheduler.begin_impl_frame(make_args(2, &clock), &mut client, &mut tracer);
        assert_eq!(client.finished_frames, 1);
    }

    #[test]
    fn slow_main_frames_trigger_deadline_early() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        // Teach the history that commits take longer than a frame.
        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        clock.advance(Duration::from_millis(30));
        scheduler.notify_ready_to_commit();
        scheduler.process_scheduled_actions(&mut client, &mut tracer);
        scheduler.did_swap_buffers_complete(&mut tracer);
        let finished = client.finished_frames;

        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(2, &clock), &mut client, &mut tracer);
        assert_eq!(scheduler.state().commit_state(), CommitState::BeginMainFrameSent);
        assert_eq!(client.finished_frames, finished + 1);
    }

    #[test]
    fn lost_surface_requests_new_one_between_frames() {
        let clock = ManualClock::new(HostTime(0));
        let mut client = FakeClient::new();
        let mut scheduler = make_running(&clock, &mut client);
        let mut tracer = Tracer::none();

        scheduler.set_needs_begin_main_frame();
        scheduler.begin_impl_frame(make_args(1, &clock), &mut client, &mut tracer);
        scheduler.notify_ready_to_commit();
        client.draw_result = Some(DrawResult::AbortedOutputSurfaceLost);
        scheduler.process_scheduled_actions(&mut client, &mut tracer);

        assert_eq!(scheduler.frame_phase(), FramePhase::OutputSurfaceLost);
        assert_eq!(client.count(Action::BeginOutputSurfaceCreation), 1);
        assert!(scheduler.state().redraw_pending());
    }
}
