// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The impl context.
//!
//! [`ImplSide`] owns the scheduler and the [`LayerTreeHostImpl`] and turns
//! every input (main-side messages, begin-frame signals, sink events) into
//! scheduler inputs followed by one round of scheduled actions. It is the
//! same object in both threading modes; only who calls it differs.

use std::sync::Arc;
use std::time::Duration;

use cadence_core::clock::Clock;
use cadence_core::scheduler::{DrawResult, OutputSurfaceState, Scheduler, SchedulerClient};
use cadence_core::time::HostTime;
use cadence_core::timing::{BeginFrameArgs, FrameSignal};
use cadence_core::trace::{TraceSink, Tracer};
use cadence_render::{FrameAck, OutputSurface, OutputSurfaceClient};
use crossbeam_channel::{Receiver, Select, Sender, never, select};

use super::completion::Signal;
use super::{BeginMainFrameInfo, ImplMessage, MainMessage};
use crate::begin_frame::BeginFrameSource;
use crate::commit::CommitPayload;
use crate::host_impl::LayerTreeHostImpl;
use crate::settings::CompositorSettings;
use crate::thread_role::{self, ThreadRole};

// ---------------------------------------------------------------------------
// Sink events
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum SurfaceEventKind {
    SwapComplete(FrameAck),
    Reclaim(FrameAck),
    Lost,
}

/// A callback from a bound output sink, tagged with its binding.
#[derive(Debug)]
pub(crate) struct SurfaceEvent {
    generation: u64,
    kind: SurfaceEventKind,
}

/// The [`OutputSurfaceClient`] handed to each bound sink.
///
/// Sinks may call it from any thread, so it only forwards.
struct SurfaceClientBridge {
    generation: u64,
    events: Sender<SurfaceEvent>,
}

impl SurfaceClientBridge {
    fn forward(&self, kind: SurfaceEventKind) {
        let event = SurfaceEvent {
            generation: self.generation,
            kind,
        };
        if self.events.send(event).is_err() {
            tracing::trace!(generation = self.generation, "sink event after impl shutdown");
        }
    }
}

impl OutputSurfaceClient for SurfaceClientBridge {
    fn did_swap_buffers_complete(&self, ack: FrameAck) {
        self.forward(SurfaceEventKind::SwapComplete(ack));
    }

    fn reclaim_resources(&self, ack: FrameAck) {
        self.forward(SurfaceEventKind::Reclaim(ack));
    }

    fn did_lose_output_surface(&self) {
        self.forward(SurfaceEventKind::Lost);
    }
}

// ---------------------------------------------------------------------------
// Scheduler client
// ---------------------------------------------------------------------------

/// A commit waiting for the scheduler's `Commit` action.
#[derive(Debug)]
struct PendingCommit {
    payload: CommitPayload,
    hold_for_activation: bool,
    done: Option<Signal>,
}

/// The part of the impl side the scheduler calls back into.
struct ImplState {
    host_impl: LayerTreeHostImpl,
    main: Sender<MainMessage>,
    threaded: bool,
    visible: bool,
    surface_generation: u64,
    queued_surface: Option<Box<dyn OutputSurface>>,
    pending_commit: Option<PendingCommit>,
    held_commit: Option<Signal>,
    committed_since_draw: bool,
    frame_time: HostTime,
}

impl std::fmt::Debug for ImplState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplState")
            .field("host_impl", &self.host_impl)
            .field("threaded", &self.threaded)
            .field("visible", &self.visible)
            .field("surface_generation", &self.surface_generation)
            .field("has_queued_surface", &self.queued_surface.is_some())
            .field("pending_commit", &self.pending_commit)
            .field("holding_commit", &self.held_commit.is_some())
            .finish_non_exhaustive()
    }
}

impl ImplState {
    fn notify_main(&self, message: MainMessage) {
        if self.main.send(message).is_err() {
            tracing::debug!("main side is gone, dropping message");
        }
    }

    fn release_held_commit(&mut self) {
        if let Some(done) = self.held_commit.take() {
            done.signal();
        }
    }

    /// Drops the current binding after loss. Later events from it are
    /// ignored.
    fn drop_lost_surface(&mut self) {
        self.host_impl.lose_output_surface();
        self.surface_generation += 1;
        self.notify_main(MainMessage::DidLoseOutputSurface);
    }
}

impl SchedulerClient for ImplState {
    fn will_begin_impl_frame(&mut self, args: &BeginFrameArgs) {
        self.frame_time = args.frame_time;
    }

    fn scheduled_action_send_begin_main_frame(&mut self, args: &BeginFrameArgs) {
        let info = BeginMainFrameInfo {
            args: *args,
            scroll: self.host_impl.process_scroll_deltas(),
            memory_limits: self.host_impl.limits(),
        };
        self.notify_main(MainMessage::BeginMainFrame(info));
    }

    fn scheduled_action_commit(&mut self) {
        let Some(commit) = self.pending_commit.take() else {
            panic!("commit scheduled without a payload");
        };
        self.host_impl.begin_commit();
        self.host_impl.apply_commit(commit.payload);
        self.host_impl.commit_complete();
        self.committed_since_draw = true;
        let Some(done) = commit.done else {
            return;
        };
        if commit.hold_for_activation && self.threaded && self.visible {
            self.held_commit = Some(done);
        } else {
            done.signal();
        }
    }

    fn scheduled_action_activate_pending_tree(&mut self) {
        self.host_impl.activate_pending_tree();
        self.release_held_commit();
    }

    fn scheduled_action_draw_and_swap_if_possible(&mut self) -> DrawResult {
        let frame = match self.host_impl.prepare_to_draw() {
            Ok(frame) => frame,
            Err(result) => {
                tracing::trace!(?result, "draw aborted");
                return result;
            }
        };
        if !frame.has_damage() {
            return DrawResult::DrewWithoutSwap;
        }
        let frame = self.host_impl.draw_layers(frame, self.frame_time);
        if !self.host_impl.swap_buffers(frame) {
            self.drop_lost_surface();
            return DrawResult::AbortedOutputSurfaceLost;
        }
        if std::mem::take(&mut self.committed_since_draw) {
            self.notify_main(MainMessage::DidCommitAndDrawFrame);
        }
        DrawResult::Swapped
    }

    fn scheduled_action_prepare_tiles(&mut self) {
        self.host_impl.prepare_tiles();
    }

    fn scheduled_action_begin_output_surface_creation(&mut self) {
        // A queued sink is bound once the action has been recorded.
        if self.queued_surface.is_none() {
            self.notify_main(MainMessage::RequestNewOutputSurface);
        }
    }

    fn can_draw(&self) -> bool {
        self.host_impl.can_draw()
    }

    fn ready_to_activate(&self) -> bool {
        self.host_impl.ready_to_activate()
    }
}

// ---------------------------------------------------------------------------
// Impl side
// ---------------------------------------------------------------------------

/// Whether the impl side keeps running after a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// The impl context: scheduler, impl-side trees and the bound sink.
pub(crate) struct ImplSide {
    scheduler: Scheduler,
    state: ImplState,
    trace: Option<Box<dyn TraceSink + Send>>,
    /// Kept alive so it keeps ticking.
    _source: Box<dyn BeginFrameSource>,
    frames: Receiver<FrameSignal>,
    surface_tx: Sender<SurfaceEvent>,
    surface_rx: Receiver<SurfaceEvent>,
    stopped: bool,
}

impl std::fmt::Debug for ImplSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplSide")
            .field("scheduler", &self.scheduler)
            .field("state", &self.state)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl ImplSide {
    pub(crate) fn new(
        settings: CompositorSettings,
        threaded: bool,
        clock: Arc<dyn Clock>,
        mut source: Box<dyn BeginFrameSource>,
        main: Sender<MainMessage>,
    ) -> Self {
        let (surface_tx, surface_rx) = crossbeam_channel::unbounded();
        let frames = source.subscribe();
        Self {
            scheduler: Scheduler::new(settings.scheduler_settings(), Box::new(clock)),
            state: ImplState {
                host_impl: LayerTreeHostImpl::new(settings),
                main,
                threaded,
                visible: false,
                surface_generation: 0,
                queued_surface: None,
                pending_commit: None,
                held_commit: None,
                committed_since_draw: false,
                frame_time: HostTime::default(),
            },
            trace: None,
            _source: source,
            frames,
            surface_tx,
            surface_rx,
            stopped: false,
        }
    }

    pub(crate) fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
        self.trace = Some(sink);
    }

    /// Lets the scheduler begin; the first thing it does is ask for a sink.
    pub(crate) fn start(&mut self) {
        thread_role::debug_assert_role(ThreadRole::Impl);
        self.scheduler.set_can_start();
        self.process();
    }

    /// Runs every scheduled action, binding a queued sink as soon as the
    /// scheduler is ready for one.
    fn process(&mut self) {
        loop {
            let creating = self.with_scheduler(|scheduler, state, tracer| {
                scheduler.process_scheduled_actions(state, tracer);
                scheduler.state().output_surface_state() == OutputSurfaceState::Creating
            });
            if !creating {
                return;
            }
            let Some(surface) = self.state.queued_surface.take() else {
                return;
            };
            self.bind(surface);
        }
    }

    /// Lends out the scheduler together with its client and a tracer.
    fn with_scheduler<R>(
        &mut self,
        f: impl FnOnce(&mut Scheduler, &mut ImplState, &mut Tracer<'_>) -> R,
    ) -> R {
        let Self {
            scheduler,
            state,
            trace,
            ..
        } = self;
        let mut tracer =
            Tracer::from_option(trace.as_deref_mut().map(|s| s as &mut dyn TraceSink));
        f(scheduler, state, &mut tracer)
    }

    fn bind(&mut self, surface: Box<dyn OutputSurface>) {
        debug_assert_eq!(
            self.scheduler.state().output_surface_state(),
            OutputSurfaceState::Creating,
            "binding a sink the scheduler did not ask for"
        );
        self.state.surface_generation += 1;
        let client = SurfaceClientBridge {
            generation: self.state.surface_generation,
            events: self.surface_tx.clone(),
        };
        self.with_scheduler(|scheduler, state, tracer| {
            let capabilities = state
                .host_impl
                .bind_output_surface(surface, Box::new(client));
            match capabilities {
                Some(capabilities) => {
                    scheduler.did_create_and_initialize_output_surface(tracer);
                    scheduler.set_max_pending_swaps(capabilities.max_frames_pending);
                }
                None => scheduler.did_fail_to_initialize_output_surface(tracer),
            }
            state.notify_main(MainMessage::DidInitializeOutputSurface(capabilities));
        });
    }

    /// Handles one message from the main side.
    pub(crate) fn handle(&mut self, message: ImplMessage) -> Flow {
        thread_role::debug_assert_role(ThreadRole::Impl);
        assert!(!self.stopped, "impl side used after stop");
        tracing::trace!(?message, "impl message");
        match message {
            ImplMessage::SetOutputSurface(surface) => self.set_output_surface(surface),
            ImplMessage::ReleaseOutputSurface(done) => {
                self.state.queued_surface = None;
                if self.state.host_impl.has_output_surface() {
                    self.state.host_impl.release_output_surface();
                    self.state.surface_generation += 1;
                    // The main side asked for this; it is not told of a loss.
                    self.with_scheduler(|scheduler, _, tracer| {
                        scheduler.did_lose_output_surface(tracer);
                    });
                }
                done.signal();
            }
            ImplMessage::SetNeedsBeginMainFrame => self.scheduler.set_needs_begin_main_frame(),
            ImplMessage::SetNeedsRedraw(rect) => {
                self.state.host_impl.set_needs_redraw_rect(rect);
                self.scheduler.set_needs_redraw();
            }
            ImplMessage::SetDeferCommits(defer) => self.scheduler.set_defer_commits(defer),
            ImplMessage::SetVisible(visible) => {
                self.state.visible = visible;
                if self.state.host_impl.set_visible(visible) {
                    self.scheduler.set_needs_prepare_tiles();
                }
                self.scheduler.set_visible(visible);
                if visible {
                    self.scheduler.set_needs_redraw();
                } else {
                    // Nothing activates while hidden.
                    self.state.release_held_commit();
                }
            }
            ImplMessage::SetMemoryPolicy(policy) => {
                if self.state.host_impl.set_memory_policy(policy) {
                    self.scheduler.set_needs_prepare_tiles();
                    self.scheduler.set_needs_redraw();
                }
            }
            ImplMessage::ReadyToCommit {
                payload,
                hold_for_activation,
                done,
            } => {
                if hold_for_activation {
                    self.scheduler.set_next_commit_waits_for_activation();
                }
                self.state.pending_commit = Some(PendingCommit {
                    payload,
                    hold_for_activation,
                    done,
                });
                self.scheduler.notify_ready_to_commit();
            }
            ImplMessage::BeginMainFrameAborted(reason) => {
                self.state.host_impl.main_frame_aborted(reason);
                self.scheduler.begin_main_frame_aborted(reason);
            }
            ImplMessage::ScrollBy(layer, delta) => {
                if self.state.host_impl.scroll_by(layer, delta) {
                    self.scheduler.set_needs_redraw();
                    self.scheduler.set_needs_begin_main_frame();
                }
            }
            ImplMessage::PageScaleBy(factor) => {
                if self.state.host_impl.page_scale_by(factor) {
                    self.scheduler.set_needs_redraw();
                    self.scheduler.set_needs_begin_main_frame();
                }
            }
            ImplMessage::Stop(done) => {
                self.teardown();
                done.signal();
                return Flow::Stop;
            }
        }
        self.process();
        Flow::Continue
    }

    fn set_output_surface(&mut self, surface: Box<dyn OutputSurface>) {
        match self.scheduler.state().output_surface_state() {
            OutputSurfaceState::Creating => self.bind(surface),
            OutputSurfaceState::Lost => {
                if self.state.queued_surface.replace(surface).is_some() {
                    tracing::debug!("queued output surface replaced");
                }
            }
            OutputSurfaceState::WaitingForFirstCommit
            | OutputSurfaceState::WaitingForFirstActivation
            | OutputSurfaceState::Active => {
                // Replacing a working sink: the embedder already knows.
                tracing::debug!("replacing the bound output surface");
                self.state.host_impl.release_output_surface();
                self.state.surface_generation += 1;
                self.with_scheduler(|scheduler, _, tracer| {
                    scheduler.did_lose_output_surface(tracer);
                });
                self.state.queued_surface = Some(surface);
            }
        }
    }

    fn did_lose_output_surface(&mut self) {
        self.with_scheduler(|scheduler, state, tracer| {
            scheduler.did_lose_output_surface(tracer);
            state.notify_main(MainMessage::DidLoseOutputSurface);
        });
    }

    /// Handles one begin-frame signal.
    pub(crate) fn on_frame_signal(&mut self, signal: FrameSignal) {
        thread_role::debug_assert_role(ThreadRole::Impl);
        if self.stopped {
            return;
        }
        self.with_scheduler(|scheduler, state, tracer| {
            scheduler.on_frame_signal(signal, state, tracer);
        });
        self.process();
    }

    /// Handles one event from a bound sink.
    pub(crate) fn on_surface_event(&mut self, event: SurfaceEvent) {
        thread_role::debug_assert_role(ThreadRole::Impl);
        if self.stopped {
            return;
        }
        if event.generation != self.state.surface_generation {
            tracing::debug!(
                generation = event.generation,
                current = self.state.surface_generation,
                kind = ?event.kind,
                "ignoring event from a replaced output surface"
            );
            return;
        }
        match event.kind {
            SurfaceEventKind::SwapComplete(ack) => {
                self.with_scheduler(|scheduler, state, tracer| {
                    state.host_impl.reclaim_resources(&ack);
                    scheduler.did_swap_buffers_complete(tracer);
                    state.notify_main(MainMessage::DidCompleteSwapBuffers);
                });
            }
            SurfaceEventKind::Reclaim(ack) => self.state.host_impl.reclaim_resources(&ack),
            SurfaceEventKind::Lost => {
                tracing::debug!(generation = event.generation, "output surface lost");
                self.state.host_impl.lose_output_surface();
                self.state.surface_generation += 1;
                self.did_lose_output_surface();
            }
        }
        self.process();
    }

    /// Handles at most one pending sink event or begin-frame signal.
    /// Returns whether anything was handled.
    pub(crate) fn try_step(&mut self) -> bool {
        if let Ok(event) = self.surface_rx.try_recv() {
            self.on_surface_event(event);
            return true;
        }
        if let Ok(signal) = self.frames.try_recv() {
            self.on_frame_signal(signal);
            return true;
        }
        false
    }

    /// Waits up to `timeout` for a sink event or begin-frame signal.
    pub(crate) fn wait_ready(&self, timeout: Duration) -> bool {
        let mut select = Select::new();
        select.recv(&self.surface_rx);
        select.recv(&self.frames);
        select.ready_timeout(timeout).is_ok()
    }

    /// Runs the impl thread until [`ImplMessage::Stop`] arrives or the main
    /// side disappears.
    pub(crate) fn run(mut self, inbox: &Receiver<ImplMessage>) {
        let _role = thread_role::enter(ThreadRole::Impl);
        tracing::debug!("impl thread running");
        self.start();
        let surface_events = self.surface_rx.clone();
        let mut frames = self.frames.clone();
        loop {
            select! {
                recv(inbox) -> message => match message {
                    Ok(message) => {
                        if self.handle(message) == Flow::Stop {
                            break;
                        }
                    }
                    Err(_) => {
                        tracing::warn!("main side dropped without stopping the impl thread");
                        self.teardown();
                        break;
                    }
                },
                recv(surface_events) -> event => {
                    if let Ok(event) = event {
                        self.on_surface_event(event);
                    }
                }
                recv(frames) -> signal => match signal {
                    Ok(signal) => self.on_frame_signal(signal),
                    Err(_) => {
                        tracing::debug!("begin-frame source disconnected");
                        frames = never();
                    }
                },
            }
        }
        tracing::debug!("impl thread exiting");
    }

    /// Releases the sink and every resource. Idempotent.
    pub(crate) fn teardown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.state.release_held_commit();
        if let Some(commit) = self.state.pending_commit.take()
            && let Some(done) = commit.done
        {
            done.signal();
        }
        self.state.queued_surface = None;
        self.state.host_impl.teardown();
        self.state.surface_generation += 1;
    }
}
