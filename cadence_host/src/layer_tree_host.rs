// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The main-thread side of the compositor.
//!
//! [`LayerTreeHost`] owns the embedder's [`LayerStore`] and turns requests
//! for work into main frames. A main frame runs when the impl side sends a
//! begin-main-frame message and the embedder pumps
//! [`process_messages`](LayerTreeHost::process_messages):
//!
//! ```text
//!   apply impl scroll/scale ─► will_begin_main_frame ─► animate
//!        ─► update_layers ─► (nothing to commit? abort) ─► commit ─► did_commit
//! ```
//!
//! Requests are staged. [`set_needs_animate`](LayerTreeHost::set_needs_animate)
//! runs a frame that may end without a commit, while
//! [`set_needs_commit`](LayerTreeHost::set_needs_commit) always ends in one.
//! A request made before the frame it belongs to has started never asks for
//! a second frame; it raises the stage of the one already on its way.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cadence_core::clock::Clock;
use cadence_core::layer::{LayerId, LayerStore};
use cadence_core::memory::{MemoryPolicy, TileMemoryLimits};
use cadence_core::output::RendererCapabilities;
use cadence_core::scheduler::CommitEarlyOutReason;
use cadence_core::time::HostTime;
use cadence_core::timing::BeginFrameArgs;
use cadence_core::trace::TraceSink;
use cadence_render::{OutputSurface, ReleaseCallback, TextureMailbox};
use kurbo::{Rect, Vec2};

use crate::begin_frame::BeginFrameSource;
use crate::commit::{CommitPayload, PendingTextures, TextureUpdate};
use crate::error::HostResult;
use crate::host_impl::ScrollAndScaleSet;
use crate::proxy::completion::completion;
use crate::proxy::{
    BeginMainFrameInfo, ImplMessage, ImplSide, MainMessage, Proxy, SingleThreadProxy,
    ThreadedProxy,
};
use crate::settings::{CompositorSettings, ThreadingMode};
use crate::thread_role::{self, ThreadRole};

// ---------------------------------------------------------------------------
// Embedder callbacks
// ---------------------------------------------------------------------------

/// Callbacks from [`LayerTreeHost`] to the embedder.
///
/// Every callback runs on the main thread from inside
/// [`LayerTreeHost::process_messages`], never reentrantly from another
/// host call.
pub trait LayerTreeHostClient {
    /// A main frame is starting.
    fn will_begin_main_frame(&mut self, args: &BeginFrameArgs) {
        _ = args;
    }

    /// Scroll and page-scale changes made on the impl side since the last
    /// main frame. They have already been applied to the layer store.
    fn apply_scroll_and_scale(&mut self, changes: &ScrollAndScaleSet) {
        _ = changes;
    }

    /// Advances main-side animations to `frame_time`.
    fn animate(&mut self, frame_time: HostTime) {
        _ = frame_time;
    }

    /// Brings the layer tree up to date for this frame.
    fn update_layers(&mut self, update: &mut LayerTreeUpdate<'_>) {
        _ = update;
    }

    /// A main frame was committed to the impl side.
    fn did_commit(&mut self) {}

    /// The first frame drawn after a commit was swapped.
    fn did_commit_and_draw_frame(&mut self) {}

    /// The output surface acknowledged a swap.
    fn did_complete_swap_buffers(&mut self) {}

    /// A main frame ended without a commit.
    fn did_abort_main_frame(&mut self, reason: CommitEarlyOutReason) {
        _ = reason;
    }

    /// The compositor needs an output surface.
    ///
    /// `fallback` is set when an earlier surface failed to initialize; an
    /// embedder may then offer something more conservative. Returning `None`
    /// means a surface will arrive later through
    /// [`LayerTreeHost::set_output_surface`].
    fn create_output_surface(&mut self, fallback: bool) -> Option<Box<dyn OutputSurface>>;

    /// Reports whether the last offered surface could be bound.
    fn did_initialize_output_surface(&mut self, success: bool) {
        _ = success;
    }

    /// Every initialization attempt failed; the compositor will not ask for
    /// a surface again until one is offered.
    fn did_fail_to_initialize_output_surface(&mut self) {}

    /// The bound surface was lost. A replacement will be requested.
    fn did_lose_output_surface(&mut self) {}
}

/// What [`LayerTreeHostClient::update_layers`] may change.
pub struct LayerTreeUpdate<'a> {
    layers: &'a mut LayerStore,
    textures: &'a mut PendingTextures,
    memory_limits: TileMemoryLimits,
    frame_time: HostTime,
    needs_commit: bool,
}

impl fmt::Debug for LayerTreeUpdate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerTreeUpdate")
            .field("memory_limits", &self.memory_limits)
            .field("frame_time", &self.frame_time)
            .field("needs_commit", &self.needs_commit)
            .finish_non_exhaustive()
    }
}

impl LayerTreeUpdate<'_> {
    /// Returns the layer store.
    #[must_use]
    pub fn layers(&self) -> &LayerStore {
        self.layers
    }

    /// Returns the layer store for mutation.
    pub fn layers_mut(&mut self) -> &mut LayerStore {
        self.layers
    }

    /// Attaches a texture to `layer`, to be sent with this frame's commit.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not alive.
    pub fn set_texture(&mut self, layer: LayerId, texture: TextureMailbox, release: ReleaseCallback) {
        set_texture(self.layers, self.textures, layer, texture, release);
    }

    /// Detaches the texture of `layer`.
    pub fn clear_texture(&mut self, layer: LayerId) {
        clear_texture(self.layers, self.textures, layer);
    }

    /// Memory limits the impl side is working under.
    #[must_use]
    pub fn memory_limits(&self) -> TileMemoryLimits {
        self.memory_limits
    }

    /// Frame time of the main frame being built.
    #[must_use]
    pub fn frame_time(&self) -> HostTime {
        self.frame_time
    }

    /// Makes this frame commit even if nothing changed.
    pub fn set_needs_commit(&mut self) {
        self.needs_commit = true;
    }
}

#[track_caller]
fn set_texture(
    layers: &LayerStore,
    textures: &mut PendingTextures,
    layer: LayerId,
    texture: TextureMailbox,
    release: ReleaseCallback,
) {
    assert!(layers.is_alive(layer), "texture attached to a dead layer");
    textures.set(layer, TextureUpdate::Set(texture, release));
}

#[track_caller]
fn clear_texture(layers: &LayerStore, textures: &mut PendingTextures, layer: LayerId) {
    assert!(layers.is_alive(layer), "texture cleared on a dead layer");
    textures.set(layer, TextureUpdate::Clear);
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// How far a requested main frame has to go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PipelineStage {
    None,
    Animate,
    UpdateLayers,
    Commit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Running,
    Stopped,
}

/// The main-thread compositor host.
///
/// Construct it, build the layer tree through [`layers_mut`](Self::layers_mut),
/// then [`start`](Self::start) it and pump
/// [`process_messages`](Self::process_messages) from the embedder's event
/// loop.
pub struct LayerTreeHost<C: LayerTreeHostClient> {
    client: C,
    settings: CompositorSettings,
    threading: ThreadingMode,
    proxy: Box<dyn Proxy>,
    layers: LayerStore,
    textures: PendingTextures,
    lifecycle: Lifecycle,
    requested_stage: PipelineStage,
    visible: bool,
    defer_commits: bool,
    next_commit_waits_for_activation: bool,
    source_frame_number: u64,
    renderer_capabilities: Option<RendererCapabilities>,
    output_surface_lost: bool,
    output_surface_attempts: u32,
}

impl<C: LayerTreeHostClient> fmt::Debug for LayerTreeHost<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerTreeHost")
            .field("threading", &self.threading)
            .field("proxy", &self.proxy)
            .field("lifecycle", &self.lifecycle)
            .field("requested_stage", &self.requested_stage)
            .field("visible", &self.visible)
            .field("defer_commits", &self.defer_commits)
            .field("source_frame_number", &self.source_frame_number)
            .field("output_surface_lost", &self.output_surface_lost)
            .finish_non_exhaustive()
    }
}

impl<C: LayerTreeHostClient> LayerTreeHost<C> {
    /// Creates a stopped host.
    ///
    /// The impl side ticks from `source` and reads time from `clock`.
    #[must_use]
    pub fn new(
        settings: CompositorSettings,
        threading: ThreadingMode,
        client: C,
        source: Box<dyn BeginFrameSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (main_tx, main_rx) = crossbeam_channel::unbounded();
        let threaded = threading == ThreadingMode::Threaded;
        let impl_side = ImplSide::new(settings, threaded, clock, source, main_tx);
        let proxy: Box<dyn Proxy> = match threading {
            ThreadingMode::SingleThreaded => Box::new(SingleThreadProxy::new(impl_side, main_rx)),
            ThreadingMode::Threaded => Box::new(ThreadedProxy::new(impl_side, main_rx)),
        };
        Self::with_proxy(settings, threading, client, proxy)
    }

    pub(crate) fn with_proxy(
        settings: CompositorSettings,
        threading: ThreadingMode,
        client: C,
        proxy: Box<dyn Proxy>,
    ) -> Self {
        Self {
            client,
            settings,
            threading,
            proxy,
            layers: LayerStore::new(),
            textures: PendingTextures::default(),
            lifecycle: Lifecycle::NotStarted,
            requested_stage: PipelineStage::None,
            visible: false,
            defer_commits: false,
            next_commit_waits_for_activation: false,
            source_frame_number: 0,
            renderer_capabilities: None,
            output_surface_lost: true,
            output_surface_attempts: 0,
        }
    }

    /// Routes scheduler trace events to `sink`.
    ///
    /// # Panics
    ///
    /// Panics if the host was already started.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink + Send>) -> Self {
        assert_eq!(
            self.lifecycle,
            Lifecycle::NotStarted,
            "trace sink installed after start"
        );
        self.proxy.set_trace_sink(sink);
        self
    }

    /// Starts the impl side. Its first action is to ask for an output
    /// surface.
    ///
    /// # Panics
    ///
    /// Panics if the host was already started.
    pub fn start(&mut self) -> HostResult<()> {
        thread_role::debug_assert_role(ThreadRole::Main);
        assert_eq!(self.lifecycle, Lifecycle::NotStarted, "host started twice");
        self.proxy.start()?;
        self.lifecycle = Lifecycle::Running;
        tracing::debug!(threading = ?self.threading, "layer tree host started");
        if self.requested_stage != PipelineStage::None {
            self.proxy.send(ImplMessage::SetNeedsBeginMainFrame);
        }
        Ok(())
    }

    /// Stops the impl side, releasing the output surface and every texture.
    /// Idempotent.
    pub fn stop(&mut self) {
        if self.lifecycle == Lifecycle::Stopped {
            return;
        }
        self.lifecycle = Lifecycle::Stopped;
        self.proxy.stop();
        self.textures.release_all();
        self.renderer_capabilities = None;
        tracing::debug!(source_frame_number = self.source_frame_number, "layer tree host stopped");
    }

    #[track_caller]
    fn debug_assert_running(&self) {
        thread_role::debug_assert_role(ThreadRole::Main);
        debug_assert_eq!(self.lifecycle, Lifecycle::Running, "host is not running");
    }

    /// Intents may be recorded before `start`, but not after `stop`.
    #[track_caller]
    fn debug_assert_not_stopped(&self) {
        thread_role::debug_assert_role(ThreadRole::Main);
        debug_assert_ne!(self.lifecycle, Lifecycle::Stopped, "host used after stop");
    }

    // -- Accessors --

    /// Returns the embedder client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the embedder client for mutation.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Returns the layer store.
    #[must_use]
    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// Returns the layer store for mutation.
    ///
    /// Changes are picked up by the next commit; call
    /// [`set_needs_commit`](Self::set_needs_commit) to schedule one.
    pub fn layers_mut(&mut self) -> &mut LayerStore {
        &mut self.layers
    }

    /// Returns the settings the host was created with.
    #[must_use]
    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Returns the threading mode.
    #[must_use]
    pub fn threading_mode(&self) -> ThreadingMode {
        self.threading
    }

    /// Returns the number of commits made so far.
    #[must_use]
    pub fn source_frame_number(&self) -> u64 {
        self.source_frame_number
    }

    /// Returns whether the host is visible.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns the capabilities of the bound output surface, if any.
    #[must_use]
    pub fn renderer_capabilities(&self) -> Option<RendererCapabilities> {
        self.renderer_capabilities
    }

    /// Returns whether a main frame that ends in a commit has been
    /// requested.
    #[must_use]
    pub fn commit_requested(&self) -> bool {
        self.requested_stage == PipelineStage::Commit
    }

    /// Returns whether any main frame has been requested.
    #[must_use]
    pub fn begin_main_frame_requested(&self) -> bool {
        self.requested_stage != PipelineStage::None
    }

    // -- Textures --

    /// Attaches a texture to `layer` for the next commit.
    ///
    /// `release` runs exactly once: when the texture is replaced before it
    /// was committed, when the compositor no longer needs it, or at stop.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not alive.
    pub fn set_texture(&mut self, layer: LayerId, texture: TextureMailbox, release: ReleaseCallback) {
        set_texture(&self.layers, &mut self.textures, layer, texture, release);
    }

    /// Detaches the texture of `layer` at the next commit.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not alive.
    pub fn clear_texture(&mut self, layer: LayerId) {
        clear_texture(&self.layers, &mut self.textures, layer);
    }

    // -- Requests --

    #[track_caller]
    fn request(&mut self, stage: PipelineStage) {
        self.debug_assert_not_stopped();
        if stage <= self.requested_stage {
            return;
        }
        let first = self.requested_stage == PipelineStage::None;
        self.requested_stage = stage;
        if first && self.lifecycle == Lifecycle::Running {
            self.proxy.send(ImplMessage::SetNeedsBeginMainFrame);
        }
    }

    /// Requests a main frame that ends in a commit.
    pub fn set_needs_commit(&mut self) {
        self.request(PipelineStage::Commit);
    }

    /// Requests a main frame that runs animations; it commits only if they
    /// changed the tree.
    pub fn set_needs_animate(&mut self) {
        self.request(PipelineStage::Animate);
    }

    /// Requests a main frame that runs `update_layers`; it commits only if
    /// that changed the tree.
    pub fn set_needs_update_layers(&mut self) {
        self.request(PipelineStage::UpdateLayers);
    }

    /// Asks the impl side to redraw `damage` without a commit.
    pub fn set_needs_redraw(&mut self, damage: Rect) {
        self.debug_assert_running();
        self.proxy.send(ImplMessage::SetNeedsRedraw(damage));
    }

    /// Makes the next commit return only once its tree is active.
    pub fn set_next_commit_waits_for_activation(&mut self) {
        self.debug_assert_not_stopped();
        self.next_commit_waits_for_activation = true;
    }

    /// Holds main frames back while `defer` is set.
    pub fn set_defer_commits(&mut self, defer: bool) {
        self.debug_assert_running();
        if self.defer_commits == defer {
            return;
        }
        self.defer_commits = defer;
        self.proxy.send(ImplMessage::SetDeferCommits(defer));
    }

    /// Shows or hides the compositor. Nothing is drawn while hidden.
    pub fn set_visible(&mut self, visible: bool) {
        self.debug_assert_running();
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.proxy.send(ImplMessage::SetVisible(visible));
    }

    /// Replaces the memory policy.
    pub fn set_memory_policy(&mut self, policy: MemoryPolicy) {
        self.debug_assert_running();
        self.proxy.send(ImplMessage::SetMemoryPolicy(policy));
    }

    /// Scrolls `layer` on the impl side. The delta reaches the layer store
    /// at the next main frame.
    pub fn scroll_by(&mut self, layer: LayerId, delta: Vec2) {
        self.debug_assert_running();
        self.proxy.send(ImplMessage::ScrollBy(layer, delta));
    }

    /// Multiplies the page scale on the impl side.
    pub fn page_scale_by(&mut self, factor: f64) {
        self.debug_assert_running();
        self.proxy.send(ImplMessage::PageScaleBy(factor));
    }

    // -- Output surface --

    /// Offers an output surface. It is bound as soon as the compositor is
    /// ready for one, replacing any surface bound now.
    pub fn set_output_surface(&mut self, surface: Box<dyn OutputSurface>) {
        self.debug_assert_running();
        self.output_surface_attempts = 0;
        self.proxy.send(ImplMessage::SetOutputSurface(surface));
    }

    /// Unbinds the output surface and waits until the impl side has let go
    /// of it. A new one is requested afterwards.
    pub fn release_output_surface(&mut self) -> HostResult<()> {
        self.debug_assert_running();
        let (signal, done) = completion();
        self.proxy.send(ImplMessage::ReleaseOutputSurface(signal));
        done.wait()?;
        self.output_surface_lost = true;
        self.renderer_capabilities = None;
        Ok(())
    }

    // -- Message pump --

    /// Handles every message the impl side has queued. In single-threaded
    /// mode this is also where impl-side work runs.
    ///
    /// Returns the number of messages handled.
    pub fn process_messages(&mut self) -> usize {
        self.debug_assert_running();
        let mut handled = 0;
        while self.lifecycle == Lifecycle::Running
            && let Some(message) = self.proxy.poll()
        {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Like [`process_messages`](Self::process_messages), but first waits up
    /// to `timeout` for a message to arrive.
    pub fn process_messages_timeout(&mut self, timeout: Duration) -> usize {
        self.debug_assert_running();
        let Some(first) = self.proxy.wait(timeout) else {
            return 0;
        };
        self.handle(first);
        1 + self.process_messages()
    }

    fn handle(&mut self, message: MainMessage) {
        match message {
            MainMessage::BeginMainFrame(info) => self.begin_main_frame(info),
            MainMessage::RequestNewOutputSurface => self.create_output_surface(),
            MainMessage::DidInitializeOutputSurface(capabilities) => {
                self.did_initialize_output_surface(capabilities);
            }
            MainMessage::DidLoseOutputSurface => {
                tracing::debug!("output surface lost");
                self.output_surface_lost = true;
                self.renderer_capabilities = None;
                self.output_surface_attempts = 0;
                self.client.did_lose_output_surface();
            }
            MainMessage::DidCommitAndDrawFrame => self.client.did_commit_and_draw_frame(),
            MainMessage::DidCompleteSwapBuffers => self.client.did_complete_swap_buffers(),
        }
    }

    fn create_output_surface(&mut self) {
        let fallback = self.output_surface_attempts > 0;
        match self.client.create_output_surface(fallback) {
            Some(surface) => self.proxy.send(ImplMessage::SetOutputSurface(surface)),
            None => tracing::debug!(fallback, "embedder will offer an output surface later"),
        }
    }

    fn did_initialize_output_surface(&mut self, capabilities: Option<RendererCapabilities>) {
        if let Some(capabilities) = capabilities {
            tracing::debug!(?capabilities, "output surface initialized");
            self.output_surface_attempts = 0;
            self.output_surface_lost = false;
            self.renderer_capabilities = Some(capabilities);
            self.client.did_initialize_output_surface(true);
            self.set_needs_commit();
            return;
        }
        self.output_surface_attempts += 1;
        self.client.did_initialize_output_surface(false);
        if self.output_surface_attempts >= self.settings.max_output_surface_init_attempts {
            tracing::warn!(
                attempts = self.output_surface_attempts,
                "giving up on output surface initialization"
            );
            self.client.did_fail_to_initialize_output_surface();
        } else {
            tracing::debug!(
                attempts = self.output_surface_attempts,
                "output surface failed to initialize, retrying"
            );
            self.create_output_surface();
        }
    }

    // -- Main frame --

    fn abort_main_frame(&mut self, stage: PipelineStage, reason: CommitEarlyOutReason) {
        tracing::trace!(?reason, "main frame aborted");
        if reason.retries() {
            // The impl side asks again; the request must survive until then.
            self.requested_stage = self.requested_stage.max(stage);
        }
        self.proxy.send(ImplMessage::BeginMainFrameAborted(reason));
        self.client.did_abort_main_frame(reason);
    }

    fn begin_main_frame(&mut self, info: BeginMainFrameInfo) {
        let requested = std::mem::replace(&mut self.requested_stage, PipelineStage::None);
        // A frame nobody on this side asked for was started by the impl
        // side, which always wants a commit.
        let stage = if requested == PipelineStage::None {
            PipelineStage::Commit
        } else {
            requested
        };

        if !self.visible {
            self.abort_main_frame(stage, CommitEarlyOutReason::AbortedNotVisible);
            return;
        }
        if self.defer_commits {
            self.abort_main_frame(stage, CommitEarlyOutReason::AbortedDeferredCommit);
            return;
        }
        if self.output_surface_lost {
            self.abort_main_frame(stage, CommitEarlyOutReason::AbortedOutputSurfaceLost);
            return;
        }

        self.apply_scroll_and_scale(&info.scroll);
        self.client.will_begin_main_frame(&info.args);
        self.client.animate(info.args.frame_time);

        let mut update = LayerTreeUpdate {
            layers: &mut self.layers,
            textures: &mut self.textures,
            memory_limits: info.memory_limits,
            frame_time: info.args.frame_time,
            needs_commit: false,
        };
        self.client.update_layers(&mut update);
        let stage = if update.needs_commit {
            PipelineStage::Commit
        } else {
            stage
        };

        let source_frame_number = self.source_frame_number + 1;
        let changes = self.layers.take_changes();
        let mut payload = CommitPayload::from_changes(&self.layers, &changes, source_frame_number);
        self.textures.drain_into(&self.layers, &mut payload);
        if stage < PipelineStage::Commit && payload.is_empty() {
            self.abort_main_frame(stage, CommitEarlyOutReason::FinishedNoUpdates);
            return;
        }
        self.commit(payload);
    }

    fn apply_scroll_and_scale(&mut self, changes: &ScrollAndScaleSet) {
        if changes.is_empty() {
            return;
        }
        for scroll in &changes.scrolls {
            // The layer may have been destroyed since the impl side scrolled.
            if self.layers.is_alive(scroll.layer) {
                let offset = self.layers.scroll_offset(scroll.layer);
                self.layers.set_scroll_offset(scroll.layer, offset + scroll.delta);
            }
        }
        if changes.page_scale_delta != 1.0 {
            let scale = f64::from(self.layers.tree_properties().page_scale_factor);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "page scale factors are stored as f32"
            )]
            self.layers
                .set_page_scale_factor((scale * changes.page_scale_delta) as f32);
        }
        self.client.apply_scroll_and_scale(changes);
    }

    /// Hands `payload` to the impl side. A commit that waits for activation
    /// holds back draws in both modes; only the threaded proxy also blocks
    /// this thread until activation.
    fn commit(&mut self, payload: CommitPayload) {
        let source_frame_number = payload.source_frame_number;
        let hold_for_activation = std::mem::take(&mut self.next_commit_waits_for_activation);
        tracing::trace!(
            source_frame_number,
            added = payload.added.len(),
            updated = payload.updated.len(),
            removed = payload.removed.len(),
            textures = payload.textures.len(),
            hold_for_activation,
            "commit"
        );
        if let Err(error) = self.proxy.commit(payload, hold_for_activation) {
            tracing::warn!(%error, "commit did not complete");
            return;
        }
        self.source_frame_number = source_frame_number;
        self.client.did_commit();
    }
}

impl<C: LayerTreeHostClient> Drop for LayerTreeHost<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use cadence_core::clock::ManualClock;
    use cadence_core::scheduler::Action;
    use cadence_core::trace::ActionEvent;
    use cadence_core::time::Duration as FrameDuration;
    use cadence_render::{Mailbox, QuadMaterial};
    use kurbo::Size;

    use super::*;
    use crate::begin_frame::{ManualBeginFrameSource, ManualFrameDriver};
    use crate::output::{FakeOutputHandle, FakeOutputSurface};

    const FRAME: FrameDuration = FrameDuration::from_millis(16);
    const FULL: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Event {
        BeginMainFrame,
        ApplyScroll,
        Animate,
        UpdateLayers,
        Commit,
        CommitAndDraw,
        SwapComplete,
        Aborted(CommitEarlyOutReason),
        CreateSurface { fallback: bool },
        Initialized(bool),
        GaveUp,
        Lost,
    }

    type UpdateHook = Box<dyn FnMut(&mut LayerTreeUpdate<'_>)>;

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        surfaces: VecDeque<Box<dyn OutputSurface>>,
        on_update: Option<UpdateHook>,
    }

    impl Recorder {
        fn with_surfaces(surfaces: Vec<Box<dyn OutputSurface>>) -> Self {
            Self {
                surfaces: surfaces.into(),
                ..Self::default()
            }
        }
    }

    impl LayerTreeHostClient for Recorder {
        fn will_begin_main_frame(&mut self, _args: &BeginFrameArgs) {
            self.events.push(Event::BeginMainFrame);
        }

        fn apply_scroll_and_scale(&mut self, _changes: &ScrollAndScaleSet) {
            self.events.push(Event::ApplyScroll);
        }

        fn animate(&mut self, _frame_time: HostTime) {
            self.events.push(Event::Animate);
        }

        fn update_layers(&mut self, update: &mut LayerTreeUpdate<'_>) {
            self.events.push(Event::UpdateLayers);
            if let Some(hook) = &mut self.on_update {
                hook(update);
            }
        }

        fn did_commit(&mut self) {
            self.events.push(Event::Commit);
        }

        fn did_commit_and_draw_frame(&mut self) {
            self.events.push(Event::CommitAndDraw);
        }

        fn did_complete_swap_buffers(&mut self) {
            self.events.push(Event::SwapComplete);
        }

        fn did_abort_main_frame(&mut self, reason: CommitEarlyOutReason) {
            self.events.push(Event::Aborted(reason));
        }

        fn create_output_surface(&mut self, fallback: bool) -> Option<Box<dyn OutputSurface>> {
            self.events.push(Event::CreateSurface { fallback });
            self.surfaces.pop_front()
        }

        fn did_initialize_output_surface(&mut self, success: bool) {
            self.events.push(Event::Initialized(success));
        }

        fn did_fail_to_initialize_output_surface(&mut self) {
            self.events.push(Event::GaveUp);
        }

        fn did_lose_output_surface(&mut self) {
            self.events.push(Event::Lost);
        }
    }

    /// A started, visible host with a 100x100 root and a 10x10 child that
    /// draws content.
    struct Pipeline {
        host: LayerTreeHost<Recorder>,
        driver: ManualFrameDriver,
        clock: ManualClock,
        root: LayerId,
        child: LayerId,
    }

    impl Pipeline {
        fn new(
            settings: CompositorSettings,
            threading: ThreadingMode,
            surfaces: Vec<Box<dyn OutputSurface>>,
        ) -> Self {
            Self::build(settings, threading, surfaces, None)
        }

        fn build(
            settings: CompositorSettings,
            threading: ThreadingMode,
            surfaces: Vec<Box<dyn OutputSurface>>,
            trace: Option<Box<dyn TraceSink + Send>>,
        ) -> Self {
            let clock = ManualClock::new(HostTime(0));
            let shared: Arc<dyn Clock> = Arc::new(clock.clone());
            let (source, driver) = ManualBeginFrameSource::new(Arc::clone(&shared), FRAME);
            let mut host = LayerTreeHost::new(
                settings,
                threading,
                Recorder::with_surfaces(surfaces),
                Box::new(source),
                shared,
            );
            if let Some(sink) = trace {
                host = host.with_trace_sink(sink);
            }
            Self::assemble(host, clock, driver)
        }

        /// Builds the two-layer tree on `host`, then starts and shows it.
        fn assemble(
            mut host: LayerTreeHost<Recorder>,
            clock: ManualClock,
            driver: ManualFrameDriver,
        ) -> Self {
            _ = tracing_subscriber::fmt().with_test_writer().try_init();
            let layers = host.layers_mut();
            let root = layers.create_layer();
            let child = layers.create_layer();
            layers.set_root(Some(root));
            layers.add_child(root, child);
            layers.set_bounds(root, Size::new(100.0, 100.0));
            layers.set_bounds(child, Size::new(10.0, 10.0));
            layers.set_draws_content(child, true);
            layers.set_viewport_size(Size::new(100.0, 100.0));
            host.set_needs_commit();

            host.start().expect("host starts");
            host.set_visible(true);
            let mut pipeline = Self {
                host,
                driver,
                clock,
                root,
                child,
            };
            if pipeline.host.threading_mode() == ThreadingMode::SingleThreaded {
                pipeline.host.process_messages();
            }
            pipeline
        }

        fn single(surfaces: Vec<Box<dyn OutputSurface>>) -> Self {
            Self::new(CompositorSettings::DEFAULT, ThreadingMode::SingleThreaded, surfaces)
        }

        /// Runs one begin frame and its deadline, then handles everything
        /// that follows from it.
        fn frame(&mut self) {
            self.clock.advance(FRAME);
            self.driver.tick();
            self.host.process_messages();
        }

        /// Ticks frames until `done` holds. For the threaded host.
        fn run_until(&mut self, done: impl Fn(&Self) -> bool) {
            for _ in 0..500 {
                if done(self) {
                    return;
                }
                self.threaded_frame();
            }
            panic!("condition not reached");
        }

        /// Ticks `count` frames on the threaded host.
        fn run_frames(&mut self, count: usize) {
            for _ in 0..count {
                self.threaded_frame();
            }
        }

        fn threaded_frame(&mut self) {
            self.clock.advance(FRAME);
            self.driver.tick();
            self.host
                .process_messages_timeout(Duration::from_millis(10));
        }

        fn events(&mut self) -> Vec<Event> {
            std::mem::take(&mut self.host.client_mut().events)
        }
    }

    fn fake() -> (Box<dyn OutputSurface>, FakeOutputHandle) {
        let (surface, handle) = FakeOutputSurface::new();
        (Box::new(surface), handle)
    }

    fn counting_release(counter: &Arc<AtomicU32>) -> ReleaseCallback {
        let counter = Arc::clone(counter);
        Box::new(move |_, lost| {
            assert!(!lost, "nothing is lost in these tests");
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn first_frame_commits_and_draws() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        assert_eq!(
            p.events(),
            [Event::CreateSurface { fallback: false }, Event::Initialized(true)]
        );
        assert!(handle.is_bound());
        assert!(p.host.renderer_capabilities().is_some());

        p.frame();
        assert_eq!(
            p.events(),
            [
                Event::BeginMainFrame,
                Event::Animate,
                Event::UpdateLayers,
                Event::Commit,
                Event::CommitAndDraw,
                Event::SwapComplete,
            ]
        );
        assert_eq!(p.host.source_frame_number(), 1);
        assert!(!p.host.begin_main_frame_requested());
        let frame = handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, FULL);
        assert_eq!(frame.root_pass().quads.len(), 1);
        assert_eq!(frame.root_pass().quads[0].layer, p.child);
        assert_eq!(
            handle.reshapes().last(),
            Some(&(Size::new(100.0, 100.0), 1.0))
        );
    }

    #[test]
    fn animate_without_changes_finishes_without_commit() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.events();

        p.host.set_needs_animate();
        assert!(p.host.begin_main_frame_requested());
        assert!(!p.host.commit_requested());
        p.frame();
        assert_eq!(
            p.events(),
            [
                Event::BeginMainFrame,
                Event::Animate,
                Event::UpdateLayers,
                Event::Aborted(CommitEarlyOutReason::FinishedNoUpdates),
            ]
        );
        assert_eq!(p.host.source_frame_number(), 1);
        assert_eq!(handle.frame_count(), 1);
    }

    #[test]
    fn layer_updates_commit_and_damage_only_the_changed_layer() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();

        let child = p.child;
        p.host.client_mut().on_update = Some(Box::new(move |update: &mut LayerTreeUpdate<'_>| {
            update.layers_mut().set_opacity(child, 0.5);
        }));
        p.host.set_needs_update_layers();
        p.frame();
        assert_eq!(p.host.source_frame_number(), 2);
        assert_eq!(handle.frame_count(), 2);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!((frame.root_pass().quads[0].opacity - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn update_context_can_force_a_commit() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();

        p.host.client_mut().on_update = Some(Box::new(|update: &mut LayerTreeUpdate<'_>| {
            update.set_needs_commit();
        }));
        p.host.set_needs_animate();
        p.frame();
        assert_eq!(p.host.source_frame_number(), 2);
    }

    #[test]
    fn requests_before_the_frame_starts_share_one_main_frame() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.events();

        p.host.set_needs_animate();
        p.host.set_needs_update_layers();
        p.host.set_needs_commit();
        p.host.set_needs_commit();
        p.host.set_needs_animate();
        assert!(p.host.commit_requested());
        p.frame();
        p.frame();
        let events = p.events();
        let count = |event: Event| events.iter().filter(|e| **e == event).count();
        assert_eq!(count(Event::BeginMainFrame), 1);
        assert_eq!(count(Event::Commit), 1);
        assert_eq!(p.host.source_frame_number(), 2);
        assert!(!p.host.commit_requested());
    }

    #[test]
    fn hidden_host_runs_no_main_frames() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.events();

        p.host.set_visible(false);
        p.host.set_needs_commit();
        p.frame();
        p.frame();
        assert!(p.events().is_empty());
        assert!(p.host.commit_requested());

        p.host.set_visible(true);
        p.frame();
        assert!(p.events().contains(&Event::Commit));
        assert_eq!(p.host.source_frame_number(), 2);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, FULL);
    }

    #[test]
    fn showing_again_redraws_without_a_commit() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.events();

        p.host.set_visible(false);
        p.frame();
        p.host.set_visible(true);
        p.frame();
        assert_eq!(handle.frame_count(), 2);

        p.host.set_needs_redraw(Rect::new(0.0, 0.0, 10.0, 10.0));
        p.frame();
        assert_eq!(handle.frame_count(), 3);
        assert!(!p.events().contains(&Event::BeginMainFrame));
        assert_eq!(p.host.source_frame_number(), 1);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn zero_viewport_skips_the_swap_until_resized() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();

        p.host.layers_mut().set_viewport_size(Size::ZERO);
        p.host.set_needs_commit();
        p.frame();
        assert_eq!(p.host.source_frame_number(), 2);
        assert_eq!(handle.frame_count(), 1);

        p.host.layers_mut().set_viewport_size(Size::new(100.0, 100.0));
        p.host.set_needs_commit();
        p.frame();
        assert_eq!(handle.frame_count(), 2);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, FULL);
    }

    #[test]
    fn zero_viewport_requests_no_further_commits() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();

        p.host.layers_mut().set_viewport_size(Size::ZERO);
        p.host.set_needs_commit();
        p.frame();
        p.events();
        for _ in 0..12 {
            p.frame();
        }
        let events = p.events();
        assert!(!events.contains(&Event::BeginMainFrame), "{events:?}");
        assert_eq!(p.host.source_frame_number(), 2);
        assert_eq!(handle.frame_count(), 1);
    }

    #[test]
    fn out_of_memory_tree_activates_and_later_commits_land() {
        let mut settings = CompositorSettings::impl_side_painting();
        // 10x10x4 = 400 bytes never fit.
        settings.initial_memory_policy = MemoryPolicy::with_visible_bytes(100);
        let (surface, handle) = fake();
        let released = Arc::new(AtomicU32::new(0));
        let mut p = Pipeline::new(settings, ThreadingMode::SingleThreaded, vec![surface]);
        let child = p.child;
        p.host.set_texture(
            child,
            TextureMailbox::gpu(Mailbox(1), Size::new(10.0, 10.0)),
            counting_release(&released),
        );
        for _ in 0..3 {
            p.frame();
        }
        assert_eq!(p.host.source_frame_number(), 1);
        let drawn = handle.frame_count();
        assert!(drawn >= 1, "the over-budget tree was never drawn");
        let frame = handle.last_frame().expect("a frame was swapped");
        assert!(frame.resources().is_empty());
        assert!(matches!(
            frame.root_pass().quads[0].material,
            QuadMaterial::SolidColor(_)
        ));

        p.host.layers_mut().set_opacity(child, 0.5);
        p.host.set_needs_commit();
        for _ in 0..3 {
            p.frame();
        }
        assert_eq!(p.host.source_frame_number(), 2);
        assert!(handle.frame_count() > drawn);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert!((frame.root_pass().quads[0].opacity - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn deferred_commits_wait_until_released() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.events();

        p.host.set_defer_commits(true);
        p.host.set_needs_commit();
        p.frame();
        assert!(!p.events().contains(&Event::BeginMainFrame));

        p.host.set_defer_commits(false);
        p.frame();
        assert!(p.events().contains(&Event::Commit));
        assert_eq!(p.host.source_frame_number(), 2);
    }

    #[test]
    fn lost_surface_is_replaced_and_redrawn() {
        let (first, first_handle) = fake();
        let (second, second_handle) = fake();
        let mut p = Pipeline::single(vec![first, second]);
        p.frame();
        p.events();

        first_handle.lose_context();
        p.host.process_messages();
        assert_eq!(
            p.events(),
            [
                Event::Lost,
                Event::CreateSurface { fallback: false },
                Event::Initialized(true),
            ]
        );
        assert!(first_handle.is_released());
        assert!(second_handle.is_bound());

        p.frame();
        assert!(p.events().contains(&Event::Commit));
        assert_eq!(second_handle.frame_count(), 1);
        let frame = second_handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, FULL);
    }

    #[test]
    fn failed_swap_loses_the_surface() {
        let (first, first_handle) = FakeOutputSurface::new();
        let (second, second_handle) = fake();
        let mut p = Pipeline::single(vec![Box::new(first.lose_on_swap(2)), second]);
        p.frame();
        p.events();

        p.host.set_needs_redraw(FULL);
        p.frame();
        assert_eq!(first_handle.swap_count(), 2);
        assert_eq!(first_handle.frame_count(), 1);
        assert_eq!(
            p.events(),
            [
                Event::Lost,
                Event::CreateSurface { fallback: false },
                Event::Initialized(true),
            ]
        );

        p.frame();
        assert_eq!(second_handle.frame_count(), 1);
    }

    #[test]
    fn failed_initialization_falls_back_then_gives_up() {
        let mut settings = CompositorSettings::DEFAULT;
        settings.max_output_surface_init_attempts = 2;
        let (first, _) = FakeOutputSurface::failing();
        let (second, _) = FakeOutputSurface::failing();
        let mut p = Pipeline::new(
            settings,
            ThreadingMode::SingleThreaded,
            vec![Box::new(first), Box::new(second)],
        );
        assert_eq!(
            p.events(),
            [
                Event::CreateSurface { fallback: false },
                Event::Initialized(false),
                Event::CreateSurface { fallback: true },
                Event::Initialized(false),
                Event::GaveUp,
            ]
        );
        assert!(p.host.renderer_capabilities().is_none());

        let (surface, handle) = fake();
        p.host.set_output_surface(surface);
        p.host.process_messages();
        assert_eq!(p.events(), [Event::Initialized(true)]);
        p.frame();
        assert_eq!(handle.frame_count(), 1);
    }

    #[test]
    fn released_surface_is_not_reported_lost() {
        let (first, first_handle) = fake();
        let (second, second_handle) = fake();
        let mut p = Pipeline::single(vec![first, second]);
        p.frame();
        p.events();

        p.host.release_output_surface().expect("impl side is alive");
        assert!(first_handle.is_released());
        assert!(p.host.renderer_capabilities().is_none());
        p.host.process_messages();
        assert_eq!(
            p.events(),
            [Event::CreateSurface { fallback: false }, Event::Initialized(true)]
        );
        p.frame();
        assert_eq!(second_handle.frame_count(), 1);
    }

    #[test]
    fn unacknowledged_swaps_throttle_drawing() {
        let (surface, handle) = FakeOutputSurface::new();
        let surface = surface.with_max_frames_pending(1).manual_acks();
        let mut p = Pipeline::single(vec![Box::new(surface)]);
        p.frame();
        assert_eq!(handle.pending_acks(), 1);
        assert!(!p.events().contains(&Event::SwapComplete));

        p.host.set_needs_redraw(FULL);
        p.frame();
        assert_eq!(handle.frame_count(), 1, "throttled while a swap is pending");

        assert!(handle.ack_next());
        p.host.process_messages();
        assert!(p.events().contains(&Event::SwapComplete));
        p.frame();
        assert_eq!(handle.frame_count(), 2);
    }

    #[test]
    fn replaced_texture_is_released_after_its_frame_returns() {
        let (surface, handle) = fake();
        let released = Arc::new(AtomicU32::new(0));
        let mut p = Pipeline::single(vec![surface]);
        let child = p.child;
        p.host.set_texture(
            child,
            TextureMailbox::gpu(Mailbox(1), Size::new(8.0, 8.0)),
            counting_release(&released),
        );
        p.frame();
        let frame = handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.resources().len(), 1);
        assert!(matches!(
            frame.root_pass().quads[0].material,
            QuadMaterial::Texture { .. }
        ));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        p.host.set_texture(
            child,
            TextureMailbox::gpu(Mailbox(2), Size::new(8.0, 8.0)),
            counting_release(&released),
        );
        p.host.set_needs_commit();
        p.frame();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(handle.frame_count(), 2);

        p.host.stop();
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn impl_side_scroll_reaches_the_layer_store() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.events();

        let child = p.child;
        p.host.scroll_by(child, Vec2::new(0.0, 5.0));
        p.frame();
        let events = p.events();
        assert!(events.contains(&Event::ApplyScroll));
        assert!(events.contains(&Event::Commit));
        assert_eq!(p.host.layers().scroll_offset(child), Vec2::new(0.0, 5.0));
    }

    #[derive(Clone, Default)]
    struct ActionLog(Arc<parking_lot::Mutex<Vec<Action>>>);

    impl TraceSink for ActionLog {
        fn on_action(&mut self, e: &ActionEvent) {
            self.0.lock().push(e.action);
        }
    }

    #[test]
    fn trace_sink_sees_the_scheduler_actions_in_order() {
        let (surface, _handle) = fake();
        let log = ActionLog::default();
        let mut p = Pipeline::build(
            CompositorSettings::DEFAULT,
            ThreadingMode::SingleThreaded,
            vec![surface],
            Some(Box::new(log.clone())),
        );
        p.frame();
        let actions = log.0.lock().clone();
        let position = |action: Action| {
            actions
                .iter()
                .position(|a| *a == action)
                .unwrap_or_else(|| panic!("{action:?} never ran"))
        };
        let order = [
            Action::BeginOutputSurfaceCreation,
            Action::SendBeginMainFrame,
            Action::Commit,
            Action::ActivatePendingTree,
            Action::DrawAndSwapIfPossible,
        ]
        .map(position);
        assert!(order.is_sorted(), "actions ran out of order: {actions:?}");
    }

    #[test]
    fn stop_releases_the_surface_and_is_idempotent() {
        let (surface, handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.frame();
        p.host.stop();
        assert!(handle.is_released());
        p.host.stop();
    }

    #[test]
    #[should_panic(expected = "host started twice")]
    fn starting_twice_panics() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        let _ = p.host.start();
    }

    #[test]
    #[should_panic(expected = "texture attached to a dead layer")]
    fn texture_on_a_destroyed_layer_panics() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        let child = p.child;
        p.host.layers_mut().destroy_layer(child);
        p.host.set_texture(
            child,
            TextureMailbox::gpu(Mailbox(1), Size::new(8.0, 8.0)),
            Box::new(|_, _| {}),
        );
    }

    #[test]
    fn threaded_host_commits_draws_and_stops() {
        let (surface, handle) = fake();
        let mut p = Pipeline::new(
            CompositorSettings::DEFAULT,
            ThreadingMode::Threaded,
            vec![surface],
        );
        p.run_until(|p| p.host.client().events.contains(&Event::SwapComplete));
        assert_eq!(p.host.source_frame_number(), 1);
        assert!(handle.frame_count() >= 1);

        p.host.set_next_commit_waits_for_activation();
        p.host.set_needs_commit();
        p.run_until(|p| p.host.source_frame_number() == 2);

        drop(p);
        assert!(handle.is_released());
    }

    #[test]
    fn threaded_root_is_the_only_undrawn_layer() {
        let (surface, handle) = fake();
        let mut p = Pipeline::new(
            CompositorSettings::DEFAULT,
            ThreadingMode::Threaded,
            vec![surface],
        );
        p.run_until(|_| handle.frame_count() >= 1);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert!(frame.root_pass().quads.iter().all(|q| q.layer != p.root));
    }

    /// Records the activation hold of every commit on its way to the impl
    /// side.
    #[derive(Debug)]
    struct CommitSpy {
        inner: Box<dyn Proxy>,
        holds: Arc<parking_lot::Mutex<Vec<bool>>>,
    }

    impl Proxy for CommitSpy {
        fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
            self.inner.set_trace_sink(sink);
        }

        fn start(&mut self) -> HostResult<()> {
            self.inner.start()
        }

        fn send(&mut self, message: ImplMessage) {
            self.inner.send(message);
        }

        fn commit(&mut self, payload: CommitPayload, hold_for_activation: bool) -> HostResult<()> {
            self.holds.lock().push(hold_for_activation);
            self.inner.commit(payload, hold_for_activation)
        }

        fn poll(&mut self) -> Option<MainMessage> {
            self.inner.poll()
        }

        fn wait(&mut self, timeout: Duration) -> Option<MainMessage> {
            self.inner.wait(timeout)
        }

        fn stop(&mut self) {
            self.inner.stop();
        }
    }

    #[test]
    fn single_threaded_commit_keeps_the_activation_hold() {
        let settings = CompositorSettings::DEFAULT;
        let clock = ManualClock::new(HostTime(0));
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let (source, driver) = ManualBeginFrameSource::new(Arc::clone(&shared), FRAME);
        let (main_tx, main_rx) = crossbeam_channel::unbounded();
        let impl_side = ImplSide::new(settings, false, shared, Box::new(source), main_tx);
        let holds: Arc<parking_lot::Mutex<Vec<bool>>> = Arc::default();
        let proxy = CommitSpy {
            inner: Box::new(SingleThreadProxy::new(impl_side, main_rx)),
            holds: Arc::clone(&holds),
        };
        let (surface, handle) = fake();
        let host = LayerTreeHost::with_proxy(
            settings,
            ThreadingMode::SingleThreaded,
            Recorder::with_surfaces(vec![surface]),
            Box::new(proxy),
        );
        let mut p = Pipeline::assemble(host, clock, driver);
        p.frame();

        let child = p.child;
        p.host.set_next_commit_waits_for_activation();
        p.host.layers_mut().set_opacity(child, 0.5);
        p.host.set_needs_commit();
        p.frame();
        assert_eq!(*holds.lock(), [false, true]);
        assert_eq!(p.host.source_frame_number(), 2);
        assert_eq!(handle.frame_count(), 2);
        let frame = handle.last_frame().expect("a frame was swapped");
        assert!((frame.root_pass().quads[0].opacity - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "host used after stop")]
    fn commit_request_after_stop_panics() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.host.stop();
        p.host.set_needs_commit();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "host used after stop")]
    fn activation_hold_after_stop_panics() {
        let (surface, _handle) = fake();
        let mut p = Pipeline::single(vec![surface]);
        p.host.stop();
        p.host.set_next_commit_waits_for_activation();
    }

    fn threaded(surfaces: Vec<Box<dyn OutputSurface>>) -> Pipeline {
        Pipeline::new(CompositorSettings::DEFAULT, ThreadingMode::Threaded, surfaces)
    }

    #[test]
    fn threaded_lost_surface_is_replaced_and_redrawn() {
        let (first, first_handle) = fake();
        let (second, second_handle) = fake();
        let mut p = threaded(vec![first, second]);
        p.run_until(|_| first_handle.frame_count() >= 1);
        p.events();

        first_handle.lose_context();
        p.run_until(|_| second_handle.frame_count() >= 1);
        let events = p.events();
        assert!(events.contains(&Event::Lost));
        assert!(events.contains(&Event::CreateSurface { fallback: false }));
        assert!(first_handle.is_released());
        let frame = second_handle.last_frame().expect("a frame was swapped");
        assert_eq!(frame.root_pass().damage_rect, FULL);
    }

    #[test]
    fn threaded_hidden_host_runs_no_main_frames() {
        let (surface, handle) = fake();
        let mut p = threaded(vec![surface]);
        p.run_until(|p| p.host.client().events.contains(&Event::SwapComplete));
        p.events();

        p.host.set_visible(false);
        p.host.set_needs_commit();
        p.run_frames(5);
        assert!(!p.events().contains(&Event::Commit));
        assert_eq!(p.host.source_frame_number(), 1);
        let drawn = handle.frame_count();

        p.host.set_visible(true);
        p.run_until(|p| p.host.source_frame_number() == 2);
        p.run_until(|_| handle.frame_count() > drawn);
    }

    #[test]
    fn threaded_zero_viewport_requests_no_further_commits() {
        let (surface, handle) = fake();
        let mut p = threaded(vec![surface]);
        p.run_until(|_| handle.frame_count() >= 1);

        p.host.layers_mut().set_viewport_size(Size::ZERO);
        p.host.set_needs_commit();
        p.run_until(|p| p.host.source_frame_number() == 2);
        p.run_frames(2);
        let drawn = handle.frame_count();
        p.events();

        p.run_frames(12);
        let events = p.events();
        assert!(!events.contains(&Event::BeginMainFrame), "{events:?}");
        assert_eq!(p.host.source_frame_number(), 2);
        assert_eq!(handle.frame_count(), drawn);

        p.host.layers_mut().set_viewport_size(Size::new(100.0, 100.0));
        p.host.set_needs_commit();
        p.run_until(|_| handle.frame_count() > drawn);
    }

    #[test]
    fn threaded_unacknowledged_swaps_throttle_drawing() {
        let (surface, handle) = FakeOutputSurface::new();
        let surface = surface.with_max_frames_pending(1).manual_acks();
        let mut p = threaded(vec![Box::new(surface)]);
        p.run_until(|_| handle.pending_acks() == 1);
        p.events();

        p.host.set_needs_redraw(FULL);
        p.run_frames(5);
        assert_eq!(handle.frame_count(), 1, "throttled while a swap is pending");
        assert!(!p.events().contains(&Event::SwapComplete));

        assert!(handle.ack_next());
        p.run_until(|p| p.host.client().events.contains(&Event::SwapComplete));
        p.run_until(|_| handle.frame_count() >= 2);
    }
}
