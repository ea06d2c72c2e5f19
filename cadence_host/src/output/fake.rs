// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::VecDeque;
use std::sync::Arc;

use cadence_core::output::OutputSurfaceCapabilities;
use cadence_render::{
    CompositorFrame, FrameAck, OutputSurface, OutputSurfaceClient, SwapError, SyncToken,
};
use kurbo::Size;
use parking_lot::Mutex;

#[derive(Default)]
struct FakeState {
    client: Option<Box<dyn OutputSurfaceClient>>,
    bind_attempted: bool,
    released: bool,
    lost: bool,
    swaps: u32,
    frames: Vec<CompositorFrame>,
    /// Indices into `frames` not yet acknowledged.
    unacked: VecDeque<usize>,
    reshapes: Vec<(Size, f32)>,
    acks_sent: u64,
}

impl FakeState {
    fn ack_oldest(&mut self) -> bool {
        let Some(index) = self.unacked.pop_front() else {
            return false;
        };
        self.acks_sent += 1;
        let ack = FrameAck::returning(
            self.frames[index].resources(),
            SyncToken::new(0, self.acks_sent),
        );
        if let Some(client) = &self.client {
            client.did_swap_buffers_complete(ack);
        }
        true
    }
}

/// A scriptable output sink for tests.
///
/// By default it binds, reports [`OutputSurfaceCapabilities::default`] and
/// acknowledges each frame as soon as it is swapped.
pub struct FakeOutputSurface {
    state: Arc<Mutex<FakeState>>,
    capabilities: OutputSurfaceCapabilities,
    bind_succeeds: bool,
    lose_on_swap: Option<u32>,
    auto_ack: bool,
}

impl std::fmt::Debug for FakeOutputSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeOutputSurface")
            .field("capabilities", &self.capabilities)
            .field("bind_succeeds", &self.bind_succeeds)
            .field("lose_on_swap", &self.lose_on_swap)
            .field("auto_ack", &self.auto_ack)
            .finish_non_exhaustive()
    }
}

/// Test-side view of a [`FakeOutputSurface`].
#[derive(Clone)]
pub struct FakeOutputHandle {
    state: Arc<Mutex<FakeState>>,
}

impl std::fmt::Debug for FakeOutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeOutputHandle")
            .field("bound", &state.client.is_some())
            .field("swaps", &state.swaps)
            .field("unacked", &state.unacked.len())
            .finish_non_exhaustive()
    }
}

impl FakeOutputSurface {
    /// Creates a sink that binds and acknowledges automatically.
    #[must_use]
    pub fn new() -> (Self, FakeOutputHandle) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        (
            Self {
                state: Arc::clone(&state),
                capabilities: OutputSurfaceCapabilities::default(),
                bind_succeeds: true,
                lose_on_swap: None,
                auto_ack: true,
            },
            FakeOutputHandle { state },
        )
    }

    /// Creates a sink whose bind fails.
    #[must_use]
    pub fn failing() -> (Self, FakeOutputHandle) {
        let (mut surface, handle) = Self::new();
        surface.bind_succeeds = false;
        (surface, handle)
    }

    /// Reports `capabilities` once bound.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: OutputSurfaceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Reports `max_frames_pending` once bound.
    #[must_use]
    pub fn with_max_frames_pending(mut self, max_frames_pending: u32) -> Self {
        self.capabilities.max_frames_pending = max_frames_pending;
        self
    }

    /// Fails the `n`-th swap (counting from 1) with a lost context.
    #[must_use]
    pub fn lose_on_swap(mut self, n: u32) -> Self {
        self.lose_on_swap = Some(n);
        self
    }

    /// Leaves acknowledgements to [`FakeOutputHandle::ack_next`].
    #[must_use]
    pub fn manual_acks(mut self) -> Self {
        self.auto_ack = false;
        self
    }
}

impl OutputSurface for FakeOutputSurface {
    fn bind_to_client(&mut self, client: Box<dyn OutputSurfaceClient>) -> bool {
        let mut state = self.state.lock();
        assert!(!state.bind_attempted, "output surface bound twice");
        state.bind_attempted = true;
        if self.bind_succeeds {
            state.client = Some(client);
        }
        self.bind_succeeds
    }

    fn capabilities(&self) -> OutputSurfaceCapabilities {
        self.capabilities
    }

    fn swap_buffers(&mut self, frame: CompositorFrame) -> Result<(), SwapError> {
        let mut state = self.state.lock();
        if state.client.is_none() {
            return Err(SwapError::NotBound);
        }
        state.swaps += 1;
        if state.lost || self.lose_on_swap == Some(state.swaps) {
            state.lost = true;
            return Err(SwapError::ContextLost);
        }
        state.frames.push(frame);
        let index = state.frames.len() - 1;
        state.unacked.push_back(index);
        if self.auto_ack {
            state.ack_oldest();
        }
        Ok(())
    }

    fn reshape(&mut self, size: Size, device_scale_factor: f32) {
        self.state.lock().reshapes.push((size, device_scale_factor));
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        state.client = None;
        state.released = true;
    }
}

impl FakeOutputHandle {
    /// Whether the sink is bound and not released.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.state.lock().client.is_some()
    }

    /// Whether the compositor released the sink.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Number of swap attempts, failed ones included.
    #[must_use]
    pub fn swap_count(&self) -> u32 {
        self.state.lock().swaps
    }

    /// Number of frames successfully swapped.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// A copy of the most recent frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<CompositorFrame> {
        self.state.lock().frames.last().cloned()
    }

    /// Copies of every frame swapped so far.
    #[must_use]
    pub fn frames(&self) -> Vec<CompositorFrame> {
        self.state.lock().frames.clone()
    }

    /// Number of swapped frames not yet acknowledged.
    #[must_use]
    pub fn pending_acks(&self) -> usize {
        self.state.lock().unacked.len()
    }

    /// Sizes passed to `reshape`, in order.
    #[must_use]
    pub fn reshapes(&self) -> Vec<(Size, f32)> {
        self.state.lock().reshapes.clone()
    }

    /// Acknowledges the oldest pending frame. Returns `false` if none was
    /// pending.
    pub fn ack_next(&self) -> bool {
        self.state.lock().ack_oldest()
    }

    /// Acknowledges every pending frame.
    pub fn ack_all(&self) {
        let mut state = self.state.lock();
        while state.ack_oldest() {}
    }

    /// Reports context loss to the bound client. Later swaps fail.
    pub fn lose_context(&self) {
        let mut state = self.state.lock();
        state.lost = true;
        if let Some(client) = &state.client {
            client.did_lose_output_surface();
        }
    }
}
