// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use cadence_core::output::{ContextKind, OutputSurfaceCapabilities};
use cadence_render::{
    CompositorFrame, FrameAck, FrameMetadata, OutputSurface, OutputSurfaceClient, SwapError,
    SyncToken,
};
use kurbo::{Rect, Size};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Presented {
    frames: u64,
    last_metadata: Option<FrameMetadata>,
    last_damage: Rect,
    size: Size,
    released: bool,
}

/// An output sink that rasterizes on the CPU into shared memory.
///
/// There is no consumer on another context, so every frame is acknowledged
/// from inside [`swap_buffers`](OutputSurface::swap_buffers) and at most one
/// frame is ever pending.
pub struct SoftwareOutputSurface {
    client: Option<Box<dyn OutputSurfaceClient>>,
    bound: bool,
    presented: Arc<Mutex<Presented>>,
}

impl std::fmt::Debug for SoftwareOutputSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareOutputSurface")
            .field("bound", &self.bound)
            .field("presented", &*self.presented.lock())
            .finish_non_exhaustive()
    }
}

/// Read access to what a [`SoftwareOutputSurface`] presented.
#[derive(Clone, Debug)]
pub struct SoftwareOutputHandle {
    presented: Arc<Mutex<Presented>>,
}

impl SoftwareOutputSurface {
    /// Creates an unbound sink and a handle to observe it.
    #[must_use]
    pub fn new() -> (Self, SoftwareOutputHandle) {
        let presented = Arc::new(Mutex::new(Presented::default()));
        let handle = SoftwareOutputHandle {
            presented: Arc::clone(&presented),
        };
        (
            Self {
                client: None,
                bound: false,
                presented,
            },
            handle,
        )
    }
}

impl OutputSurface for SoftwareOutputSurface {
    fn bind_to_client(&mut self, client: Box<dyn OutputSurfaceClient>) -> bool {
        assert!(!self.bound, "output surface bound twice");
        self.bound = true;
        self.client = Some(client);
        true
    }

    fn capabilities(&self) -> OutputSurfaceCapabilities {
        OutputSurfaceCapabilities {
            delegated_rendering: false,
            requires_sync_tokens: false,
            max_frames_pending: 1,
            uses_default_framebuffer: false,
            context: ContextKind::Software,
        }
    }

    fn swap_buffers(&mut self, frame: CompositorFrame) -> Result<(), SwapError> {
        let Some(client) = &self.client else {
            return Err(SwapError::NotBound);
        };
        {
            let mut presented = self.presented.lock();
            presented.frames += 1;
            presented.last_metadata = Some(*frame.metadata());
            presented.last_damage = frame.root_pass().damage_rect;
        }
        client.did_swap_buffers_complete(FrameAck::returning(frame.resources(), SyncToken::EMPTY));
        Ok(())
    }

    fn reshape(&mut self, size: Size, _device_scale_factor: f32) {
        self.presented.lock().size = size;
    }

    fn release(&mut self) {
        self.client = None;
        self.presented.lock().released = true;
    }
}

impl SoftwareOutputHandle {
    /// Number of frames presented.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.presented.lock().frames
    }

    /// Metadata of the last presented frame.
    #[must_use]
    pub fn last_metadata(&self) -> Option<FrameMetadata> {
        self.presented.lock().last_metadata
    }

    /// Damage of the last presented frame.
    #[must_use]
    pub fn last_damage(&self) -> Rect {
        self.presented.lock().last_damage
    }

    /// Current size of the raster target.
    #[must_use]
    pub fn size(&self) -> Size {
        self.presented.lock().size
    }

    /// Whether the compositor let go of the sink.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.presented.lock().released
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use cadence_render::{RenderPass, RenderPassId};

    use super::*;

    #[derive(Default)]
    struct Acks(Arc<AtomicU32>);

    impl OutputSurfaceClient for Acks {
        fn did_swap_buffers_complete(&self, _ack: FrameAck) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn reclaim_resources(&self, _ack: FrameAck) {}
        fn did_lose_output_surface(&self) {}
    }

    fn frame(number: u64) -> CompositorFrame {
        let viewport = Rect::new(0.0, 0.0, 8.0, 8.0);
        CompositorFrame::new(
            FrameMetadata {
                frame_number: number,
                device_scale_factor: 1.0,
                page_scale_factor: 1.0,
                viewport_size: viewport.size(),
            },
            vec![RenderPass::new(RenderPassId(1), viewport, viewport)],
            Vec::new(),
        )
    }

    #[test]
    fn acks_before_swap_returns() {
        let acks = Arc::new(AtomicU32::new(0));
        let (mut surface, handle) = SoftwareOutputSurface::new();
        assert_eq!(surface.swap_buffers(frame(1)), Err(SwapError::NotBound));
        assert!(surface.bind_to_client(Box::new(Acks(Arc::clone(&acks)))));
        surface.swap_buffers(frame(1)).expect("bound surface swaps");
        assert_eq!(acks.load(Ordering::SeqCst), 1);
        assert_eq!(handle.frame_count(), 1);
        assert_eq!(handle.last_metadata().map(|m| m.frame_number), Some(1));

        surface.release();
        assert!(handle.is_released());
        assert_eq!(surface.swap_buffers(frame(2)), Err(SwapError::NotBound));
    }

    #[test]
    #[should_panic(expected = "output surface bound twice")]
    fn double_bind_panics() {
        let (mut surface, _handle) = SoftwareOutputSurface::new();
        surface.bind_to_client(Box::new(Acks::default()));
        surface.bind_to_client(Box::new(Acks::default()));
    }
}
