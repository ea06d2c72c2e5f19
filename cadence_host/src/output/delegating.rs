// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use cadence_core::output::{ContextKind, OutputSurfaceCapabilities};
use cadence_render::{
    CompositorFrame, FrameAck, OutputSurface, OutputSurfaceClient, SwapError, SyncToken,
    TransferableResource,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

/// State shared by a delegating sink and its parent.
struct Shared {
    client: Mutex<Option<Box<dyn OutputSurfaceClient>>>,
    lost: AtomicBool,
    sync_namespace: u32,
    release_count: AtomicU64,
}

impl Shared {
    fn with_client(&self, f: impl FnOnce(&dyn OutputSurfaceClient)) {
        match &*self.client.lock() {
            Some(client) => f(client.as_ref()),
            None => tracing::trace!("parent event after the surface was released"),
        }
    }

    fn next_sync_token(&self) -> SyncToken {
        let count = self.release_count.fetch_add(1, Ordering::Relaxed) + 1;
        SyncToken::new(self.sync_namespace, count)
    }
}

/// An output sink that hands frames to a parent compositor.
///
/// The parent owns the drawing context. Resources come back with sync
/// tokens that the producer must wait on before reusing a buffer.
pub struct DelegatingOutputSurface {
    shared: Arc<Shared>,
    frames: Sender<CompositorFrame>,
    max_frames_pending: u32,
    bound: bool,
}

impl std::fmt::Debug for DelegatingOutputSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatingOutputSurface")
            .field("bound", &self.bound)
            .field("lost", &self.shared.lost.load(Ordering::Relaxed))
            .field("max_frames_pending", &self.max_frames_pending)
            .finish_non_exhaustive()
    }
}

/// The consuming end of a [`DelegatingOutputSurface`].
///
/// Dropping it makes further swaps fail with [`SwapError::ConsumerGone`].
pub struct ParentCompositor {
    shared: Arc<Shared>,
    frames: Receiver<CompositorFrame>,
}

impl std::fmt::Debug for ParentCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentCompositor")
            .field("sync_namespace", &self.shared.sync_namespace)
            .field("queued_frames", &self.frames.len())
            .finish_non_exhaustive()
    }
}

impl DelegatingOutputSurface {
    /// Creates a connected sink and parent.
    ///
    /// `sync_namespace` identifies the parent's context in the sync tokens
    /// it hands back.
    #[must_use]
    pub fn new(max_frames_pending: u32, sync_namespace: u32) -> (Self, ParentCompositor) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            client: Mutex::new(None),
            lost: AtomicBool::new(false),
            sync_namespace,
            release_count: AtomicU64::new(0),
        });
        (
            Self {
                shared: Arc::clone(&shared),
                frames: tx,
                max_frames_pending,
                bound: false,
            },
            ParentCompositor { shared, frames: rx },
        )
    }
}

impl OutputSurface for DelegatingOutputSurface {
    fn bind_to_client(&mut self, client: Box<dyn OutputSurfaceClient>) -> bool {
        assert!(!self.bound, "output surface bound twice");
        self.bound = true;
        if self.shared.lost.load(Ordering::Acquire) {
            return false;
        }
        *self.shared.client.lock() = Some(client);
        true
    }

    fn capabilities(&self) -> OutputSurfaceCapabilities {
        OutputSurfaceCapabilities {
            delegated_rendering: true,
            requires_sync_tokens: true,
            max_frames_pending: self.max_frames_pending,
            uses_default_framebuffer: false,
            context: ContextKind::Gpu,
        }
    }

    fn swap_buffers(&mut self, frame: CompositorFrame) -> Result<(), SwapError> {
        if self.shared.lost.load(Ordering::Acquire) {
            return Err(SwapError::ContextLost);
        }
        if self.shared.client.lock().is_none() {
            return Err(SwapError::NotBound);
        }
        self.frames.send(frame).map_err(|_| SwapError::ConsumerGone)
    }

    fn release(&mut self) {
        self.shared.client.lock().take();
    }
}

impl ParentCompositor {
    /// Takes the oldest frame the child swapped, if any.
    #[must_use]
    pub fn try_receive(&self) -> Option<CompositorFrame> {
        self.frames.try_recv().ok()
    }

    /// Waits up to `timeout` for the next frame.
    #[must_use]
    pub fn receive_timeout(&self, timeout: Duration) -> Option<CompositorFrame> {
        self.frames.recv_timeout(timeout).ok()
    }

    /// Acknowledges `frame`, returning all of its resources.
    pub fn ack(&self, frame: &CompositorFrame) {
        let ack = FrameAck::returning(frame.resources(), self.shared.next_sync_token());
        self.shared
            .with_client(|client| client.did_swap_buffers_complete(ack));
    }

    /// Hands resources back outside of a swap acknowledgement.
    pub fn return_resources(&self, resources: &[TransferableResource]) {
        let ack = FrameAck::returning(resources, self.shared.next_sync_token());
        self.shared.with_client(|client| client.reclaim_resources(ack));
    }

    /// Simulates loss of the parent's drawing context.
    pub fn lose_context(&self) {
        if self.shared.lost.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.with_client(|client| client.did_lose_output_surface());
    }

    /// Whether the context was lost.
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.shared.lost.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use cadence_render::{FrameMetadata, Mailbox, RenderPass, RenderPassId, ResourceId};
    use kurbo::{Rect, Size};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl OutputSurfaceClient for Recorder {
        fn did_swap_buffers_complete(&self, ack: FrameAck) {
            let tokens: Vec<_> = ack.resources.iter().map(|r| r.sync_token).collect();
            self.0.lock().push(format!("ack {tokens:?}"));
        }
        fn reclaim_resources(&self, ack: FrameAck) {
            self.0.lock().push(format!("reclaim {}", ack.resources.len()));
        }
        fn did_lose_output_surface(&self) {
            self.0.lock().push("lost".into());
        }
    }

    fn frame_with_resource() -> CompositorFrame {
        let viewport = Rect::new(0.0, 0.0, 4.0, 4.0);
        CompositorFrame::new(
            FrameMetadata {
                frame_number: 1,
                device_scale_factor: 1.0,
                page_scale_factor: 1.0,
                viewport_size: viewport.size(),
            },
            vec![RenderPass::new(RenderPassId(1), viewport, viewport)],
            vec![TransferableResource {
                id: ResourceId(1),
                mailbox: Mailbox(1),
                sync_token: SyncToken::EMPTY,
                size: Size::new(4.0, 4.0),
                is_software: false,
            }],
        )
    }

    #[test]
    fn frames_cross_and_acks_carry_sync_tokens() {
        let recorder = Recorder::default();
        let (mut surface, parent) = DelegatingOutputSurface::new(2, 7);
        assert!(surface.capabilities().delegated_rendering);
        assert!(surface.bind_to_client(Box::new(recorder.clone())));

        surface.swap_buffers(frame_with_resource()).expect("swap");
        let frame = parent.try_receive().expect("frame crossed");
        parent.ack(&frame);
        parent.return_resources(frame.resources());

        let log = recorder.0.lock().clone();
        assert_eq!(
            log,
            vec![
                format!("ack {:?}", vec![SyncToken::new(7, 1)]),
                "reclaim 1".to_string()
            ]
        );
    }

    #[test]
    fn lost_context_fails_swaps_and_notifies_once() {
        let recorder = Recorder::default();
        let (mut surface, parent) = DelegatingOutputSurface::new(1, 1);
        surface.bind_to_client(Box::new(recorder.clone()));
        parent.lose_context();
        parent.lose_context();
        assert!(parent.is_lost());
        assert_eq!(
            surface.swap_buffers(frame_with_resource()),
            Err(SwapError::ContextLost)
        );
        assert_eq!(recorder.0.lock().as_slice(), ["lost".to_string()]);
    }

    #[test]
    fn dropped_parent_is_a_gone_consumer() {
        let (mut surface, parent) = DelegatingOutputSurface::new(1, 1);
        surface.bind_to_client(Box::new(Recorder::default()));
        drop(parent);
        assert_eq!(
            surface.swap_buffers(frame_with_resource()),
            Err(SwapError::ConsumerGone)
        );
    }

    #[test]
    fn binding_a_lost_surface_fails() {
        let (mut surface, parent) = DelegatingOutputSurface::new(1, 1);
        parent.lose_context();
        assert!(!surface.bind_to_client(Box::new(Recorder::default())));
    }
}
