// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor frames: the immutable payload of one successful draw.

use alloc::vec::Vec;

use cadence_core::layer::LayerId;
use kurbo::{Affine, Rect, Size};

use crate::resource::{ResourceId, TransferableResource};

/// Identifies a render pass within one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderPassId(pub u32);

/// What a quad is filled with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QuadMaterial {
    /// A flat premultiplied RGBA color.
    SolidColor([f32; 4]),
    /// A transferable resource, listed in the frame's resource list.
    Texture {
        /// The resource sampled by the quad.
        resource: ResourceId,
        /// Whether the texture holds premultiplied alpha.
        premultiplied_alpha: bool,
    },
}

/// A single draw command in a render pass.
///
/// Quads are stored back-to-front, matching the impl tree's traversal order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawQuad {
    /// The layer this quad originates from.
    pub layer: LayerId,
    /// Quad rectangle in layer space.
    pub rect: Rect,
    /// Part of `rect` that is visible in the output, in layer space.
    pub visible_rect: Rect,
    /// Layer-to-target transform.
    pub transform: Affine,
    /// Accumulated opacity (0.0–1.0).
    pub opacity: f32,
    /// Fill.
    pub material: QuadMaterial,
}

/// An ordered list of quads drawn into one target.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPass {
    /// Pass identity. The root pass is the last one in a frame.
    pub id: RenderPassId,
    /// Target rectangle in output pixels.
    pub output_rect: Rect,
    /// Part of the target that changed since the previous frame.
    pub damage_rect: Rect,
    /// Target-to-root transform.
    pub transform_to_root: Affine,
    /// Quads in back-to-front order.
    pub quads: Vec<DrawQuad>,
}

impl RenderPass {
    /// Creates an empty pass covering `output_rect`.
    #[must_use]
    pub fn new(id: RenderPassId, output_rect: Rect, damage_rect: Rect) -> Self {
        Self {
            id,
            output_rect,
            damage_rect,
            transform_to_root: Affine::IDENTITY,
            quads: Vec::new(),
        }
    }
}

/// Frame-wide values the consumer needs to interpret the passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMetadata {
    /// Monotonic frame number from the producing scheduler.
    pub frame_number: u64,
    /// Device pixels per layout pixel.
    pub device_scale_factor: f32,
    /// Page zoom applied to the content.
    pub page_scale_factor: f32,
    /// Output size in device pixels.
    pub viewport_size: Size,
}

/// The immutable payload produced by one successful draw.
///
/// Ownership moves to the output sink at swap time. Every texture quad
/// references a resource in [`resources`](Self::resources).
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorFrame {
    metadata: FrameMetadata,
    render_passes: Vec<RenderPass>,
    resources: Vec<TransferableResource>,
}

impl CompositorFrame {
    /// Seals a frame.
    ///
    /// # Panics
    ///
    /// Panics if there are no render passes, or if a texture quad refers to
    /// a resource not listed in `resources`.
    #[must_use]
    pub fn new(
        metadata: FrameMetadata,
        render_passes: Vec<RenderPass>,
        resources: Vec<TransferableResource>,
    ) -> Self {
        assert!(
            !render_passes.is_empty(),
            "a compositor frame needs a root render pass"
        );
        for quad in render_passes.iter().flat_map(|p| &p.quads) {
            if let QuadMaterial::Texture { resource, .. } = quad.material {
                assert!(
                    resources.iter().any(|r| r.id == resource),
                    "quad references {resource:?} which the frame does not carry"
                );
            }
        }
        Self {
            metadata,
            render_passes,
            resources,
        }
    }

    /// Returns the frame-wide values.
    #[must_use]
    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// Returns the render passes; the root pass is last.
    #[must_use]
    pub fn render_passes(&self) -> &[RenderPass] {
        &self.render_passes
    }

    /// Returns the root render pass.
    #[must_use]
    pub fn root_pass(&self) -> &RenderPass {
        // `new` guarantees at least one pass.
        &self.render_passes[self.render_passes.len() - 1]
    }

    /// Returns the resources carried by this frame.
    #[must_use]
    pub fn resources(&self) -> &[TransferableResource] {
        &self.resources
    }

    /// Returns the ids of the carried resources.
    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.iter().map(|r| r.id)
    }

    /// Returns the total number of quads across all passes.
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.render_passes.iter().map(|p| p.quads.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use cadence_core::layer::LayerStore;

    use super::*;
    use crate::resource::{Mailbox, SyncToken};

    fn metadata() -> FrameMetadata {
        FrameMetadata {
            frame_number: 1,
            device_scale_factor: 1.0,
            page_scale_factor: 1.0,
            viewport_size: Size::new(100.0, 100.0),
        }
    }

    fn texture_quad(layer: LayerId, resource: ResourceId) -> DrawQuad {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        DrawQuad {
            layer,
            rect,
            visible_rect: rect,
            transform: Affine::IDENTITY,
            opacity: 1.0,
            material: QuadMaterial::Texture {
                resource,
                premultiplied_alpha: true,
            },
        }
    }

    fn resource(id: u32) -> TransferableResource {
        TransferableResource {
            id: ResourceId(id),
            mailbox: Mailbox(u64::from(id)),
            sync_token: SyncToken::EMPTY,
            size: Size::new(10.0, 10.0),
            is_software: false,
        }
    }

    #[test]
    fn frame_exposes_root_pass_and_resources() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
        let mut pass = RenderPass::new(RenderPassId(1), viewport, viewport);
        pass.quads.push(texture_quad(layer, ResourceId(3)));
        let frame = CompositorFrame::new(metadata(), vec![pass], vec![resource(3)]);
        assert_eq!(frame.root_pass().id, RenderPassId(1));
        assert_eq!(frame.quad_count(), 1);
        assert_eq!(frame.resource_ids().collect::<Vec<_>>(), [ResourceId(3)]);
    }

    #[test]
    #[should_panic(expected = "which the frame does not carry")]
    fn quad_with_missing_resource_panics() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
        let mut pass = RenderPass::new(RenderPassId(1), viewport, viewport);
        pass.quads.push(texture_quad(layer, ResourceId(9)));
        let _ = CompositorFrame::new(metadata(), vec![pass], Vec::new());
    }

    #[test]
    #[should_panic(expected = "needs a root render pass")]
    fn empty_frame_panics() {
        let _ = CompositorFrame::new(metadata(), Vec::new(), Vec::new());
    }
}
