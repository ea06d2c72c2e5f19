// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Impl-side layers.

use cadence_core::layer::{LayerId, LayerProperties};
use cadence_render::ResourceId;
use kurbo::{Affine, Rect};

/// Values derived while preparing a draw. Never sent back to the main side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DrawProperties {
    /// Layer space to output space.
    pub(crate) screen_transform: Affine,
    /// Product of the opacities from the root down to this layer.
    pub(crate) opacity: f32,
    /// Whether this layer or an ancestor is hidden.
    pub(crate) hidden: bool,
    /// Output-space bounding box of the layer's content rectangle.
    pub(crate) screen_rect: Rect,
    /// Part of the content rectangle inside the viewport, in layer space.
    pub(crate) visible_rect: Rect,
}

impl Default for DrawProperties {
    fn default() -> Self {
        Self {
            screen_transform: Affine::IDENTITY,
            opacity: 1.0,
            hidden: false,
            screen_rect: Rect::ZERO,
            visible_rect: Rect::ZERO,
        }
    }
}

/// What a layer contributes to a frame. Two layers with equal signatures
/// produce identical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LayerSignature {
    pub(crate) screen_rect: Rect,
    pub(crate) opacity: f32,
    pub(crate) texture: Option<ResourceId>,
    pub(crate) color: [f32; 4],
}

/// The impl-side counterpart of a main-side layer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LayerImpl {
    pub(crate) id: LayerId,
    pub(crate) properties: LayerProperties,
    pub(crate) parent: Option<LayerId>,
    pub(crate) children: Vec<LayerId>,
    /// Externally supplied texture drawn instead of the background color.
    pub(crate) texture: Option<ResourceId>,
    pub(crate) draw: DrawProperties,
}

impl LayerImpl {
    pub(crate) fn new(id: LayerId, properties: LayerProperties) -> Self {
        Self {
            id,
            properties,
            parent: None,
            children: Vec::new(),
            texture: None,
            draw: DrawProperties::default(),
        }
    }

    /// Content rectangle in layer space.
    pub(crate) fn content_rect(&self) -> Rect {
        Rect::from_origin_size((0.0, 0.0), self.properties.bounds)
    }

    /// Returns whether the layer produces a quad, given its current draw
    /// properties.
    pub(crate) fn is_drawn(&self) -> bool {
        self.properties.draws_content
            && !self.draw.hidden
            && self.draw.opacity > 0.0
            && !self.draw.visible_rect.is_zero_area()
    }

    /// Returns the layer's contribution to the frame, or `None` if it draws
    /// nothing.
    pub(crate) fn signature(&self) -> Option<LayerSignature> {
        self.is_drawn().then(|| LayerSignature {
            screen_rect: self.draw.screen_rect,
            opacity: self.draw.opacity,
            texture: self.texture,
            color: self.properties.background_color,
        })
    }
}
