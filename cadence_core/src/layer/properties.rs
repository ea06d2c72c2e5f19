// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer and tree-wide property values.

use kurbo::{Affine, Size, Vec2};

/// Per-layer boolean flags.
///
/// Setting [`hidden`](Self::hidden) suppresses all visual contribution of the
/// layer and its entire subtree. Properties can still be mutated while hidden.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerFlags {
    /// Whether the layer (and its subtree) is hidden.
    pub hidden: bool,
}

/// A snapshot of one layer's local properties.
///
/// This is the unit pushed from the main side to the impl side when a layer
/// changed since the previous commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerProperties {
    /// Size of the layer's content rectangle, in layer space.
    pub bounds: Size,
    /// Transform from layer space to the parent's layer space.
    pub transform: Affine,
    /// Local opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Whether the layer itself produces pixels (as opposed to only
    /// grouping its children).
    pub draws_content: bool,
    /// Solid color drawn when the layer has no attached texture, as
    /// straight-alpha RGBA.
    pub background_color: [f32; 4],
    /// Layer flags.
    pub flags: LayerFlags,
    /// Scroll offset applied to the layer's children.
    pub scroll_offset: Vec2,
}

impl Default for LayerProperties {
    fn default() -> Self {
        Self {
            bounds: Size::ZERO,
            transform: Affine::IDENTITY,
            opacity: 1.0,
            draws_content: false,
            background_color: [0.0; 4],
            flags: LayerFlags::default(),
            scroll_offset: Vec2::ZERO,
        }
    }
}

/// Scheduling priority between the active and pending trees.
///
/// The embedder hints which tree matters more while, for example, a fling
/// is in progress. The hint is carried to the impl side with every commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TreePriority {
    /// Treat both trees alike.
    #[default]
    SamePriorityForBothTrees,
    /// Prefer keeping the active tree smooth over preparing new content.
    SmoothnessTakesPriority,
    /// Prefer getting new content ready over smoothness.
    NewContentTakesPriority,
}

/// Tree-wide properties committed alongside the layers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeProperties {
    /// Size of the output viewport in device pixels.
    pub viewport_size: Size,
    /// Ratio of device pixels to layout pixels.
    pub device_scale_factor: f32,
    /// Page zoom applied on top of the device scale.
    pub page_scale_factor: f32,
    /// Color behind all layers, as straight-alpha RGBA.
    pub background_color: [f32; 4],
    /// Priority hint between the two impl-side trees.
    pub priority: TreePriority,
}

impl Default for TreeProperties {
    fn default() -> Self {
        Self {
            viewport_size: Size::ZERO,
            device_scale_factor: 1.0,
            page_scale_factor: 1.0,
            background_color: [1.0, 1.0, 1.0, 1.0],
            priority: TreePriority::default(),
        }
    }
}
