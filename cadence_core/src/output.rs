// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output sink capabilities.
//!
//! An output sink reports [`OutputSurfaceCapabilities`] when it is bound.
//! The impl side turns them into a [`RendererCapabilities`] snapshot that
//! stays valid for exactly one binding and is discarded when the sink is
//! lost or released.

/// The kind of drawing context behind an output sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Hardware-accelerated context.
    #[default]
    Gpu,
    /// CPU raster into shared memory.
    Software,
}

/// Capabilities reported by a bound output sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputSurfaceCapabilities {
    /// Frames are forwarded to a parent compositor instead of being drawn
    /// into the sink directly.
    pub delegated_rendering: bool,
    /// Resources crossing to the consumer must carry a synchronization token.
    pub requires_sync_tokens: bool,
    /// Maximum number of swapped frames awaiting acknowledgement.
    pub max_frames_pending: u32,
    /// Drawing targets the context's default framebuffer.
    pub uses_default_framebuffer: bool,
    /// Kind of drawing context.
    pub context: ContextKind,
}

impl Default for OutputSurfaceCapabilities {
    fn default() -> Self {
        Self {
            delegated_rendering: false,
            requires_sync_tokens: false,
            max_frames_pending: 1,
            uses_default_framebuffer: true,
            context: ContextKind::Gpu,
        }
    }
}

/// Read-only capability snapshot for one output sink binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RendererCapabilities {
    /// Swap backpressure limit. Always at least 1.
    pub max_frames_pending: u32,
    /// Whether the renderer produces frames for a parent compositor.
    pub using_delegated_rendering: bool,
    /// Whether outgoing resources must carry synchronization tokens.
    pub requires_sync_tokens: bool,
    /// Whether textures may be updated in place between frames.
    pub allow_partial_texture_updates: bool,
    /// Kind of drawing context.
    pub context: ContextKind,
}

impl RendererCapabilities {
    /// Derives renderer capabilities from what the sink reported.
    #[must_use]
    pub const fn from_output(caps: &OutputSurfaceCapabilities) -> Self {
        let max_frames_pending = if caps.max_frames_pending == 0 {
            1
        } else {
            caps.max_frames_pending
        };
        Self {
            max_frames_pending,
            using_delegated_rendering: caps.delegated_rendering,
            // A parent compositor reads our textures on its own context.
            requires_sync_tokens: caps.requires_sync_tokens || caps.delegated_rendering,
            allow_partial_texture_updates: !caps.delegated_rendering
                && matches!(caps.context, ContextKind::Gpu),
            context: caps.context,
        }
    }
}
