// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The output sink contract.
//!
//! An [`OutputSurface`] is the drawing destination of the impl side: a GPU
//! context, a software raster target, or a channel to a parent compositor.
//! Its lifecycle is `Unbound → Bound → (Lost) → Unbound`:
//!
//! - [`OutputSurface::bind_to_client`] is called exactly once per instance.
//!   A `false` return means the sink is unusable; the owner must ask for a
//!   different (fallback) sink rather than retry the same one.
//! - Once bound, frames go out through [`OutputSurface::swap_buffers`] and
//!   acknowledgements come back through the [`OutputSurfaceClient`].
//! - A sink that reported loss, by callback or by a
//!   [`SwapError::ContextLost`] return, is never used again.

use alloc::boxed::Box;

use cadence_core::output::OutputSurfaceCapabilities;
use kurbo::Size;

use crate::frame::CompositorFrame;
use crate::resource::FrameAck;

/// Why a swap could not be performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    /// The drawing context was lost. The sink must be replaced.
    #[error("output surface context lost")]
    ContextLost,
    /// The sink was never bound or was already released.
    #[error("output surface is not bound to a client")]
    NotBound,
    /// The downstream frame consumer went away.
    #[error("frame consumer disconnected")]
    ConsumerGone,
}

impl SwapError {
    /// Returns whether the sink must be treated as lost.
    #[must_use]
    pub const fn is_fatal_for_surface(self) -> bool {
        matches!(self, Self::ContextLost | Self::ConsumerGone)
    }
}

/// Receives notifications from a bound output sink.
///
/// Methods may be called from any thread, including from inside
/// [`OutputSurface::swap_buffers`].
pub trait OutputSurfaceClient: Send {
    /// A swapped frame was presented. Carries the resources the consumer
    /// no longer needs.
    fn did_swap_buffers_complete(&self, ack: FrameAck);

    /// The consumer handed resources back outside of a swap completion.
    fn reclaim_resources(&self, ack: FrameAck);

    /// The drawing context was lost.
    fn did_lose_output_surface(&self);
}

/// A drawing destination for compositor frames.
pub trait OutputSurface: Send {
    /// Binds the sink to the impl side.
    ///
    /// Returns `false` if the sink could not initialize its context.
    ///
    /// # Panics
    ///
    /// Implementations panic if called more than once.
    fn bind_to_client(&mut self, client: Box<dyn OutputSurfaceClient>) -> bool;

    /// Returns what the sink supports. Only meaningful once bound.
    fn capabilities(&self) -> OutputSurfaceCapabilities;

    /// Hands a frame to the sink.
    ///
    /// On success the frame is counted as pending until
    /// [`OutputSurfaceClient::did_swap_buffers_complete`] arrives.
    fn swap_buffers(&mut self, frame: CompositorFrame) -> Result<(), SwapError>;

    /// Informs the sink of a new output size.
    fn reshape(&mut self, size: Size, device_scale_factor: f32) {
        let _ = (size, device_scale_factor);
    }

    /// Detaches the client. No callbacks arrive afterwards.
    fn release(&mut self) {}
}
