// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor frames, transferable resources and output sinks for cadence.
//!
//! This crate defines what crosses the boundary between the impl side and
//! whatever consumes its frames:
//!
//! - [`CompositorFrame`]: the immutable result of one draw, made of
//!   [`RenderPass`]es and the [`TransferableResource`]s they reference
//! - [`DamageRegion`]: spatial damage tracking for partial redraws
//! - [`ResourceLedger`]: the producer-side record of every resource until
//!   it comes back in a [`FrameAck`] and its release callback has run
//! - [`OutputSurface`] and [`OutputSurfaceClient`]: the output sink contract

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod damage;
mod frame;
mod ledger;
mod output;
mod resource;

pub use damage::DamageRegion;
pub use frame::{CompositorFrame, DrawQuad, FrameMetadata, QuadMaterial, RenderPass, RenderPassId};
pub use ledger::{ReclaimReport, ReleaseCallback, ResourceLedger};
pub use output::{OutputSurface, OutputSurfaceClient, SwapError};
pub use resource::{
    FrameAck, Mailbox, ResourceId, ReturnedResource, SyncToken, TextureMailbox,
    TransferableResource,
};
