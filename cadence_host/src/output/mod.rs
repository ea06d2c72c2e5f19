// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output sink implementations.
//!
//! - [`SoftwareOutputSurface`]: presents into a shared-memory target and
//!   acknowledges every frame before `swap_buffers` returns.
//! - [`DelegatingOutputSurface`]: forwards frames to a [`ParentCompositor`]
//!   over a channel. Acknowledgements carry sync tokens and arrive whenever
//!   the parent gets to them.
//! - [`FakeOutputSurface`]: a scriptable double for tests.
//!
//! All of them share their observable state through a small handle guarded
//! by a [`parking_lot::Mutex`], so the embedder (or a test) can inspect a
//! sink after handing it to the compositor.

mod delegating;
mod fake;
mod software;

pub use delegating::{DelegatingOutputSurface, ParentCompositor};
pub use fake::{FakeOutputHandle, FakeOutputSurface};
pub use software::{SoftwareOutputHandle, SoftwareOutputSurface};
