// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime errors.
//!
//! Only conditions the embedder can act on are errors. Output sink failures
//! arrive as [`LayerTreeHostClient`](crate::LayerTreeHostClient) callbacks,
//! and lifecycle misuse panics.

use std::io;

/// Convenience result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors reported by [`LayerTreeHost`](crate::LayerTreeHost).
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The impl thread could not be started.
    #[error("failed to spawn the impl thread")]
    SpawnImplThread(#[source] io::Error),

    /// The begin-frame timer thread could not be started.
    #[error("failed to spawn the begin-frame thread")]
    SpawnBeginFrameThread(#[source] io::Error),

    /// The impl context exited (or panicked) while the main context was
    /// waiting on it.
    #[error("impl context is gone")]
    ImplGone,
}
