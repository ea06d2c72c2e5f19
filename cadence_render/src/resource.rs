// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transferable resources and their acknowledgement protocol.
//!
//! A resource crosses from the producer to a consumer (the output sink or a
//! parent compositor) inside a [`CompositorFrame`](crate::CompositorFrame)
//! as a [`TransferableResource`]. The consumer sends it back in a
//! [`FrameAck`] once it no longer reads from it, together with a
//! [`SyncToken`] the producer must wait on before reusing the memory.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Size;

/// Identifies a resource within one [`ResourceLedger`](crate::ResourceLedger).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u32);

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

/// Cross-context name of a GPU or shared-memory buffer.
///
/// Assigned by whoever allocated the buffer. Opaque to the compositor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mailbox(pub u64);

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mailbox({:#x})", self.0)
    }
}

/// A point in a context's command stream that must be reached before a
/// resource may be touched by another context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SyncToken {
    /// Context that produced the token.
    pub namespace: u32,
    /// Monotonic release count within that context.
    pub release_count: u64,
}

impl SyncToken {
    /// A token that requires no waiting.
    pub const EMPTY: Self = Self {
        namespace: 0,
        release_count: 0,
    };

    /// Creates a token.
    #[must_use]
    pub const fn new(namespace: u32, release_count: u64) -> Self {
        Self {
            namespace,
            release_count,
        }
    }

    /// Returns whether the token requires no waiting.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.release_count == 0
    }
}

/// A buffer supplied from outside the compositor, such as an embedder's
/// video frame or a canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureMailbox {
    /// Name of the buffer.
    pub mailbox: Mailbox,
    /// Token to wait on before reading.
    pub sync_token: SyncToken,
    /// Pixel size.
    pub size: Size,
    /// Whether the buffer lives in shared memory rather than on the GPU.
    pub is_software: bool,
}

impl TextureMailbox {
    /// Creates a GPU texture mailbox with no pending sync token.
    #[must_use]
    pub const fn gpu(mailbox: Mailbox, size: Size) -> Self {
        Self {
            mailbox,
            sync_token: SyncToken::EMPTY,
            size,
            is_software: false,
        }
    }
}

/// A resource as it travels inside a compositor frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransferableResource {
    /// Ledger id, echoed back in the acknowledgement.
    pub id: ResourceId,
    /// Name of the buffer.
    pub mailbox: Mailbox,
    /// Token the consumer must wait on before reading.
    pub sync_token: SyncToken,
    /// Pixel size.
    pub size: Size,
    /// Whether the buffer lives in shared memory.
    pub is_software: bool,
}

/// A resource handed back by the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReturnedResource {
    /// Ledger id from the frame.
    pub id: ResourceId,
    /// Token the producer must wait on before reusing the buffer.
    pub sync_token: SyncToken,
    /// How many sends of this resource are being returned.
    pub count: u32,
    /// Whether the consumer lost the contents (for example on context loss).
    pub lost: bool,
}

impl ReturnedResource {
    /// Returns a single send of `resource`, not lost.
    #[must_use]
    pub const fn from_transferable(resource: &TransferableResource, sync_token: SyncToken) -> Self {
        Self {
            id: resource.id,
            sync_token,
            count: 1,
            lost: false,
        }
    }
}

/// Acknowledgement from a frame consumer.
///
/// Lists the resources that are now safe to reuse. Resources not listed stay
/// in flight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameAck {
    /// Resources handed back.
    pub resources: Vec<ReturnedResource>,
}

impl FrameAck {
    /// An acknowledgement returning nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Builds an acknowledgement returning every resource in `resources`.
    #[must_use]
    pub fn returning(resources: &[TransferableResource], sync_token: SyncToken) -> Self {
        Self {
            resources: resources
                .iter()
                .map(|r| ReturnedResource::from_transferable(r, sync_token))
                .collect(),
        }
    }

    /// Marks every returned resource as lost.
    #[must_use]
    pub fn lost(mut self) -> Self {
        for r in &mut self.resources {
            r.lost = true;
        }
        self
    }
}
