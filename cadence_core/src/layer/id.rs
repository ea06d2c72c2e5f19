// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer and tree identity types.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Sentinel value indicating "no layer" in index fields.
pub const INVALID: u32 = u32::MAX;

static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies one [`LayerStore`](super::LayerStore).
///
/// Every [`LayerId`] carries the id of the store that created it, so a
/// handle from one tree model is rejected by another.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeId(pub(crate) u32);

impl TreeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeId({})", self.0)
    }
}

/// A handle to a layer in a [`LayerStore`](super::LayerStore).
///
/// Contains the owning tree, a slot index and a generation counter so that
/// stale handles can be detected after a layer is destroyed and its slot is
/// reused. The same value identifies the layer's impl-side counterparts
/// after commit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId {
    /// Owning tree model.
    pub(crate) owner: TreeId,
    /// Slot index into the store's arrays.
    pub(crate) idx: u32,
    /// Generation counter; must match the store's generation for this slot.
    pub(crate) generation: u32,
}

impl LayerId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns the tree model this layer belongs to.
    #[inline]
    #[must_use]
    pub const fn owner(self) -> TreeId {
        self.owner
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LayerId({}@gen{} in tree {})",
            self.idx, self.generation, self.owner.0
        )
    }
}
