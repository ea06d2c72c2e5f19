// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channels for the main-side layer tree.
//!
//! Every property mutation on a [`LayerStore`](crate::layer::LayerStore)
//! marks the layer's slot in one channel. The next commit drains each
//! channel and pushes only the marked properties to the impl side, so a
//! frame in which nothing changed produces an empty commit.
//!
//! Channels are local-only: marking a layer never marks its descendants.
//! Inherited values (screen-space transform, draw opacity, effective
//! hidden) are recomputed on the impl side from the pushed local values.
//!
//! Drains yield slot indices in ascending order so that commits are
//! deterministic.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

/// Identifies one category of layer change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local transform changed.
pub const TRANSFORM: Channel = Channel(0);

/// Opacity changed.
pub const OPACITY: Channel = Channel(1);

/// Bounds changed.
pub const BOUNDS: Channel = Channel(2);

/// Drawable flag, background color, or attached texture changed.
pub const CONTENT: Channel = Channel(3);

/// Hidden flag changed.
pub const FLAGS: Channel = Channel(4);

/// Scroll offset changed.
pub const SCROLL: Channel = Channel(5);

/// Tree topology changed (layer created, destroyed, attached or detached).
pub const TOPOLOGY: Channel = Channel(6);

const CHANNEL_COUNT: usize = 7;

/// Per-channel sets of dirty slot indices.
#[derive(Clone, Debug, Default)]
pub(crate) struct DirtyChannels {
    sets: [BTreeSet<u32>; CHANNEL_COUNT],
}

impl DirtyChannels {
    pub(crate) fn mark(&mut self, idx: u32, channel: Channel) {
        self.sets[channel.index()].insert(idx);
    }

    /// Forgets `idx` in every channel.
    pub(crate) fn remove_key(&mut self, idx: u32) {
        for set in &mut self.sets {
            set.remove(&idx);
        }
    }

    /// Takes the dirty indices of one channel in ascending order.
    pub(crate) fn drain(&mut self, channel: Channel) -> Vec<u32> {
        core::mem::take(&mut self.sets[channel.index()])
            .into_iter()
            .collect()
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.sets.iter().all(BTreeSet::is_empty)
    }
}
