// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use core::slice;

use super::id::LayerId;
use super::store::LayerStore;

/// An iterator over the direct children of a layer, front to back.
///
/// Created by [`LayerStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a LayerStore,
    slots: slice::Iter<'a, u32>,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a LayerStore, slots: &'a [u32]) -> Self {
        Self {
            store,
            slots: slots.iter(),
        }
    }
}

impl Iterator for Children<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        self.slots.next().map(|&slot| self.store.id_at(slot))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for Children<'_> {}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<LayerId> {
        self.slots.next_back().map(|&slot| self.store.id_at(slot))
    }
}

/// An iterator over the ancestors of a layer, nearest first.
///
/// Created by [`LayerStore::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    store: &'a LayerStore,
    next: Option<u32>,
}

impl Iterator for Ancestors<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        let slot = self.next?;
        self.next = self.store.links[slot as usize].parent;
        Some(self.store.id_at(slot))
    }
}

impl LayerStore {
    /// Returns an iterator over the ancestors of `id`, excluding `id` itself.
    #[must_use]
    pub fn ancestors(&self, id: LayerId) -> Ancestors<'_> {
        self.validate(id);
        Ancestors {
            store: self,
            next: self.links[id.idx as usize].parent,
        }
    }

    /// Returns whether `id` is reachable from the root and would therefore
    /// be pushed by the next commit.
    #[must_use]
    pub fn is_attached(&self, id: LayerId) -> bool {
        self.validate(id);
        if id.idx == self.root {
            return true;
        }
        self.ancestors(id)
            .last()
            .is_some_and(|top| top.idx == self.root)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn ancestors_walk_to_the_top() {
        let mut store = LayerStore::new();
        let a = store.create_layer();
        let b = store.create_layer();
        let c = store.create_layer();
        store.add_child(a, b);
        store.add_child(b, c);
        let chain: Vec<_> = store.ancestors(c).collect();
        assert_eq!(chain, vec![b, a]);
    }

    #[test]
    fn children_iterate_both_ways() {
        let mut store = LayerStore::new();
        let parent = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        store.add_child(parent, a);
        store.add_child(parent, b);
        assert_eq!(store.children(parent).len(), 2);
        let back: Vec<_> = store.children(parent).rev().collect();
        assert_eq!(back, vec![b, a]);
    }

    #[test]
    fn attachment_follows_root() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let child = store.create_layer();
        store.add_child(root, child);
        assert!(!store.is_attached(child));
        store.set_root(Some(root));
        assert!(store.is_attached(root));
        assert!(store.is_attached(child));
    }
}
