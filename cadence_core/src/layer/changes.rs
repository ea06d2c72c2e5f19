// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commit-time change extraction.
//!
//! [`LayerStore::take_changes`] is called once per commit. It:
//!
//! 1. Rebuilds the traversal order of the rooted subtree if topology changed.
//! 2. Diffs the new traversal against the layers pushed by the previous
//!    commit, producing `added` (entered the committed tree) and `removed`
//!    (left it, or were destroyed).
//! 3. Drains every property channel. Dirty layers that are part of the
//!    committed tree become `updated`. Dirty layers outside it are dropped;
//!    if they are attached later they show up in `added`, which always
//!    carries a full property snapshot.
//!
//! [`LayerChanges`] uses raw slot indices for layers that are alive so that
//! the commit builder can read the property columns through the `*_at()`
//! accessors. Removed layers are reported as [`LayerId`] handles because
//! their slots may already have been reused.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use super::id::{INVALID, LayerId};
use super::store::LayerStore;
use crate::dirty;

/// The changes accumulated on a [`LayerStore`] since the previous commit.
#[derive(Clone, Debug, Default)]
pub struct LayerChanges {
    /// Layers in the committed tree whose local properties changed.
    ///
    /// Sorted by slot index. Disjoint from `added`.
    pub updated: Vec<u32>,
    /// Layers that entered the committed tree, in traversal order.
    pub added: Vec<u32>,
    /// Layers that left the committed tree.
    pub removed: Vec<LayerId>,
    /// Whether the shape of the committed tree changed.
    pub topology_changed: bool,
    /// Whether any tree-wide property changed.
    pub tree_properties_changed: bool,
}

impl LayerChanges {
    /// Returns whether the commit would not change anything on the impl side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && !self.topology_changed
            && !self.tree_properties_changed
    }

    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.updated.clear();
        self.added.clear();
        self.removed.clear();
        self.topology_changed = false;
        self.tree_properties_changed = false;
    }
}

/// Property channels drained into `updated`.
const PROPERTY_CHANNELS: [dirty::Channel; 6] = [
    dirty::TRANSFORM,
    dirty::OPACITY,
    dirty::BOUNDS,
    dirty::CONTENT,
    dirty::FLAGS,
    dirty::SCROLL,
];

impl LayerStore {
    /// Extracts and resets everything that changed since the last call.
    pub fn take_changes(&mut self) -> LayerChanges {
        let mut changes = LayerChanges::default();
        self.take_changes_into(&mut changes);
        changes
    }

    /// Like [`take_changes`](Self::take_changes), but reuses a
    /// caller-provided buffer.
    pub fn take_changes_into(&mut self, changes: &mut LayerChanges) {
        changes.clear();

        if self.order_stale {
            self.rebuild_order();
            self.order_stale = false;
        }

        let current: Vec<LayerId> = self
            .order
            .iter()
            .map(|&idx| self.id_at(idx))
            .collect();
        let in_tree: BTreeSet<u32> = self.order.iter().copied().collect();
        // A reparent can keep the pre-order sequence intact, so topology
        // marks inside the committed tree count as well.
        let topology_marked = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .iter()
            .any(|idx| in_tree.contains(idx));
        changes.topology_changed = topology_marked || current != self.committed;

        if changes.topology_changed {
            let previous: BTreeSet<LayerId> = self.committed.iter().copied().collect();
            let now: BTreeSet<LayerId> = current.iter().copied().collect();
            changes.added = self
                .order
                .iter()
                .copied()
                .filter(|&idx| !previous.contains(&self.id_at(idx)))
                .collect();
            changes.removed = self
                .committed
                .iter()
                .copied()
                .filter(|id| !now.contains(id))
                .collect();
        }

        let mut dirty_slots = BTreeSet::new();
        for channel in PROPERTY_CHANNELS {
            dirty_slots.extend(self.dirty.drain(channel));
        }
        let added: BTreeSet<u32> = changes.added.iter().copied().collect();
        changes.updated = dirty_slots
            .into_iter()
            .filter(|idx| in_tree.contains(idx) && !added.contains(idx))
            .collect();

        changes.tree_properties_changed = self.tree_dirty;
        self.tree_dirty = false;
        self.committed = current;
    }

    /// Returns the depth-first pre-order traversal of the rooted subtree.
    ///
    /// Only valid after [`take_changes`](Self::take_changes) has been called
    /// at least once.
    #[must_use]
    pub fn traversal_order(&self) -> &[u32] {
        &self.order
    }

    fn rebuild_order(&mut self) {
        let mut order = core::mem::take(&mut self.order);
        order.clear();
        if self.root != INVALID {
            self.collect_preorder(self.root, &mut order);
        }
        self.order = order;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::{Affine, Size};

    use super::*;

    fn rooted_pair() -> (LayerStore, LayerId, LayerId) {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let child = store.create_layer();
        store.set_root(Some(root));
        store.add_child(root, child);
        (store, root, child)
    }

    #[test]
    fn first_commit_adds_whole_tree() {
        let (mut store, root, child) = rooted_pair();
        let changes = store.take_changes();
        assert!(changes.topology_changed);
        assert_eq!(changes.added, vec![root.idx, child.idx]);
        assert!(changes.updated.is_empty());
        assert!(changes.removed.is_empty());
        assert!(changes.tree_properties_changed);
    }

    #[test]
    fn unchanged_store_produces_empty_changes() {
        let (mut store, _, _) = rooted_pair();
        let _ = store.take_changes();
        let changes = store.take_changes();
        assert!(changes.is_empty());
    }

    #[test]
    fn property_change_is_reported_once() {
        let (mut store, _, child) = rooted_pair();
        let _ = store.take_changes();

        store.set_opacity(child, 0.5);
        store.set_transform(child, Affine::translate((4.0, 0.0)));
        let changes = store.take_changes();
        assert_eq!(changes.updated, vec![child.idx]);
        assert!(!changes.topology_changed);

        assert!(store.take_changes().is_empty());
    }

    #[test]
    fn detached_layers_are_not_pushed() {
        let (mut store, _, _) = rooted_pair();
        let loose = store.create_layer();
        let _ = store.take_changes();

        store.set_bounds(loose, Size::new(10.0, 10.0));
        let changes = store.take_changes();
        assert!(changes.is_empty());
    }

    #[test]
    fn reattached_layer_comes_back_as_added() {
        let (mut store, root, child) = rooted_pair();
        let _ = store.take_changes();

        store.remove_from_parent(child);
        let changes = store.take_changes();
        assert_eq!(changes.removed, vec![child]);

        store.set_opacity(child, 0.1);
        let _ = store.take_changes();

        store.add_child(root, child);
        let changes = store.take_changes();
        assert_eq!(changes.added, vec![child.idx]);
        assert!(changes.updated.is_empty());
        assert_eq!(store.properties_at(child.idx).opacity, 0.1);
    }

    #[test]
    fn destroyed_then_reused_slot_is_removed_and_added() {
        let (mut store, root, child) = rooted_pair();
        let _ = store.take_changes();

        store.destroy_subtree(child);
        let replacement = store.create_layer();
        assert_eq!(replacement.idx, child.idx);
        store.add_child(root, replacement);

        let changes = store.take_changes();
        assert_eq!(changes.removed, vec![child]);
        assert_eq!(changes.added, vec![replacement.idx]);
    }

    #[test]
    fn sibling_reorder_is_a_topology_change() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        store.set_root(Some(root));
        store.add_child(root, a);
        store.add_child(root, b);
        let _ = store.take_changes();

        store.remove_from_parent(b);
        store.insert_before(b, a);
        let changes = store.take_changes();
        assert!(changes.topology_changed);
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
        assert_eq!(store.traversal_order(), &[root.idx, b.idx, a.idx]);
    }

    #[test]
    fn reparent_with_same_preorder_is_a_topology_change() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        store.set_root(Some(root));
        store.add_child(root, a);
        store.add_child(root, b);
        let _ = store.take_changes();

        store.reparent(b, a);
        let changes = store.take_changes();
        assert_eq!(store.traversal_order(), &[root.idx, a.idx, b.idx]);
        assert!(changes.topology_changed);
        assert!(changes.added.is_empty());
    }

    #[test]
    fn clearing_root_removes_everything() {
        let (mut store, root, child) = rooted_pair();
        let _ = store.take_changes();
        store.set_root(None);
        let changes = store.take_changes();
        assert_eq!(changes.removed, vec![root, child]);
        assert!(store.traversal_order().is_empty());
    }
}
