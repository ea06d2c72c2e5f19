// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Main-side layer storage: slot allocation, ordered topology, and
//! per-layer properties kept in parallel columns.

use alloc::vec::Vec;

use kurbo::{Affine, Size, Vec2};

use super::id::{INVALID, LayerId, TreeId};
use super::properties::{LayerFlags, LayerProperties, TreePriority, TreeProperties};
use super::traverse::Children;
use crate::dirty::{self, DirtyChannels};

/// Parent and ordered children of one slot.
#[derive(Clone, Debug, Default)]
pub(crate) struct Links {
    pub(crate) parent: Option<u32>,
    pub(crate) children: Vec<u32>,
}

/// The main-side layer tree model.
///
/// Callers hold [`LayerId`] handles; the store maps each to a slot whose
/// properties live in per-property columns. Freed slots are reused, and each
/// reuse bumps the slot's generation so handles to the previous occupant are
/// rejected.
///
/// Only the subtree under the designated [root](Self::set_root) is committed
/// to the impl side. Detached layers stay alive (and keep their properties)
/// until they are destroyed or re-attached.
#[derive(Debug)]
pub struct LayerStore {
    pub(crate) owner: TreeId,

    pub(crate) links: Vec<Links>,
    pub(crate) root: u32,

    // Per-layer property columns, indexed by slot.
    pub(crate) bounds: Vec<Size>,
    pub(crate) transform: Vec<Affine>,
    pub(crate) opacity: Vec<f32>,
    pub(crate) draws_content: Vec<bool>,
    pub(crate) background_color: Vec<[f32; 4]>,
    pub(crate) layer_flags: Vec<LayerFlags>,
    pub(crate) scroll_offset: Vec<Vec2>,

    pub(crate) tree: TreeProperties,
    pub(crate) tree_dirty: bool,

    // Slot bookkeeping.
    pub(crate) generations: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) vacant: Vec<u32>,

    pub(crate) dirty: DirtyChannels,

    /// Pre-order slots under the root, rebuilt lazily after topology edits.
    pub(crate) order: Vec<u32>,
    pub(crate) order_stale: bool,

    /// Layers pushed by the previous `take_changes`, in traversal order.
    pub(crate) committed: Vec<LayerId>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store with a fresh [`TreeId`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            owner: TreeId::next(),
            links: Vec::new(),
            root: INVALID,
            bounds: Vec::new(),
            transform: Vec::new(),
            opacity: Vec::new(),
            draws_content: Vec::new(),
            background_color: Vec::new(),
            layer_flags: Vec::new(),
            scroll_offset: Vec::new(),
            tree: TreeProperties::default(),
            tree_dirty: true,
            generations: Vec::new(),
            alive: Vec::new(),
            vacant: Vec::new(),
            dirty: DirtyChannels::default(),
            order: Vec::new(),
            order_stale: true,
            committed: Vec::new(),
        }
    }

    /// Returns the id of this tree model.
    #[must_use]
    pub fn tree_id(&self) -> TreeId {
        self.owner
    }

    fn slot_count(&self) -> u32 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot indices are u32 by construction"
        )]
        let n = self.links.len() as u32;
        n
    }

    // -- Lifetime --

    /// Allocates a layer with default properties and no parent.
    ///
    /// The layer starts with zero bounds, an identity transform, full
    /// opacity and no content.
    pub fn create_layer(&mut self) -> LayerId {
        let defaults = LayerProperties::default();
        let slot = match self.vacant.pop() {
            Some(slot) => {
                let i = slot as usize;
                self.generations[i] += 1;
                self.alive[i] = true;
                self.links[i] = Links::default();
                self.write_properties(slot, &defaults);
                slot
            }
            None => {
                let slot = self.slot_count();
                self.links.push(Links::default());
                self.bounds.push(defaults.bounds);
                self.transform.push(defaults.transform);
                self.opacity.push(defaults.opacity);
                self.draws_content.push(defaults.draws_content);
                self.background_color.push(defaults.background_color);
                self.layer_flags.push(defaults.flags);
                self.scroll_offset.push(defaults.scroll_offset);
                self.generations.push(0);
                self.alive.push(true);
                slot
            }
        };
        self.topology_changed(slot);
        self.id_at(slot)
    }

    /// Destroys a childless layer. Destroying the root leaves the tree
    /// without one.
    ///
    /// # Panics
    ///
    /// Panics if the layer has children (remove them first, or use
    /// [`destroy_subtree`](Self::destroy_subtree)) or if the handle is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        self.validate(id);
        assert!(
            self.links[id.idx as usize].children.is_empty(),
            "cannot destroy layer with children"
        );
        self.release_slot(id.idx);
    }

    /// Detaches `id` from its parent (if any) and destroys it together with
    /// all of its descendants.
    ///
    /// Returns the destroyed handles in depth-first pre-order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_subtree(&mut self, id: LayerId) -> Vec<LayerId> {
        self.validate(id);
        if self.links[id.idx as usize].parent.is_some() {
            self.remove_from_parent(id);
        }
        let mut slots = Vec::new();
        self.collect_preorder(id.idx, &mut slots);
        let destroyed = slots.iter().map(|&slot| self.id_at(slot)).collect();
        for &slot in &slots {
            self.links[slot as usize] = Links::default();
            self.release_slot(slot);
        }
        destroyed
    }

    /// Returns whether `id` names a live layer of this tree.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        id.owner == self.owner
            && id.idx < self.slot_count()
            && self.alive[id.idx as usize]
            && self.generations[id.idx as usize] == id.generation
    }

    /// Returns the number of live layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.links.len() - self.vacant.len()
    }

    // -- Root --

    /// Designates the root of the committed tree, or clears it.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer has a parent.
    pub fn set_root(&mut self, root: Option<LayerId>) {
        let slot = root.map_or(INVALID, |id| {
            self.validate(id);
            assert!(
                self.links[id.idx as usize].parent.is_none(),
                "root layer must not have a parent"
            );
            id.idx
        });
        if slot == self.root {
            return;
        }
        self.root = slot;
        self.order_stale = true;
        if slot != INVALID {
            self.dirty.mark(slot, dirty::TOPOLOGY);
        }
    }

    /// Returns the root layer, if one is set.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        (self.root != INVALID).then(|| self.id_at(self.root))
    }

    // -- Topology --

    /// Appends `child` to the children of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, if `child` already has a parent, or
    /// if `child` is the root.
    pub fn add_child(&mut self, parent: LayerId, child: LayerId) {
        self.validate(parent);
        self.validate(child);
        self.assert_attachable(child.idx);
        assert!(
            !self.is_ancestor_or_self(child.idx, parent.idx),
            "cannot attach a layer under itself"
        );
        let at = self.links[parent.idx as usize].children.len();
        self.attach(parent.idx, child.idx, at);
    }

    /// Detaches `child` from its parent.
    ///
    /// The layer stays alive but is no longer part of the committed tree.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer has no parent.
    pub fn remove_from_parent(&mut self, child: LayerId) {
        self.validate(child);
        let Some(parent) = self.detach(child.idx) else {
            panic!("layer has no parent");
        };
        self.topology_changed(parent);
        self.dirty.mark(child.idx, dirty::TOPOLOGY);
    }

    /// Moves `child` to the end of `new_parent`'s children, detaching it
    /// from its current parent first.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, if `new_parent` is `child` or one of
    /// its descendants, or if `child` is the root.
    pub fn reparent(&mut self, child: LayerId, new_parent: LayerId) {
        self.validate(child);
        self.validate(new_parent);
        assert!(
            !self.is_ancestor_or_self(child.idx, new_parent.idx),
            "cannot reparent a layer under itself"
        );
        assert!(
            child.idx != self.root,
            "cannot attach the root layer to a parent"
        );
        if let Some(old) = self.detach(child.idx) {
            self.dirty.mark(old, dirty::TOPOLOGY);
        }
        let at = self.links[new_parent.idx as usize].children.len();
        self.attach(new_parent.idx, child.idx, at);
    }

    /// Places `child` directly in front of `sibling`, under the same parent.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent or is the
    /// root, or `sibling` has no parent.
    pub fn insert_before(&mut self, child: LayerId, sibling: LayerId) {
        self.validate(child);
        self.validate(sibling);
        self.assert_attachable(child.idx);
        let Some(parent) = self.links[sibling.idx as usize].parent else {
            panic!("sibling has no parent");
        };
        let at = self.position_in_parent(parent, sibling.idx);
        self.attach(parent, child.idx, at);
    }

    /// Returns the parent of a layer, if any.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.links[id.idx as usize]
            .parent
            .map(|slot| self.id_at(slot))
    }

    /// Returns the direct children of a layer, front to back.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Children<'_> {
        self.validate(id);
        Children::new(self, &self.links[id.idx as usize].children)
    }

    // -- Reads --

    /// Returns all local properties of a layer.
    #[must_use]
    pub fn properties(&self, id: LayerId) -> LayerProperties {
        self.validate(id);
        self.properties_at(id.idx)
    }

    /// Returns the bounds of a layer.
    #[must_use]
    pub fn bounds(&self, id: LayerId) -> Size {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns the local transform of a layer.
    #[must_use]
    pub fn transform(&self, id: LayerId) -> Affine {
        self.validate(id);
        self.transform[id.idx as usize]
    }

    /// Returns the local opacity of a layer.
    #[must_use]
    pub fn opacity(&self, id: LayerId) -> f32 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Returns whether the layer draws content.
    #[must_use]
    pub fn draws_content(&self, id: LayerId) -> bool {
        self.validate(id);
        self.draws_content[id.idx as usize]
    }

    /// Returns the flags of a layer.
    #[must_use]
    pub fn flags(&self, id: LayerId) -> LayerFlags {
        self.validate(id);
        self.layer_flags[id.idx as usize]
    }

    /// Returns the scroll offset of a layer.
    #[must_use]
    pub fn scroll_offset(&self, id: LayerId) -> Vec2 {
        self.validate(id);
        self.scroll_offset[id.idx as usize]
    }

    // -- Writes --
    //
    // A setter marks its dirty category only when the value changes.

    /// Sets the bounds of a layer.
    pub fn set_bounds(&mut self, id: LayerId, bounds: Size) {
        self.validate(id);
        if self.bounds[id.idx as usize] != bounds {
            self.bounds[id.idx as usize] = bounds;
            self.dirty.mark(id.idx, dirty::BOUNDS);
        }
    }

    /// Sets the local transform of a layer.
    pub fn set_transform(&mut self, id: LayerId, transform: Affine) {
        self.validate(id);
        if self.transform[id.idx as usize] != transform {
            self.transform[id.idx as usize] = transform;
            self.dirty.mark(id.idx, dirty::TRANSFORM);
        }
    }

    /// Sets the local opacity of a layer, clamped to `0.0..=1.0`.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        self.validate(id);
        let opacity = opacity.clamp(0.0, 1.0);
        if self.opacity[id.idx as usize] != opacity {
            self.opacity[id.idx as usize] = opacity;
            self.dirty.mark(id.idx, dirty::OPACITY);
        }
    }

    /// Sets whether the layer draws content of its own.
    pub fn set_draws_content(&mut self, id: LayerId, draws_content: bool) {
        self.validate(id);
        if self.draws_content[id.idx as usize] != draws_content {
            self.draws_content[id.idx as usize] = draws_content;
            self.dirty.mark(id.idx, dirty::CONTENT);
        }
    }

    /// Sets the solid background color of a layer.
    pub fn set_background_color(&mut self, id: LayerId, color: [f32; 4]) {
        self.validate(id);
        if self.background_color[id.idx as usize] != color {
            self.background_color[id.idx as usize] = color;
            self.dirty.mark(id.idx, dirty::CONTENT);
        }
    }

    /// Sets the flags of a layer.
    pub fn set_flags(&mut self, id: LayerId, flags: LayerFlags) {
        self.validate(id);
        if self.layer_flags[id.idx as usize] != flags {
            self.layer_flags[id.idx as usize] = flags;
            self.dirty.mark(id.idx, dirty::FLAGS);
        }
    }

    /// Sets the scroll offset of a layer.
    pub fn set_scroll_offset(&mut self, id: LayerId, offset: Vec2) {
        self.validate(id);
        if self.scroll_offset[id.idx as usize] != offset {
            self.scroll_offset[id.idx as usize] = offset;
            self.dirty.mark(id.idx, dirty::SCROLL);
        }
    }

    /// Marks a layer's content as changed without touching any property.
    ///
    /// Used when something stored outside the tree model (such as an
    /// attached texture) changed and must be pushed with the next commit.
    pub fn mark_content_changed(&mut self, id: LayerId) {
        self.validate(id);
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    // -- Tree-wide properties --

    /// Returns the tree-wide properties.
    #[must_use]
    pub fn tree_properties(&self) -> &TreeProperties {
        &self.tree
    }

    /// Sets the viewport size in device pixels.
    pub fn set_viewport_size(&mut self, size: Size) {
        if self.tree.viewport_size != size {
            self.tree.viewport_size = size;
            self.tree_dirty = true;
        }
    }

    /// Sets the device scale factor.
    pub fn set_device_scale_factor(&mut self, scale: f32) {
        if self.tree.device_scale_factor != scale {
            self.tree.device_scale_factor = scale;
            self.tree_dirty = true;
        }
    }

    /// Sets the page scale factor.
    pub fn set_page_scale_factor(&mut self, scale: f32) {
        if self.tree.page_scale_factor != scale {
            self.tree.page_scale_factor = scale;
            self.tree_dirty = true;
        }
    }

    /// Sets the color drawn behind all layers.
    pub fn set_tree_background_color(&mut self, color: [f32; 4]) {
        if self.tree.background_color != color {
            self.tree.background_color = color;
            self.tree_dirty = true;
        }
    }

    /// Sets the tree priority hint.
    pub fn set_tree_priority(&mut self, priority: TreePriority) {
        if self.tree.priority != priority {
            self.tree.priority = priority;
            self.tree_dirty = true;
        }
    }

    /// Returns whether anything changed since the last
    /// [`take_changes`](Self::take_changes).
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.tree_dirty || self.order_stale || !self.dirty.is_clean()
    }

    // -- Slot access --
    //
    // Raw slot indices come from `LayerChanges` or the traversal order and
    // are trusted; generations are not checked.

    /// Returns the handle for the live layer at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not an allocated slot.
    #[must_use]
    pub fn id_at(&self, idx: u32) -> LayerId {
        self.assert_slot(idx);
        LayerId {
            owner: self.owner,
            idx,
            generation: self.generations[idx as usize],
        }
    }

    /// Returns the parent slot of raw slot `idx`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not an allocated slot.
    #[must_use]
    pub fn parent_at(&self, idx: u32) -> Option<u32> {
        self.assert_slot(idx);
        self.links[idx as usize].parent
    }

    /// Returns all local properties at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not an allocated slot.
    #[must_use]
    pub fn properties_at(&self, idx: u32) -> LayerProperties {
        self.assert_slot(idx);
        let i = idx as usize;
        LayerProperties {
            bounds: self.bounds[i],
            transform: self.transform[i],
            opacity: self.opacity[i],
            draws_content: self.draws_content[i],
            background_color: self.background_color[i],
            flags: self.layer_flags[i],
            scroll_offset: self.scroll_offset[i],
        }
    }

    // -- Internals --

    #[track_caller]
    fn assert_slot(&self, idx: u32) {
        assert!(
            idx < self.slot_count(),
            "slot {idx} was never allocated ({} slots)",
            self.links.len()
        );
    }

    /// Panics if the handle is stale or belongs to another tree.
    #[track_caller]
    pub(crate) fn validate(&self, id: LayerId) {
        assert!(
            id.owner == self.owner,
            "LayerId {id:?} belongs to another tree (this is {:?})",
            self.owner
        );
        let current = self.generations.get(id.idx as usize).copied();
        assert!(
            current == Some(id.generation) && self.alive[id.idx as usize],
            "stale LayerId: {id:?} (slot generation {current:?})"
        );
    }

    #[track_caller]
    fn assert_attachable(&self, slot: u32) {
        assert!(
            self.links[slot as usize].parent.is_none(),
            "child already has a parent"
        );
        assert!(slot != self.root, "cannot attach the root layer to a parent");
    }

    fn write_properties(&mut self, slot: u32, props: &LayerProperties) {
        let i = slot as usize;
        self.bounds[i] = props.bounds;
        self.transform[i] = props.transform;
        self.opacity[i] = props.opacity;
        self.draws_content[i] = props.draws_content;
        self.background_color[i] = props.background_color;
        self.layer_flags[i] = props.flags;
        self.scroll_offset[i] = props.scroll_offset;
    }

    fn topology_changed(&mut self, slot: u32) {
        self.order_stale = true;
        self.dirty.mark(slot, dirty::TOPOLOGY);
    }

    /// Frees a childless slot and invalidates every handle to it.
    fn release_slot(&mut self, slot: u32) {
        if let Some(parent) = self.detach(slot) {
            self.dirty.mark(parent, dirty::TOPOLOGY);
        }
        if self.root == slot {
            self.root = INVALID;
        }
        self.dirty.remove_key(slot);
        self.generations[slot as usize] += 1;
        self.alive[slot as usize] = false;
        self.vacant.push(slot);
        self.order_stale = true;
    }

    fn attach(&mut self, parent: u32, child: u32, at: usize) {
        self.links[child as usize].parent = Some(parent);
        self.links[parent as usize].children.insert(at, child);
        self.topology_changed(parent);
        self.dirty.mark(child, dirty::TOPOLOGY);
    }

    /// Unlinks `slot` from its parent without marking anything dirty.
    /// Returns the former parent.
    fn detach(&mut self, slot: u32) -> Option<u32> {
        let parent = self.links[slot as usize].parent.take()?;
        let at = self.position_in_parent(parent, slot);
        self.links[parent as usize].children.remove(at);
        Some(parent)
    }

    fn position_in_parent(&self, parent: u32, child: u32) -> usize {
        self.links[parent as usize]
            .children
            .iter()
            .position(|&slot| slot == child)
            .unwrap_or_else(|| unreachable!("slot {child} missing from its parent's children"))
    }

    fn is_ancestor_or_self(&self, ancestor: u32, slot: u32) -> bool {
        let mut current = Some(slot);
        while let Some(slot) = current {
            if slot == ancestor {
                return true;
            }
            current = self.links[slot as usize].parent;
        }
        false
    }

    /// Appends `slot` and its descendants to `out` in depth-first pre-order.
    pub(crate) fn collect_preorder(&self, slot: u32, out: &mut Vec<u32>) {
        let mut stack = alloc::vec![slot];
        while let Some(slot) = stack.pop() {
            out.push(slot);
            stack.extend(self.links[slot as usize].children.iter().rev());
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn create_and_destroy() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        assert!(store.is_alive(id));
        assert_eq!(store.layer_count(), 1);
        store.destroy_layer(id);
        assert!(!store.is_alive(id));
        assert_eq!(store.layer_count(), 0);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = LayerStore::new();
        let id1 = store.create_layer();
        store.destroy_layer(id1);
        let id2 = store.create_layer();
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn reused_slot_starts_with_default_properties() {
        let mut store = LayerStore::new();
        let id1 = store.create_layer();
        store.set_opacity(id1, 0.25);
        store.set_draws_content(id1, true);
        store.destroy_layer(id1);
        let id2 = store.create_layer();
        assert_eq!(store.properties(id2), LayerProperties::default());
    }

    #[test]
    fn add_child_and_query() {
        let mut store = LayerStore::new();
        let parent = store.create_layer();
        let child1 = store.create_layer();
        let child2 = store.create_layer();

        store.add_child(parent, child1);
        store.add_child(parent, child2);

        assert_eq!(store.parent(child1), Some(parent));
        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, vec![child1, child2]);
    }

    #[test]
    fn remove_from_parent_keeps_layer_alive() {
        let mut store = LayerStore::new();
        let parent = store.create_layer();
        let child = store.create_layer();

        store.add_child(parent, child);
        store.remove_from_parent(child);
        assert_eq!(store.parent(child), None);
        assert!(store.children(parent).next().is_none());
        assert!(store.is_alive(child));
    }

    #[test]
    fn insert_before_works() {
        let mut store = LayerStore::new();
        let parent = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        let c = store.create_layer();

        store.add_child(parent, a);
        store.add_child(parent, c);
        store.insert_before(b, c);

        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, vec![a, b, c]);
    }

    #[test]
    fn reparent_works() {
        let mut store = LayerStore::new();
        let p1 = store.create_layer();
        let p2 = store.create_layer();
        let child = store.create_layer();

        store.add_child(p1, child);
        store.reparent(child, p2);
        assert_eq!(store.parent(child), Some(p2));
        assert!(store.children(p1).next().is_none());
    }

    #[test]
    #[should_panic(expected = "cannot reparent a layer under itself")]
    fn reparent_into_descendant_panics() {
        let mut store = LayerStore::new();
        let a = store.create_layer();
        let b = store.create_layer();
        store.add_child(a, b);
        store.reparent(a, b);
    }

    #[test]
    #[should_panic(expected = "cannot attach a layer under itself")]
    fn attaching_an_ancestor_panics() {
        let mut store = LayerStore::new();
        let a = store.create_layer();
        let b = store.create_layer();
        store.add_child(a, b);
        store.add_child(b, a);
    }

    #[test]
    fn destroy_subtree_frees_descendants() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let mid = store.create_layer();
        let leaf = store.create_layer();
        store.set_root(Some(root));
        store.add_child(root, mid);
        store.add_child(mid, leaf);

        let destroyed = store.destroy_subtree(mid);
        assert_eq!(destroyed, vec![mid, leaf]);
        assert!(!store.is_alive(mid));
        assert!(!store.is_alive(leaf));
        assert!(store.children(root).next().is_none());
    }

    #[test]
    fn destroying_root_clears_it() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        store.set_root(Some(root));
        store.destroy_layer(root);
        assert_eq!(store.root(), None);
    }

    #[test]
    #[should_panic(expected = "root layer must not have a parent")]
    fn parented_root_panics() {
        let mut store = LayerStore::new();
        let a = store.create_layer();
        let b = store.create_layer();
        store.add_child(a, b);
        store.set_root(Some(b));
    }

    #[test]
    #[should_panic(expected = "cannot destroy layer with children")]
    fn destroy_with_children_panics() {
        let mut store = LayerStore::new();
        let parent = store.create_layer();
        let child = store.create_layer();
        store.add_child(parent, child);
        store.destroy_layer(parent);
    }

    #[test]
    #[should_panic(expected = "stale LayerId")]
    fn destroyed_handle_panics_on_set_opacity() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        store.destroy_layer(id);
        store.set_opacity(id, 0.5);
    }

    #[test]
    #[should_panic(expected = "belongs to another tree")]
    fn foreign_handle_panics() {
        let mut a = LayerStore::new();
        let b = LayerStore::new();
        let id = a.create_layer();
        let _ = b.bounds(id);
    }

    #[test]
    fn redundant_set_does_not_dirty() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        store.set_opacity(id, 0.5);
        let _ = store.take_changes();
        assert!(!store.has_pending_changes());

        store.set_opacity(id, 0.5);
        store.set_transform(id, Affine::IDENTITY);
        assert!(!store.has_pending_changes());

        store.set_opacity(id, 2.0);
        assert!(store.has_pending_changes());
        assert_eq!(store.opacity(id), 1.0);
    }

    #[test]
    fn tree_properties_dirty_the_store() {
        let mut store = LayerStore::new();
        let _ = store.take_changes();
        store.set_viewport_size(Size::new(800.0, 600.0));
        assert!(store.has_pending_changes());
        let changes = store.take_changes();
        assert!(changes.tree_properties_changed);
        store.set_viewport_size(Size::new(800.0, 600.0));
        assert!(!store.has_pending_changes());
    }
}
