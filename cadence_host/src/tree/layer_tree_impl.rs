// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Impl-side layer trees.

use std::collections::{BTreeMap, BTreeSet};

use cadence_core::layer::{LayerId, TreeProperties};
use cadence_render::ResourceId;
use kurbo::{Affine, Rect, Vec2};

use super::layer_impl::{LayerImpl, LayerSignature};
use crate::commit::CommitPayload;

/// A committed snapshot of the main-side tree, as the impl side draws it.
///
/// The pending tree starts as a copy of the active tree and has one commit
/// applied to it, so activation swaps in a complete tree at once.
#[derive(Clone, Debug, Default)]
pub(crate) struct LayerTreeImpl {
    layers: BTreeMap<LayerId, LayerImpl>,
    root: Option<LayerId>,
    /// Pre-order traversal of the root's subtree; also the paint order.
    order: Vec<LayerId>,
    properties: TreeProperties,
    source_frame_number: u64,
}

impl LayerTreeImpl {
    pub(crate) fn root(&self) -> Option<LayerId> {
        self.root
    }

    pub(crate) fn properties(&self) -> &TreeProperties {
        &self.properties
    }

    pub(crate) fn source_frame_number(&self) -> u64 {
        self.source_frame_number
    }

    pub(crate) fn len(&self) -> usize {
        self.layers.len()
    }

    pub(crate) fn layer(&self, id: LayerId) -> Option<&LayerImpl> {
        self.layers.get(&id)
    }

    /// The output rectangle, in device pixels.
    pub(crate) fn viewport_rect(&self) -> Rect {
        Rect::from_origin_size((0.0, 0.0), self.properties.viewport_size)
    }

    /// Applies the layer and tree changes of one commit.
    ///
    /// Textures are not touched; see [`set_texture`](Self::set_texture).
    pub(crate) fn apply_commit(&mut self, payload: &CommitPayload) {
        for id in &payload.removed {
            self.layers.remove(id);
        }
        for snapshot in &payload.added {
            self.layers
                .insert(snapshot.id, LayerImpl::new(snapshot.id, snapshot.properties));
        }
        for snapshot in &payload.updated {
            let Some(layer) = self.layers.get_mut(&snapshot.id) else {
                panic!("commit updates {:?} which the impl tree lacks", snapshot.id);
            };
            layer.properties = snapshot.properties;
        }
        if let Some(structure) = &payload.structure {
            self.rebuild_structure(structure);
        }
        if let Some(properties) = payload.tree_properties {
            self.properties = properties;
        }
        self.root = payload.root;
        self.source_frame_number = payload.source_frame_number;
    }

    fn rebuild_structure(&mut self, structure: &[(LayerId, Option<LayerId>)]) {
        for layer in self.layers.values_mut() {
            layer.parent = None;
            layer.children.clear();
        }
        self.order.clear();
        for &(id, parent) in structure {
            if let Some(layer) = self.layers.get_mut(&id) {
                layer.parent = parent;
            }
            if let Some(parent) = parent.and_then(|p| self.layers.get_mut(&p)) {
                parent.children.push(id);
            }
            self.order.push(id);
        }
    }

    /// Attaches a texture to `layer`, returning the one it replaces.
    ///
    /// Returns `Err(texture)` if the layer is not in the tree.
    pub(crate) fn set_texture(
        &mut self,
        layer: LayerId,
        texture: Option<ResourceId>,
    ) -> Result<Option<ResourceId>, Option<ResourceId>> {
        match self.layers.get_mut(&layer) {
            Some(l) => Ok(std::mem::replace(&mut l.texture, texture)),
            None => Err(texture),
        }
    }

    /// Every texture referenced by the tree.
    pub(crate) fn textures(&self) -> BTreeSet<ResourceId> {
        self.layers.values().filter_map(|l| l.texture).collect()
    }

    /// Adds impl-side scroll deltas into the layers' base offsets.
    pub(crate) fn apply_scroll_deltas(&mut self, deltas: &BTreeMap<LayerId, Vec2>) {
        for (id, delta) in deltas {
            if let Some(layer) = self.layers.get_mut(id) {
                layer.properties.scroll_offset += *delta;
            }
        }
    }

    /// Multiplies the page scale by an impl-side delta.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "page scale factors are small and stored as f32"
    )]
    pub(crate) fn apply_page_scale_delta(&mut self, delta: f64) {
        let scale = f64::from(self.properties.page_scale_factor) * delta;
        self.properties.page_scale_factor = scale as f32;
    }

    /// Recomputes every layer's [`DrawProperties`](super::layer_impl::DrawProperties).
    ///
    /// `scroll_delta` returns the impl-side scroll not yet folded into a
    /// layer's committed offset. A layer's scroll offset moves its children,
    /// not itself.
    pub(crate) fn update_draw_properties(
        &mut self,
        scroll_delta: impl Fn(LayerId) -> Vec2,
        page_scale_delta: f64,
    ) {
        let viewport = self.viewport_rect();
        let root_scale = f64::from(self.properties.device_scale_factor)
            * f64::from(self.properties.page_scale_factor)
            * page_scale_delta;
        for &id in &self.order {
            let inherited = self
                .layers
                .get(&id)
                .and_then(|l| l.parent)
                .and_then(|p| self.layers.get(&p))
                .map(|parent| {
                    let scroll = parent.properties.scroll_offset + scroll_delta(parent.id);
                    (
                        parent.draw.screen_transform * Affine::translate(-scroll),
                        parent.draw.opacity,
                        parent.draw.hidden,
                    )
                });
            let (content_transform, opacity, hidden) =
                inherited.unwrap_or((Affine::scale(root_scale), 1.0, false));
            let Some(layer) = self.layers.get_mut(&id) else {
                continue;
            };
            let screen_transform = content_transform * layer.properties.transform;
            let content = layer.content_rect();
            layer.draw.screen_transform = screen_transform;
            layer.draw.opacity = opacity * layer.properties.opacity.clamp(0.0, 1.0);
            layer.draw.hidden = hidden || layer.properties.flags.hidden;
            layer.draw.screen_rect = screen_transform.transform_rect_bbox(content);
            layer.draw.visible_rect = visible_rect(screen_transform, content, viewport);
        }
    }

    /// Layers that produce a quad, back to front.
    pub(crate) fn drawn_layers(&self) -> impl Iterator<Item = &LayerImpl> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .filter(|l| l.is_drawn())
    }

    /// Signatures of every drawn layer, for damage computation.
    pub(crate) fn signatures(&self) -> BTreeMap<LayerId, LayerSignature> {
        self.drawn_layers()
            .filter_map(|l| l.signature().map(|s| (l.id, s)))
            .collect()
    }
}

/// Maps the on-screen part of `content` back into layer space.
fn visible_rect(transform: Affine, content: Rect, viewport: Rect) -> Rect {
    let clipped = transform.transform_rect_bbox(content).intersect(viewport);
    if clipped.is_zero_area() || transform.determinant().abs() < f64::EPSILON {
        return Rect::ZERO;
    }
    transform
        .inverse()
        .transform_rect_bbox(clipped)
        .intersect(content)
}

#[cfg(test)]
mod tests {
    use cadence_core::layer::LayerStore;
    use kurbo::Size;

    use super::*;

    fn committed(store: &mut LayerStore, tree: &mut LayerTreeImpl, frame: u64) {
        let changes = store.take_changes();
        tree.apply_commit(&CommitPayload::from_changes(store, &changes, frame));
    }

    /// Root 100x100 with one drawing child at (10, 10), viewport 50x50.
    fn scene() -> (LayerStore, LayerTreeImpl, LayerId, LayerId) {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let child = store.create_layer();
        store.set_root(Some(root));
        store.add_child(root, child);
        store.set_bounds(root, Size::new(100.0, 100.0));
        store.set_bounds(child, Size::new(20.0, 20.0));
        store.set_draws_content(child, true);
        store.set_transform(child, Affine::translate((10.0, 10.0)));
        store.set_viewport_size(Size::new(50.0, 50.0));
        let mut tree = LayerTreeImpl::default();
        committed(&mut store, &mut tree, 1);
        (store, tree, root, child)
    }

    #[test]
    fn commit_builds_structure_and_order() {
        let (_, tree, root, child) = scene();
        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.layer(root).map(|l| l.children.clone()), Some(vec![child]));
        assert_eq!(tree.layer(child).and_then(|l| l.parent), Some(root));
        assert_eq!(tree.source_frame_number(), 1);
    }

    #[test]
    fn draw_properties_follow_transform_scroll_and_scale() {
        let (mut store, mut tree, root, child) = scene();
        store.set_device_scale_factor(2.0);
        store.set_scroll_offset(root, Vec2::new(5.0, 0.0));
        committed(&mut store, &mut tree, 2);

        tree.update_draw_properties(|_| Vec2::ZERO, 1.0);
        let drawn = tree.layer(child).map(|l| l.draw.screen_rect);
        // (10 - 5, 10) scaled by 2, size 20 scaled by 2.
        assert_eq!(drawn, Some(Rect::new(10.0, 20.0, 50.0, 60.0)));

        tree.update_draw_properties(|id| if id == root { Vec2::new(5.0, 0.0) } else { Vec2::ZERO }, 1.0);
        let drawn = tree.layer(child).map(|l| l.draw.screen_rect);
        assert_eq!(drawn, Some(Rect::new(0.0, 20.0, 40.0, 60.0)));
    }

    #[test]
    fn visible_rect_is_clipped_to_viewport() {
        let (mut store, mut tree, _, child) = scene();
        store.set_transform(child, Affine::translate((40.0, 40.0)));
        committed(&mut store, &mut tree, 2);
        tree.update_draw_properties(|_| Vec2::ZERO, 1.0);
        let visible = tree.layer(child).map(|l| l.draw.visible_rect);
        assert_eq!(visible, Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn hidden_and_opacity_propagate() {
        let (mut store, mut tree, root, child) = scene();
        store.set_opacity(root, 0.5);
        store.set_opacity(child, 0.5);
        committed(&mut store, &mut tree, 2);
        tree.update_draw_properties(|_| Vec2::ZERO, 1.0);
        let opacity = tree.layer(child).map(|l| l.draw.opacity);
        assert_eq!(opacity, Some(0.25));
        assert_eq!(tree.drawn_layers().count(), 1);

        store.set_flags(root, cadence_core::layer::LayerFlags { hidden: true });
        committed(&mut store, &mut tree, 3);
        tree.update_draw_properties(|_| Vec2::ZERO, 1.0);
        assert_eq!(tree.drawn_layers().count(), 0);
    }

    #[test]
    fn removed_layers_leave_the_tree() {
        let (mut store, mut tree, _, child) = scene();
        store.destroy_layer(child);
        committed(&mut store, &mut tree, 2);
        assert!(tree.layer(child).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn texture_on_unknown_layer_is_refused() {
        let (_, mut tree, root, _) = scene();
        let mut other = LayerStore::new();
        let stranger = other.create_layer();
        assert_eq!(tree.set_texture(stranger, Some(ResourceId(1))), Err(Some(ResourceId(1))));
        assert_eq!(tree.set_texture(root, Some(ResourceId(2))), Ok(None));
        assert_eq!(tree.textures(), BTreeSet::from([ResourceId(2)]));
    }
}
