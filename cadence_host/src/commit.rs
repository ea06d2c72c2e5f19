// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The payload that crosses from the main context to the impl context at
//! commit time.
//!
//! A payload is built from one [`LayerChanges`] extraction and applied to a
//! pending tree in a single step, so the impl side never observes part of a
//! commit.

use std::collections::BTreeMap;
use std::fmt;

use cadence_core::layer::{LayerChanges, LayerId, LayerProperties, LayerStore, TreeProperties};
use cadence_render::{ReleaseCallback, SyncToken, TextureMailbox};

/// Local properties of one layer at commit time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LayerSnapshot {
    pub(crate) id: LayerId,
    pub(crate) properties: LayerProperties,
}

/// A change to the texture attached to a layer.
pub(crate) enum TextureUpdate {
    /// Draw this texture instead of the background color.
    Set(TextureMailbox, ReleaseCallback),
    /// Go back to the background color.
    Clear,
}

impl fmt::Debug for TextureUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(texture, _) => f.debug_tuple("Set").field(texture).finish(),
            Self::Clear => f.write_str("Clear"),
        }
    }
}

/// Everything the impl side needs to bring its pending tree up to date.
#[derive(Debug, Default)]
pub(crate) struct CommitPayload {
    /// Main-side commit counter.
    pub(crate) source_frame_number: u64,
    /// Root of the committed tree.
    pub(crate) root: Option<LayerId>,
    /// Tree-wide properties, when they changed.
    pub(crate) tree_properties: Option<TreeProperties>,
    /// Layers that entered the committed tree, in traversal order.
    pub(crate) added: Vec<LayerSnapshot>,
    /// Layers whose properties changed.
    pub(crate) updated: Vec<LayerSnapshot>,
    /// Layers that left the committed tree.
    pub(crate) removed: Vec<LayerId>,
    /// Full pre-order `(layer, parent)` list, when the shape changed.
    pub(crate) structure: Option<Vec<(LayerId, Option<LayerId>)>>,
    /// Texture attachments, applied after the layers.
    pub(crate) textures: Vec<(LayerId, TextureUpdate)>,
}

impl CommitPayload {
    /// Builds a payload from the changes extracted out of `store`.
    pub(crate) fn from_changes(
        store: &LayerStore,
        changes: &LayerChanges,
        source_frame_number: u64,
    ) -> Self {
        let snapshot = |idx: u32| LayerSnapshot {
            id: store.id_at(idx),
            properties: store.properties_at(idx),
        };
        let structure = changes.topology_changed.then(|| {
            store
                .traversal_order()
                .iter()
                .map(|&idx| (store.id_at(idx), store.parent_at(idx).map(|p| store.id_at(p))))
                .collect()
        });
        Self {
            source_frame_number,
            root: store.root(),
            tree_properties: changes
                .tree_properties_changed
                .then(|| *store.tree_properties()),
            added: changes.added.iter().copied().map(snapshot).collect(),
            updated: changes.updated.iter().copied().map(snapshot).collect(),
            removed: changes.removed.clone(),
            structure,
            textures: Vec::new(),
        }
    }

    /// Returns whether applying the payload would change nothing.
    pub(crate) fn is_empty(&self) -> bool {
        self.tree_properties.is_none()
            && self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.structure.is_none()
            && self.textures.is_empty()
    }
}

/// Texture attachments made on the main side since the last commit.
///
/// At most one update is pending per layer. Replacing a texture that was
/// never committed releases it immediately.
#[derive(Default)]
pub(crate) struct PendingTextures {
    updates: BTreeMap<LayerId, TextureUpdate>,
}

impl fmt::Debug for PendingTextures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.updates.iter()).finish()
    }
}

impl PendingTextures {
    pub(crate) fn set(&mut self, layer: LayerId, update: TextureUpdate) {
        if let Some(TextureUpdate::Set(texture, release)) = self.updates.insert(layer, update) {
            tracing::trace!(?layer, mailbox = ?texture.mailbox, "uncommitted texture replaced");
            release(SyncToken::EMPTY, false);
        }
    }

    /// Moves the updates for layers in the committed tree into `payload`.
    ///
    /// Updates for destroyed layers are released. Updates for live layers
    /// outside the committed tree wait for a later commit.
    pub(crate) fn drain_into(&mut self, store: &LayerStore, payload: &mut CommitPayload) {
        let updates = std::mem::take(&mut self.updates);
        for (layer, update) in updates {
            if !store.is_alive(layer) {
                if let TextureUpdate::Set(_, release) = update {
                    release(SyncToken::EMPTY, false);
                }
            } else if store.is_attached(layer) {
                payload.textures.push((layer, update));
            } else {
                self.updates.insert(layer, update);
            }
        }
    }

    /// Releases everything still pending.
    pub(crate) fn release_all(&mut self) {
        for (_, update) in std::mem::take(&mut self.updates) {
            if let TextureUpdate::Set(_, release) = update {
                release(SyncToken::EMPTY, false);
            }
        }
    }
}

impl Drop for PendingTextures {
    fn drop(&mut self) {
        self.release_all();
    }
}
