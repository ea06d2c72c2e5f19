// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The impl-side tree store and renderer.
//!
//! [`LayerTreeHostImpl`] owns everything the impl context works with: the
//! active and pending trees, the bound output sink, the resource ledger,
//! accumulated damage, memory limits and impl-side scroll state. It does no
//! scheduling of its own; the proxies call into it when the scheduler
//! decides an action should run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cadence_core::layer::LayerId;
use cadence_core::memory::{MemoryPolicy, PriorityBin, TileMemoryLimits};
use cadence_core::output::RendererCapabilities;
use cadence_core::scheduler::{CommitEarlyOutReason, DrawResult};
use cadence_core::time::HostTime;
use cadence_render::{
    CompositorFrame, DamageRegion, DrawQuad, FrameAck, FrameMetadata, OutputSurface,
    OutputSurfaceClient, QuadMaterial, RenderPass, RenderPassId, ResourceId, ResourceLedger,
};
use kurbo::{Rect, Size, Vec2};

use crate::commit::{CommitPayload, TextureUpdate};
use crate::settings::CompositorSettings;
use crate::tree::{LayerSignature, LayerTreeImpl};

/// Scroll movement of one layer since the last main frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollUpdate {
    /// The scrolled layer.
    pub layer: LayerId,
    /// Amount to add to the layer's scroll offset.
    pub delta: Vec2,
}

/// Impl-side scroll and zoom changes handed to the main context with a
/// begin main frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrollAndScaleSet {
    /// Per-layer scroll deltas.
    pub scrolls: Vec<ScrollUpdate>,
    /// Factor to multiply the page scale by.
    pub page_scale_delta: f64,
}

impl Default for ScrollAndScaleSet {
    fn default() -> Self {
        Self {
            scrolls: Vec::new(),
            page_scale_delta: 1.0,
        }
    }
}

impl ScrollAndScaleSet {
    /// Returns whether applying the set would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scrolls.is_empty() && self.page_scale_delta == 1.0
    }
}

/// Scroll and zoom applied on the impl side ahead of the main side.
///
/// Deltas are *unsent* until a begin main frame carries them, then *sent*
/// until the commit that includes them is activated.
#[derive(Debug)]
struct ScrollState {
    unsent: BTreeMap<LayerId, Vec2>,
    sent: BTreeMap<LayerId, Vec2>,
    unsent_page_scale: f64,
    sent_page_scale: f64,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            unsent: BTreeMap::new(),
            sent: BTreeMap::new(),
            unsent_page_scale: 1.0,
            sent_page_scale: 1.0,
        }
    }
}

impl ScrollState {
    fn unsent_delta(&self, layer: LayerId) -> Vec2 {
        self.unsent.get(&layer).copied().unwrap_or(Vec2::ZERO)
    }

    fn delta(&self, layer: LayerId) -> Vec2 {
        self.unsent_delta(layer) + self.sent.get(&layer).copied().unwrap_or(Vec2::ZERO)
    }

    fn page_scale_delta(&self) -> f64 {
        self.unsent_page_scale * self.sent_page_scale
    }

    fn merge_into(from: &mut BTreeMap<LayerId, Vec2>, into: &mut BTreeMap<LayerId, Vec2>) {
        for (layer, delta) in std::mem::take(from) {
            *into.entry(layer).or_insert(Vec2::ZERO) += delta;
        }
    }
}

/// A prepared draw: everything [`LayerTreeHostImpl::draw_layers`] needs.
#[derive(Clone, Debug)]
pub(crate) struct FrameData {
    quads: Vec<DrawQuad>,
    resources: Vec<ResourceId>,
    damage_rect: Rect,
    viewport: Rect,
}

impl FrameData {
    /// Returns whether anything inside the viewport changed.
    pub(crate) fn has_damage(&self) -> bool {
        !self.damage_rect.is_zero_area()
    }
}

/// Converts a straight-alpha color to premultiplied alpha.
fn premultiply([r, g, b, a]: [f32; 4]) -> [f32; 4] {
    [r * a, g * a, b * a, a]
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "texture sizes are far below u64::MAX bytes"
)]
fn texture_bytes(size: Size) -> u64 {
    (size.width.max(0.0) * size.height.max(0.0) * 4.0) as u64
}

/// What [`LayerTreeHostImpl::prepare_tiles`] found for the pending tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TileReadiness {
    /// Not examined since the last commit.
    Unprepared,
    /// Every texture fits the memory limits.
    Ready,
    /// Some textures will never fit the current limits. The tree activates
    /// anyway and draws what fits.
    OutOfMemory,
}

/// The impl-side tree store.
pub(crate) struct LayerTreeHostImpl {
    settings: CompositorSettings,
    active: LayerTreeImpl,
    pending: Option<LayerTreeImpl>,
    ledger: ResourceLedger,
    output_surface: Option<Box<dyn OutputSurface>>,
    capabilities: Option<RendererCapabilities>,
    visible: bool,
    damage: DamageRegion,
    memory_policy: MemoryPolicy,
    limits: TileMemoryLimits,
    tiles: TileReadiness,
    /// The active tree was activated out of memory; over-budget textures
    /// draw as their background color instead of aborting the draw.
    active_out_of_memory: bool,
    scroll: ScrollState,
    frame_number: u64,
}

impl fmt::Debug for LayerTreeHostImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerTreeHostImpl")
            .field("active_layers", &self.active.len())
            .field("has_pending_tree", &self.pending.is_some())
            .field("ledger", &self.ledger)
            .field("has_output_surface", &self.output_surface.is_some())
            .field("capabilities", &self.capabilities)
            .field("visible", &self.visible)
            .field("damage", &self.damage)
            .field("limits", &self.limits)
            .field("tiles", &self.tiles)
            .field("active_out_of_memory", &self.active_out_of_memory)
            .field("frame_number", &self.frame_number)
            .finish_non_exhaustive()
    }
}

impl LayerTreeHostImpl {
    pub(crate) fn new(settings: CompositorSettings) -> Self {
        let memory_policy = settings.initial_memory_policy;
        Self {
            settings,
            active: LayerTreeImpl::default(),
            pending: None,
            ledger: ResourceLedger::new(),
            output_surface: None,
            capabilities: None,
            visible: false,
            damage: DamageRegion::None,
            memory_policy,
            limits: memory_policy.limits(false, settings.prepaint_percent),
            tiles: TileReadiness::Unprepared,
            active_out_of_memory: false,
            scroll: ScrollState::default(),
            frame_number: 0,
        }
    }

    // -- Queries --

    pub(crate) fn active_tree(&self) -> &LayerTreeImpl {
        &self.active
    }

    pub(crate) fn has_pending_tree(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn renderer_capabilities(&self) -> Option<RendererCapabilities> {
        self.capabilities
    }

    pub(crate) fn has_output_surface(&self) -> bool {
        self.output_surface.is_some()
    }

    pub(crate) fn limits(&self) -> TileMemoryLimits {
        self.limits
    }

    pub(crate) fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Whether the active tree could produce a frame into a bound sink.
    ///
    /// A zero-area viewport cannot be drawn into; the scheduler keeps the
    /// redraw request until it is resized.
    pub(crate) fn can_draw(&self) -> bool {
        self.output_surface.is_some()
            && self.capabilities.is_some()
            && self.active.root().is_some()
            && !self.active.viewport_rect().is_zero_area()
    }

    /// Whether the pending tree may replace the active tree.
    pub(crate) fn ready_to_activate(&self) -> bool {
        self.pending.is_some()
            && (!self.settings.impl_side_painting || self.tiles != TileReadiness::Unprepared)
    }

    // -- Output surface --

    /// Binds `surface` and adopts it. Returns its capabilities, or `None`
    /// if binding failed (the surface is dropped).
    pub(crate) fn bind_output_surface(
        &mut self,
        mut surface: Box<dyn OutputSurface>,
        client: Box<dyn OutputSurfaceClient>,
    ) -> Option<RendererCapabilities> {
        debug_assert!(
            self.output_surface.is_none(),
            "binding a new output surface over a live one"
        );
        if !surface.bind_to_client(client) {
            tracing::debug!("output surface failed to bind");
            return None;
        }
        let capabilities = RendererCapabilities::from_output(&surface.capabilities());
        let tree = self.active.properties();
        surface.reshape(tree.viewport_size, tree.device_scale_factor);
        self.output_surface = Some(surface);
        self.capabilities = Some(capabilities);
        self.damage.set_full();
        tracing::debug!(?capabilities, "output surface bound");
        Some(capabilities)
    }

    /// Drops the bound sink after it was lost.
    ///
    /// Sends that will never be acknowledged are written off as lost.
    pub(crate) fn lose_output_surface(&mut self) {
        self.drop_output_surface("lost");
    }

    /// Detaches and drops the bound sink at the embedder's request.
    pub(crate) fn release_output_surface(&mut self) {
        self.drop_output_surface("released");
    }

    fn drop_output_surface(&mut self, why: &'static str) {
        let Some(mut surface) = self.output_surface.take() else {
            return;
        };
        surface.release();
        self.capabilities = None;
        let released = self.ledger.abandon_in_flight();
        tracing::debug!(why, released = released.len(), "output surface dropped");
    }

    /// Processes a frame acknowledgement from the bound sink.
    pub(crate) fn reclaim_resources(&mut self, ack: &FrameAck) {
        let report = self.ledger.receive_returns(&ack.resources);
        if !report.is_clean() {
            tracing::warn!(
                unknown = ?report.unknown,
                duplicate = ?report.duplicate,
                "inconsistent frame acknowledgement"
            );
        }
        if !report.released.is_empty() {
            tracing::trace!(released = ?report.released, "resources released");
        }
    }

    // -- Commit and activation --

    /// Starts a commit by copying the active tree into a new pending tree.
    ///
    /// # Panics
    ///
    /// Panics if a pending tree already exists.
    pub(crate) fn begin_commit(&mut self) {
        assert!(self.pending.is_none(), "a pending tree already exists");
        self.pending = Some(self.active.clone());
    }

    /// Applies a commit payload to the pending tree.
    ///
    /// Textures move into the ledger here. A texture for a layer that is
    /// not in the tree is released at the next activation.
    ///
    /// # Panics
    ///
    /// Panics if [`begin_commit`](Self::begin_commit) was not called.
    pub(crate) fn apply_commit(&mut self, payload: CommitPayload) {
        let Some(pending) = self.pending.as_mut() else {
            panic!("commit applied without a pending tree");
        };
        pending.apply_commit(&payload);
        for (layer, update) in payload.textures {
            let texture = match update {
                TextureUpdate::Set(texture, release) => Some(self.ledger.import(texture, release)),
                TextureUpdate::Clear => None,
            };
            if pending.set_texture(layer, texture).is_err() {
                tracing::debug!(?layer, "texture for a layer outside the committed tree");
            }
        }
    }

    /// Finishes a commit.
    pub(crate) fn commit_complete(&mut self) {
        self.tiles = if self.settings.impl_side_painting {
            TileReadiness::Unprepared
        } else {
            TileReadiness::Ready
        };
        if let Some(pending) = &self.pending {
            tracing::trace!(
                source_frame_number = pending.source_frame_number(),
                layers = pending.len(),
                "commit complete"
            );
        }
    }

    /// Replaces the active tree with the pending tree and records the damage
    /// between the two.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending tree.
    pub(crate) fn activate_pending_tree(&mut self) {
        let Some(mut pending) = self.pending.take() else {
            panic!("activation without a pending tree");
        };

        let scroll = &self.scroll;
        self.active
            .update_draw_properties(|id| scroll.delta(id), scroll.page_scale_delta());
        // Sent deltas are part of the committed offsets from here on.
        self.scroll.sent.clear();
        self.scroll.sent_page_scale = 1.0;
        let scroll = &self.scroll;
        pending.update_draw_properties(|id| scroll.unsent_delta(id), scroll.unsent_page_scale);

        let old = self.active.properties();
        let new = pending.properties();
        if old.viewport_size != new.viewport_size
            || old.device_scale_factor != new.device_scale_factor
            || old.page_scale_factor != new.page_scale_factor
            || old.background_color != new.background_color
        {
            self.damage.set_full();
        } else {
            add_signature_damage(
                &mut self.damage,
                &self.active.signatures(),
                &pending.signatures(),
            );
            let old_order = self.active.drawn_layers().map(|l| l.id);
            if !old_order.eq(pending.drawn_layers().map(|l| l.id)) {
                // Paint order changed; everything drawn may look different.
                for layer in self.active.drawn_layers().chain(pending.drawn_layers()) {
                    self.damage.add_rect(layer.draw.screen_rect);
                }
            }
        }

        if let Some(surface) = &mut self.output_surface
            && (old.viewport_size != new.viewport_size
                || old.device_scale_factor != new.device_scale_factor)
        {
            surface.reshape(new.viewport_size, new.device_scale_factor);
        }

        self.active = pending;
        self.active_out_of_memory = self.tiles == TileReadiness::OutOfMemory;
        self.tiles = TileReadiness::Unprepared;
        let released = self.ledger.retain_referenced(&self.active.textures());
        tracing::trace!(
            source_frame_number = self.active.source_frame_number(),
            released = released.len(),
            "pending tree activated"
        );
    }

    // -- Drawing --

    /// Adds `rect` (in output space) to the damage of the next draw.
    pub(crate) fn set_needs_redraw_rect(&mut self, rect: Rect) {
        self.damage.add_rect(rect);
    }

    /// Builds the quads of the active tree.
    ///
    /// Fails without side effects when the tree cannot produce a valid
    /// frame: zero viewport ([`DrawResult::AbortedCantDraw`]) or content
    /// that is not resident ([`DrawResult::AbortedMissingResources`]).
    pub(crate) fn prepare_to_draw(&mut self) -> Result<FrameData, DrawResult> {
        if !self.can_draw() {
            return Err(DrawResult::AbortedCantDraw);
        }
        let viewport = self.active.viewport_rect();
        let scroll = &self.scroll;
        self.active
            .update_draw_properties(|id| scroll.delta(id), scroll.page_scale_delta());
        let resident = self.resident_textures(&self.active);

        let mut quads = Vec::new();
        let mut resources = BTreeSet::new();
        for layer in self.active.drawn_layers() {
            let color = premultiply(layer.properties.background_color);
            let material = match layer.texture {
                Some(id) if !self.ledger.contains(id) => {
                    return Err(DrawResult::AbortedMissingResources);
                }
                Some(id) if resident.contains(&id) => {
                    resources.insert(id);
                    QuadMaterial::Texture {
                        resource: id,
                        premultiplied_alpha: true,
                    }
                }
                Some(_) if self.settings.impl_side_painting && !self.active_out_of_memory => {
                    return Err(DrawResult::AbortedMissingResources);
                }
                // Over budget: fall back to the background color.
                Some(_) | None => QuadMaterial::SolidColor(color),
            };
            quads.push(DrawQuad {
                layer: layer.id,
                rect: layer.content_rect(),
                visible_rect: layer.draw.visible_rect,
                transform: layer.draw.screen_transform,
                opacity: layer.draw.opacity,
                material,
            });
        }
        Ok(FrameData {
            quads,
            resources: resources.into_iter().collect(),
            damage_rect: self.damage.bounds_within(viewport).unwrap_or(Rect::ZERO),
            viewport,
        })
    }

    /// Seals a prepared frame and consumes the accumulated damage.
    pub(crate) fn draw_layers(&mut self, frame: FrameData, timestamp: HostTime) -> CompositorFrame {
        self.frame_number += 1;
        let tree = self.active.properties();
        let mut pass = RenderPass::new(RenderPassId(1), frame.viewport, frame.damage_rect);
        pass.quads = frame.quads;
        let resources = self.ledger.prepare_send(&frame.resources);
        self.damage = DamageRegion::None;
        tracing::trace!(
            frame_number = self.frame_number,
            quads = pass.quads.len(),
            resources = resources.len(),
            ?timestamp,
            "frame drawn"
        );
        #[expect(
            clippy::cast_possible_truncation,
            reason = "page scale factors are small and stored as f32"
        )]
        let page_scale_factor =
            (f64::from(tree.page_scale_factor) * self.scroll.page_scale_delta()) as f32;
        CompositorFrame::new(
            FrameMetadata {
                frame_number: self.frame_number,
                device_scale_factor: tree.device_scale_factor,
                page_scale_factor,
                viewport_size: tree.viewport_size,
            },
            vec![pass],
            resources,
        )
    }

    /// Hands `frame` to the output sink.
    ///
    /// Returns `false` if the sink failed; it is then treated as lost.
    pub(crate) fn swap_buffers(&mut self, frame: CompositorFrame) -> bool {
        let Some(surface) = self.output_surface.as_mut() else {
            return false;
        };
        match surface.swap_buffers(frame) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    %error,
                    fatal = error.is_fatal_for_surface(),
                    "swap failed, dropping output surface"
                );
                self.lose_output_surface();
                false
            }
        }
    }

    // -- Visibility and memory --

    /// Updates visibility. Returns whether the memory limits changed.
    ///
    /// The trees are kept while hidden. Becoming visible damages the whole
    /// output.
    pub(crate) fn set_visible(&mut self, visible: bool) -> bool {
        if visible && !self.visible {
            self.damage.set_full();
        }
        self.visible = visible;
        self.update_limits()
    }

    /// Replaces the memory policy. Returns whether the derived limits
    /// changed.
    pub(crate) fn set_memory_policy(&mut self, policy: MemoryPolicy) -> bool {
        self.memory_policy = policy;
        let changed = self.update_limits();
        if changed {
            // Residency may change which layers fall back to color.
            self.damage.set_full();
        }
        changed
    }

    fn update_limits(&mut self) -> bool {
        let limits = self
            .memory_policy
            .limits(self.visible, self.settings.prepaint_percent);
        let changed = limits != self.limits;
        self.limits = limits;
        if changed {
            tracing::debug!(?limits, "memory limits changed");
        }
        changed
    }

    /// Textures of `tree` that fit the memory limits, in paint order.
    fn resident_textures(&self, tree: &LayerTreeImpl) -> BTreeSet<ResourceId> {
        let mut resident = BTreeSet::new();
        if !self.limits.cutoff.allows(PriorityBin::Now) {
            return resident;
        }
        let mut bytes = 0_u64;
        for id in tree.drawn_layers().filter_map(|l| l.texture) {
            if resident.contains(&id) {
                continue;
            }
            let Some(texture) = self.ledger.texture(id) else {
                continue;
            };
            let needed = bytes.saturating_add(texture_bytes(texture.size));
            if needed > self.limits.hard_bytes || resident.len() >= self.limits.num_resources_limit
            {
                continue;
            }
            bytes = needed;
            resident.insert(id);
        }
        resident
    }

    /// Decides whether the pending tree's content fits the memory limits.
    ///
    /// Content that does not fit would never become ready, so the tree is
    /// then marked out of memory and may activate.
    pub(crate) fn prepare_tiles(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let scroll = &self.scroll;
        pending.update_draw_properties(|id| scroll.unsent_delta(id), scroll.unsent_page_scale);
        let Some(pending) = self.pending.as_ref() else {
            return;
        };
        let resident = self.resident_textures(pending);
        let fits = pending
            .drawn_layers()
            .filter_map(|l| l.texture)
            .all(|id| resident.contains(&id));
        self.tiles = if fits {
            TileReadiness::Ready
        } else {
            tracing::debug!(limits = ?self.limits, "pending tree does not fit the memory limits");
            TileReadiness::OutOfMemory
        };
        tracing::trace!(tiles = ?self.tiles, "prepare tiles");
    }

    // -- Scrolling --

    /// Scrolls `layer` on the impl side. Returns `false` if the active tree
    /// has no such layer.
    pub(crate) fn scroll_by(&mut self, layer: LayerId, delta: Vec2) -> bool {
        if self.active.layer(layer).is_none() || !delta.is_finite() {
            return false;
        }
        *self.scroll.unsent.entry(layer).or_insert(Vec2::ZERO) += delta;
        self.damage.set_full();
        true
    }

    /// Zooms on the impl side. Returns `false` for a non-positive factor.
    pub(crate) fn page_scale_by(&mut self, factor: f64) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        self.scroll.unsent_page_scale *= factor;
        self.damage.set_full();
        true
    }

    /// Moves unsent deltas to sent and returns them for a begin main frame.
    pub(crate) fn process_scroll_deltas(&mut self) -> ScrollAndScaleSet {
        let set = ScrollAndScaleSet {
            scrolls: self
                .scroll
                .unsent
                .iter()
                .map(|(&layer, &delta)| ScrollUpdate { layer, delta })
                .collect(),
            page_scale_delta: self.scroll.unsent_page_scale,
        };
        ScrollState::merge_into(&mut self.scroll.unsent, &mut self.scroll.sent);
        self.scroll.sent_page_scale *= self.scroll.unsent_page_scale;
        self.scroll.unsent_page_scale = 1.0;
        set
    }

    /// Reconciles sent deltas after a main frame ended without a commit.
    pub(crate) fn main_frame_aborted(&mut self, reason: CommitEarlyOutReason) {
        if reason == CommitEarlyOutReason::FinishedNoUpdates {
            // The main side applied them without changing anything.
            self.active.apply_scroll_deltas(&self.scroll.sent);
            self.active.apply_page_scale_delta(self.scroll.sent_page_scale);
            self.scroll.sent.clear();
        } else {
            // Not applied; they go out again with the next main frame.
            ScrollState::merge_into(&mut self.scroll.sent, &mut self.scroll.unsent);
            self.scroll.unsent_page_scale *= self.scroll.sent_page_scale;
        }
        self.scroll.sent_page_scale = 1.0;
    }

    // -- Teardown --

    /// Drops the output sink and releases every resource.
    pub(crate) fn teardown(&mut self) {
        self.release_output_surface();
        self.pending = None;
        self.active = LayerTreeImpl::default();
        let released = self.ledger.release_all(false);
        tracing::debug!(released = released.len(), "impl side torn down");
    }
}

/// Damages the old and new rectangles of every layer whose contribution
/// changed.
fn add_signature_damage(
    damage: &mut DamageRegion,
    before: &BTreeMap<LayerId, LayerSignature>,
    after: &BTreeMap<LayerId, LayerSignature>,
) {
    for (id, old) in before {
        if after.get(id) != Some(old) {
            damage.add_rect(old.screen_rect);
        }
    }
    for (id, new) in after {
        if before.get(id) != Some(new) {
            damage.add_rect(new.screen_rect);
        }
    }
}
