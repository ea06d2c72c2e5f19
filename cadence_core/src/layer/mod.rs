// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Main-side layer tree model.
//!
//! A *layer* is a node in the compositing tree the embedder records. Each
//! layer has:
//!
//! - An identity ([`LayerId`]): a generational handle that becomes stale when
//!   the layer is destroyed. The same handle names the layer's impl-side
//!   copies after commit.
//! - Topology: parent, first-child, and sibling links forming an ordered tree.
//!   Only the subtree under the [root](LayerStore::set_root) is committed.
//! - **Local properties** ([`LayerProperties`]): bounds, transform, opacity,
//!   drawable flag, background color, flags, and scroll offset.
//!
//! The store is mutated only on the main context. Nothing here is shared
//! with the impl side: [`take_changes`](LayerStore::take_changes) reports
//! what must be copied, and the commit builder snapshots exactly those
//! layers into an owned payload.
//!
//! # Dirty tracking
//!
//! Property setters mark the corresponding channel (see
//! [`dirty`](crate::dirty)) only when the value actually changes. Marks are
//! local: inherited values (screen-space transform, draw opacity) are
//! recomputed on the impl side.

mod changes;
mod id;
mod properties;
mod store;
mod traverse;

pub use changes::LayerChanges;
pub use id::{INVALID, LayerId, TreeId};
pub use properties::{LayerFlags, LayerProperties, TreePriority, TreeProperties};
pub use store::LayerStore;
pub use traverse::{Ancestors, Children};
