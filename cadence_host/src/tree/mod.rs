// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Impl-side layer trees.
//!
//! The impl side keeps an *active* tree, which is what gets drawn, and
//! while a commit is in flight a *pending* tree that the commit was applied
//! to. Both are plain values owned by
//! [`LayerTreeHostImpl`](crate::host_impl::LayerTreeHostImpl); activation
//! replaces the active tree with the pending one in a single move.

mod layer_impl;
mod layer_tree_impl;

pub(crate) use layer_impl::LayerSignature;
pub(crate) use layer_tree_impl::LayerTreeImpl;
