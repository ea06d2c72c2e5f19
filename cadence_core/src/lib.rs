// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for a threaded compositing pipeline.
//!
//! `cadence_core` holds the parts of the compositor control plane that do not
//! need threads or a drawing context: the main-side layer tree model, the
//! scheduler, timing types, and the value objects the embedder hands in
//! (memory policy, output capabilities). It is `no_std` compatible (with
//! `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   Embedder ──► LayerStore (main) ── take_changes() ──► commit payload
//!                                                              │
//!   Begin-frame source ──► FrameSignal                         ▼
//!                              │                   pending tree (impl)
//!                              ▼                               │ activate
//!                          Scheduler ──► SchedulerClient ──► active tree
//!                              ▲                               │ draw
//!                              │                               ▼
//!                              └──── swap ack / loss ◄──── output sink
//! ```
//!
//! **[`layer`]**: Struct-of-arrays layer tree with generational handles and
//! change extraction for diff-based commits.
//!
//! **[`dirty`]**: Per-category dirty tracking used by the layer tree.
//!
//! **[`scheduler`]**: The scheduler state machine plus the driver that turns
//! begin frames and requests into client actions, with swap backpressure and
//! deadline estimation.
//!
//! **[`timing`]**: Begin-frame arguments and signals.
//!
//! **[`clock`]**: The injectable [`Clock`](clock::Clock) trait and a manual
//! clock for deterministic tests.
//!
//! **[`memory`]**: The embedder's memory policy and the limits derived from
//! it.
//!
//! **[`output`]**: Output sink and renderer capabilities.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! scheduler instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod clock;
pub mod dirty;
pub mod layer;
pub mod memory;
pub mod output;
pub mod scheduler;
pub mod time;
pub mod timing;
pub mod trace;
