// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Threaded compositor host for cadence.
//!
//! `cadence_host` wires the pieces from `cadence_core` and `cadence_render`
//! into a running compositor with two execution contexts:
//!
//! - the **main** context, where the embedder owns a
//!   [`LayerStore`](cadence_core::layer::LayerStore) and answers
//!   [`LayerTreeHostClient`] callbacks, and
//! - the **impl** context, which owns the scheduler, the pending and active
//!   trees, and the bound [`OutputSurface`](cadence_render::OutputSurface).
//!
//! ```text
//!   main                                   impl
//!   ────                                   ────
//!   LayerTreeHost ── ImplMessage ───────►  scheduler ◄── begin frames
//!        ▲                                     │
//!        │                                     ▼
//!        └──────── MainMessage ─────────  pending ─► active ─► draw ─► sink
//!                                              ▲                        │
//!                 commit (blocking) ───────────┘        acks, loss ◄────┘
//! ```
//!
//! With [`ThreadingMode::Threaded`] the impl context runs on its own thread;
//! with [`ThreadingMode::SingleThreaded`] it runs on the embedder's thread
//! whenever the embedder calls
//! [`LayerTreeHost::process_messages`]. The observable protocol is the same
//! in both modes.
//!
//! **[`output`]**: Ready-made output sinks: a software sink that presents in
//! process, a delegating sink that hands frames to a parent compositor, and a
//! scriptable fake for tests.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Forwards scheduler trace events to the
//!   sink installed with [`LayerTreeHost::with_trace_sink`].

mod begin_frame;
mod clock;
mod commit;
mod error;
mod host_impl;
mod layer_tree_host;
pub mod output;
mod proxy;
mod settings;
mod thread_role;
mod tree;

pub use begin_frame::{
    BeginFrameSource, ManualBeginFrameSource, ManualFrameDriver, SyntheticBeginFrameSource,
};
pub use clock::{SystemClock, to_std};
pub use error::{HostError, HostResult};
pub use host_impl::{ScrollAndScaleSet, ScrollUpdate};
pub use layer_tree_host::{LayerTreeHost, LayerTreeHostClient, LayerTreeUpdate};
pub use settings::{CompositorSettings, ThreadingMode};
