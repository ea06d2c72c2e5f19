// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The thread bridge between the main and impl contexts.
//!
//! Everything that crosses the bridge is a message: [`ImplMessage`] from
//! main to impl, [`MainMessage`] from impl to main. Both [`Proxy`]
//! implementations offer the same contract:
//!
//! - [`SingleThreadProxy`] runs the impl side on the embedder's thread. A
//!   message to the impl side is a direct call made inside an impl role
//!   scope; impl work triggered by begin frames or sink callbacks runs when
//!   the embedder polls.
//! - [`ThreadedProxy`] runs the impl side on its own thread, which selects
//!   over its message queue, the begin-frame channel and sink events.
//!
//! In both modes messages to the main side are queued and delivered by
//! [`Proxy::poll`], never by reentrant calls.
//!
//! The only blocking point is the commit handshake (plus sink release and
//! stop), where the main context waits on a [`completion`].

pub(crate) mod completion;
mod impl_side;
mod single_thread;
mod threaded;

use std::fmt;
use std::time::Duration;

use cadence_core::layer::LayerId;
use cadence_core::memory::{MemoryPolicy, TileMemoryLimits};
use cadence_core::output::RendererCapabilities;
use cadence_core::scheduler::CommitEarlyOutReason;
use cadence_core::timing::BeginFrameArgs;
use cadence_core::trace::TraceSink;
use cadence_render::OutputSurface;
use kurbo::{Rect, Vec2};

pub(crate) use impl_side::ImplSide;
pub(crate) use single_thread::SingleThreadProxy;
pub(crate) use threaded::ThreadedProxy;

use crate::commit::CommitPayload;
use crate::error::HostResult;
use crate::host_impl::ScrollAndScaleSet;
use completion::Signal;

/// Main to impl.
pub(crate) enum ImplMessage {
    SetOutputSurface(Box<dyn OutputSurface>),
    ReleaseOutputSurface(Signal),
    SetNeedsBeginMainFrame,
    SetNeedsRedraw(Rect),
    SetDeferCommits(bool),
    SetVisible(bool),
    SetMemoryPolicy(MemoryPolicy),
    ReadyToCommit {
        payload: CommitPayload,
        hold_for_activation: bool,
        done: Option<Signal>,
    },
    BeginMainFrameAborted(CommitEarlyOutReason),
    ScrollBy(LayerId, Vec2),
    PageScaleBy(f64),
    Stop(Signal),
}

impl fmt::Debug for ImplMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetOutputSurface(_) => f.write_str("SetOutputSurface"),
            Self::ReleaseOutputSurface(_) => f.write_str("ReleaseOutputSurface"),
            Self::SetNeedsBeginMainFrame => f.write_str("SetNeedsBeginMainFrame"),
            Self::SetNeedsRedraw(rect) => f.debug_tuple("SetNeedsRedraw").field(rect).finish(),
            Self::SetDeferCommits(defer) => {
                f.debug_tuple("SetDeferCommits").field(defer).finish()
            }
            Self::SetVisible(visible) => f.debug_tuple("SetVisible").field(visible).finish(),
            Self::SetMemoryPolicy(policy) => {
                f.debug_tuple("SetMemoryPolicy").field(policy).finish()
            }
            Self::ReadyToCommit {
                payload,
                hold_for_activation,
                ..
            } => f
                .debug_struct("ReadyToCommit")
                .field("source_frame_number", &payload.source_frame_number)
                .field("hold_for_activation", hold_for_activation)
                .finish_non_exhaustive(),
            Self::BeginMainFrameAborted(reason) => {
                f.debug_tuple("BeginMainFrameAborted").field(reason).finish()
            }
            Self::ScrollBy(layer, delta) => {
                f.debug_tuple("ScrollBy").field(layer).field(delta).finish()
            }
            Self::PageScaleBy(factor) => f.debug_tuple("PageScaleBy").field(factor).finish(),
            Self::Stop(_) => f.write_str("Stop"),
        }
    }
}

/// What the main side needs to run one main frame.
#[derive(Clone, Debug)]
pub(crate) struct BeginMainFrameInfo {
    pub(crate) args: BeginFrameArgs,
    pub(crate) scroll: ScrollAndScaleSet,
    pub(crate) memory_limits: TileMemoryLimits,
}

/// Impl to main.
#[derive(Clone, Debug)]
pub(crate) enum MainMessage {
    BeginMainFrame(BeginMainFrameInfo),
    RequestNewOutputSurface,
    DidInitializeOutputSurface(Option<RendererCapabilities>),
    DidLoseOutputSurface,
    DidCommitAndDrawFrame,
    DidCompleteSwapBuffers,
}

/// The bridge as the main side sees it.
pub(crate) trait Proxy: fmt::Debug {
    /// Installs a sink for scheduler trace events. Only valid before
    /// [`start`](Self::start).
    fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>);

    /// Starts the impl side.
    fn start(&mut self) -> HostResult<()>;

    /// Delivers `message` to the impl side.
    fn send(&mut self, message: ImplMessage);

    /// Hands a finished main frame to the impl side and waits until the
    /// commit is done.
    ///
    /// With `hold_for_activation` the impl side draws nothing until the new
    /// tree is active, and a threaded impl side also keeps this call waiting
    /// until then.
    fn commit(&mut self, payload: CommitPayload, hold_for_activation: bool) -> HostResult<()>;

    /// Returns the next message for the main side without blocking.
    fn poll(&mut self) -> Option<MainMessage>;

    /// Like [`poll`](Self::poll), but waits up to `timeout` for a message.
    fn wait(&mut self, timeout: Duration) -> Option<MainMessage>;

    /// Stops the impl side and waits until it has let go of its sink and
    /// resources.
    fn stop(&mut self);
}
