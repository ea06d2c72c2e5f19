// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use super::{ImplMessage, ImplSide, MainMessage, Proxy};
use crate::commit::CommitPayload;
use crate::error::HostResult;
use crate::thread_role::{self, ThreadRole};
use cadence_core::trace::TraceSink;

/// Runs the impl side on the embedder's thread.
///
/// Every impl-side call is made inside an impl role scope, so role
/// assertions behave as if there were two threads.
#[derive(Debug)]
pub(crate) struct SingleThreadProxy {
    impl_side: ImplSide,
    main_rx: Receiver<MainMessage>,
    started: bool,
    stopped: bool,
}

impl SingleThreadProxy {
    pub(crate) fn new(impl_side: ImplSide, main_rx: Receiver<MainMessage>) -> Self {
        Self {
            impl_side,
            main_rx,
            started: false,
            stopped: false,
        }
    }

    fn on_impl<R>(&mut self, f: impl FnOnce(&mut ImplSide) -> R) -> R {
        thread_role::debug_assert_role(ThreadRole::Main);
        let _role = thread_role::enter(ThreadRole::Impl);
        f(&mut self.impl_side)
    }

    #[track_caller]
    fn debug_assert_running(&self) {
        debug_assert!(self.started, "proxy used before start");
        debug_assert!(!self.stopped, "proxy used after stop");
    }
}

impl Proxy for SingleThreadProxy {
    fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
        assert!(!self.started, "trace sink installed after start");
        self.impl_side.set_trace_sink(sink);
    }

    fn start(&mut self) -> HostResult<()> {
        assert!(!self.started, "proxy started twice");
        self.started = true;
        self.on_impl(ImplSide::start);
        Ok(())
    }

    fn send(&mut self, message: ImplMessage) {
        self.debug_assert_running();
        self.on_impl(|impl_side| impl_side.handle(message));
    }

    fn commit(&mut self, payload: CommitPayload, hold_for_activation: bool) -> HostResult<()> {
        self.debug_assert_running();
        // The commit runs before `handle` returns. Draws may still wait for
        // activation, but this thread is never held.
        self.on_impl(|impl_side| {
            impl_side.handle(ImplMessage::ReadyToCommit {
                payload,
                hold_for_activation,
                done: None,
            })
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<MainMessage> {
        loop {
            if let Ok(message) = self.main_rx.try_recv() {
                return Some(message);
            }
            if !self.started || self.stopped {
                return None;
            }
            if !self.on_impl(ImplSide::try_step) {
                return None;
            }
        }
    }

    fn wait(&mut self, timeout: Duration) -> Option<MainMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.poll() {
                return Some(message);
            }
            if !self.started || self.stopped {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.impl_side.wait_ready(remaining) {
                return None;
            }
        }
    }

    fn stop(&mut self) {
        if !self.started || self.stopped {
            self.stopped = true;
            return;
        }
        self.stopped = true;
        self.on_impl(ImplSide::teardown);
    }
}

impl Drop for SingleThreadProxy {
    fn drop(&mut self) {
        self.stop();
    }
}
