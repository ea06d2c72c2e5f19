// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::thread::{self, JoinHandle};
use std::time::Duration;

use cadence_core::trace::TraceSink;
use crossbeam_channel::{Receiver, Sender};

use super::completion::completion;
use super::{ImplMessage, ImplSide, MainMessage, Proxy};
use crate::commit::CommitPayload;
use crate::error::{HostError, HostResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Running,
    Stopped,
}

/// Runs the impl side on a dedicated thread.
#[derive(Debug)]
pub(crate) struct ThreadedProxy {
    impl_tx: Sender<ImplMessage>,
    /// Both move to the impl thread on start.
    startup: Option<(ImplSide, Receiver<ImplMessage>)>,
    main_rx: Receiver<MainMessage>,
    thread: Option<JoinHandle<()>>,
    lifecycle: Lifecycle,
}

impl ThreadedProxy {
    pub(crate) fn new(impl_side: ImplSide, main_rx: Receiver<MainMessage>) -> Self {
        let (impl_tx, impl_rx) = crossbeam_channel::unbounded();
        Self {
            impl_tx,
            startup: Some((impl_side, impl_rx)),
            main_rx,
            thread: None,
            lifecycle: Lifecycle::NotStarted,
        }
    }

    #[track_caller]
    fn debug_assert_running(&self) {
        debug_assert_ne!(
            self.lifecycle,
            Lifecycle::NotStarted,
            "proxy used before start"
        );
        debug_assert_ne!(self.lifecycle, Lifecycle::Stopped, "proxy used after stop");
    }
}

impl Proxy for ThreadedProxy {
    fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
        let Some((impl_side, _)) = self.startup.as_mut() else {
            panic!("trace sink installed after start");
        };
        impl_side.set_trace_sink(sink);
    }

    fn start(&mut self) -> HostResult<()> {
        let Some((impl_side, inbox)) = self.startup.take() else {
            panic!("proxy started twice");
        };
        let thread = thread::Builder::new()
            .name("cadence-impl".into())
            .spawn(move || impl_side.run(&inbox))
            .map_err(HostError::SpawnImplThread)?;
        self.thread = Some(thread);
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    fn send(&mut self, message: ImplMessage) {
        self.debug_assert_running();
        if let Err(error) = self.impl_tx.send(message) {
            tracing::warn!(message = ?error.0, "impl thread is gone");
        }
    }

    fn commit(&mut self, payload: CommitPayload, hold_for_activation: bool) -> HostResult<()> {
        let (signal, done) = completion();
        self.send(ImplMessage::ReadyToCommit {
            payload,
            hold_for_activation,
            done: Some(signal),
        });
        done.wait()
    }

    fn poll(&mut self) -> Option<MainMessage> {
        self.main_rx.try_recv().ok()
    }

    fn wait(&mut self, timeout: Duration) -> Option<MainMessage> {
        self.main_rx.recv_timeout(timeout).ok()
    }

    fn stop(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            self.lifecycle = Lifecycle::Stopped;
            return;
        }
        let (signal, done) = completion();
        self.send(ImplMessage::Stop(signal));
        self.lifecycle = Lifecycle::Stopped;
        if done.wait().is_err() {
            tracing::warn!("impl thread exited before acknowledging stop");
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("impl thread panicked");
        }
    }
}

impl Drop for ThreadedProxy {
    fn drop(&mut self) {
        self.stop();
    }
}
