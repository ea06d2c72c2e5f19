// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot completion events.
//!
//! The main context blocks on a [`Completion`] at the few points where it
//! has to wait for the impl context: the commit handshake, output sink
//! release, and stop. Dropping the [`Signal`] without signalling wakes the
//! waiter with [`HostError::ImplGone`].

use crossbeam_channel::{Receiver, Sender};

use crate::error::{HostError, HostResult};

/// The waiting half.
#[derive(Debug)]
pub(crate) struct Completion {
    rx: Receiver<()>,
}

/// The signalling half.
#[derive(Debug)]
pub(crate) struct Signal {
    tx: Sender<()>,
}

/// Creates a connected completion pair.
pub(crate) fn completion() -> (Signal, Completion) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (Signal { tx }, Completion { rx })
}

impl Signal {
    /// Wakes the waiter.
    pub(crate) fn signal(self) {
        // The waiter may have given up already.
        let _ = self.tx.send(());
    }
}

impl Completion {
    /// Blocks until the paired [`Signal`] fires.
    pub(crate) fn wait(self) -> HostResult<()> {
        self.rx.recv().map_err(|_| HostError::ImplGone)
    }
}
