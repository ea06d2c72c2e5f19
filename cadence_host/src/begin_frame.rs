// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Begin-frame sources.
//!
//! A source delivers [`FrameSignal`]s to the impl side over a channel. The
//! impl side treats the channel as one more input next to its message queue,
//! so a source can tick from any thread.
//!
//! - [`SyntheticBeginFrameSource`] ticks at a fixed interval from its own
//!   timer thread.
//! - [`ManualBeginFrameSource`] ticks only when its [`ManualFrameDriver`] is
//!   told to, which makes frame-by-frame tests deterministic.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cadence_core::clock::Clock;
use cadence_core::time::Duration;
use cadence_core::timing::{BeginFrameArgs, FrameSignal};
use crossbeam_channel::{Receiver, Sender, TrySendError, select};
use parking_lot::Mutex;

use crate::clock::to_std;
use crate::error::{HostError, HostResult};

/// Produces begin-frame signals for the impl side.
pub trait BeginFrameSource: Send + fmt::Debug {
    /// Returns the channel signals arrive on.
    ///
    /// Called once when the proxy starts.
    fn subscribe(&mut self) -> Receiver<FrameSignal>;
}

// ---------------------------------------------------------------------------
// Synthetic
// ---------------------------------------------------------------------------

/// Signals waiting to be consumed before new ones are dropped.
const SYNTHETIC_QUEUE_DEPTH: usize = 4;

/// Ticks at a fixed interval from a dedicated timer thread.
///
/// Each tick sends a [`FrameSignal::BeginFrame`], then a
/// [`FrameSignal::Deadline`] once the frame's deadline has passed. If the
/// impl side falls behind, new signals are dropped rather than queued.
pub struct SyntheticBeginFrameSource {
    signals: Receiver<FrameSignal>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    interval: Duration,
}

impl fmt::Debug for SyntheticBeginFrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticBeginFrameSource")
            .field("interval", &self.interval)
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

impl SyntheticBeginFrameSource {
    /// Starts a timer thread ticking every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SpawnBeginFrameThread`] if the thread cannot be
    /// started.
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> HostResult<Self> {
        let (tx, signals) = crossbeam_channel::bounded(SYNTHETIC_QUEUE_DEPTH);
        let (stop, stop_rx) = crossbeam_channel::bounded(0);
        let thread = thread::Builder::new()
            .name("cadence-begin-frame".into())
            .spawn(move || run_timer(interval, &*clock, &tx, &stop_rx))
            .map_err(HostError::SpawnBeginFrameThread)?;
        Ok(Self {
            signals,
            stop: Some(stop),
            thread: Some(thread),
            interval,
        })
    }

    /// Returns the tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl BeginFrameSource for SyntheticBeginFrameSource {
    fn subscribe(&mut self) -> Receiver<FrameSignal> {
        self.signals.clone()
    }
}

impl Drop for SyntheticBeginFrameSource {
    fn drop(&mut self) {
        // Disconnecting the stop channel wakes the timer.
        drop(self.stop.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("begin-frame thread panicked");
        }
    }
}

/// Sleeps for `wait` unless the stop channel fires first.
fn stopped_while_waiting(stop: &Receiver<()>, wait: Duration) -> bool {
    let timer = crossbeam_channel::after(to_std(wait));
    select! {
        recv(stop) -> _ => true,
        recv(timer) -> _ => false,
    }
}

fn run_timer(
    interval: Duration,
    clock: &dyn Clock,
    tx: &Sender<FrameSignal>,
    stop: &Receiver<()>,
) {
    let mut frame_index = 0_u64;
    let mut next_tick = clock.now().saturating_add(interval);
    loop {
        if stopped_while_waiting(stop, next_tick.saturating_duration_since(clock.now())) {
            break;
        }
        frame_index += 1;
        let args = BeginFrameArgs::new(frame_index, clock.now(), interval);
        next_tick = args.next_frame_time();
        match tx.try_send(FrameSignal::BeginFrame(args)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!(frame_index, "impl side behind, begin frame dropped");
                continue;
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
        if stopped_while_waiting(stop, args.deadline.saturating_duration_since(clock.now())) {
            break;
        }
        if let Err(TrySendError::Disconnected(_)) =
            tx.try_send(FrameSignal::Deadline { frame_index })
        {
            break;
        }
    }
    tracing::debug!(frame_index, "begin-frame thread exiting");
}

// ---------------------------------------------------------------------------
// Manual
// ---------------------------------------------------------------------------

/// A source driven explicitly through a [`ManualFrameDriver`].
#[derive(Debug)]
pub struct ManualBeginFrameSource {
    signals: Receiver<FrameSignal>,
}

impl ManualBeginFrameSource {
    /// Creates a source and the driver that feeds it.
    ///
    /// Frame times are read from `clock` when a frame is begun.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> (Self, ManualFrameDriver) {
        let (tx, signals) = crossbeam_channel::unbounded();
        let driver = ManualFrameDriver {
            inner: Arc::new(Mutex::new(DriverState {
                tx,
                frame_index: 0,
            })),
            clock,
            interval,
        };
        (Self { signals }, driver)
    }
}

impl BeginFrameSource for ManualBeginFrameSource {
    fn subscribe(&mut self) -> Receiver<FrameSignal> {
        self.signals.clone()
    }
}

struct DriverState {
    tx: Sender<FrameSignal>,
    frame_index: u64,
}

impl DriverState {
    fn send(&self, signal: FrameSignal) {
        if self.tx.send(signal).is_err() {
            tracing::debug!(?signal, "begin-frame signal sent after the impl side stopped");
        }
    }
}

/// Feeds a [`ManualBeginFrameSource`]. Clones drive the same source.
#[derive(Clone)]
pub struct ManualFrameDriver {
    inner: Arc<Mutex<DriverState>>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl fmt::Debug for ManualFrameDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualFrameDriver")
            .field("frame_index", &self.inner.lock().frame_index)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ManualFrameDriver {
    /// Sends the next begin frame, timed at the clock's current time.
    pub fn begin_frame(&self) -> BeginFrameArgs {
        let mut state = self.inner.lock();
        state.frame_index += 1;
        let args = BeginFrameArgs::new(state.frame_index, self.clock.now(), self.interval);
        state.send(FrameSignal::BeginFrame(args));
        args
    }

    /// Sends the deadline of the most recent begin frame.
    pub fn deadline(&self) {
        let state = self.inner.lock();
        state.send(FrameSignal::Deadline {
            frame_index: state.frame_index,
        });
    }

    /// Sends a begin frame immediately followed by its deadline.
    pub fn tick(&self) -> BeginFrameArgs {
        let args = self.begin_frame();
        self.deadline();
        args
    }

    /// Returns the index of the most recent begin frame.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.inner.lock().frame_index
    }
}
