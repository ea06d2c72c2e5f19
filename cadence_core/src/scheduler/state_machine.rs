// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scheduler's pure decision logic.
//!
//! [`SchedulerStateMachine`] holds no clock, no client, and performs no side
//! effects. Inputs arrive through `set_*`/`notify_*`/`did_*` methods; the
//! driver repeatedly asks [`next_action`](SchedulerStateMachine::next_action),
//! performs that action, and reports it back through
//! [`update_state`](SchedulerStateMachine::update_state) until the answer is
//! [`Action::None`].
//!
//! Three orthogonal state variables are tracked:
//!
//! ```text
//!   OutputSurfaceState   Lost ─► Creating ─► WaitingForFirstCommit
//!                          ▲                       │ Commit
//!                          │ lost                  ▼
//!                        Active ◄── Activate ── WaitingForFirstActivation
//!
//!   CommitState          Idle ─► BeginMainFrameSent ─► ReadyToCommit
//!                          ▲            │ aborted           │ Commit
//!                          ├────────────┘                   ▼
//!                          └──────── Activate ──── WaitingForActivation
//!
//!   BeginImplFrameState  Idle ─► InsideBeginFrame ─► InsideDeadline ─► Idle
//! ```
//!
//! Action priority, highest first: activate, commit, animate, draw, prepare
//! tiles, begin output surface creation, send begin main frame.

use super::SchedulerSettings;

/// Lifecycle of the output sink as seen by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputSurfaceState {
    /// No usable sink. Creation will be requested.
    Lost,
    /// The embedder has been asked for a sink.
    Creating,
    /// A sink is bound, but nothing has been committed for it yet.
    WaitingForFirstCommit,
    /// The first commit for the new sink awaits activation.
    WaitingForFirstActivation,
    /// Drawing is possible.
    Active,
}

/// Progress of the main-frame/commit handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitState {
    /// No main frame outstanding.
    Idle,
    /// The main context was asked to produce a frame.
    BeginMainFrameSent,
    /// The main context finished and its payload is waiting to be committed.
    ReadyToCommit,
    /// The commit produced a pending tree that has not been activated yet.
    WaitingForActivation,
}

/// Position within the current begin-frame interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BeginImplFrameState {
    /// Between frames.
    Idle,
    /// A begin frame arrived and its deadline has not fired yet.
    InsideBeginFrame,
    /// The deadline fired; drawing happens here.
    InsideDeadline,
}

/// Coarse conceptual state, for diagnostics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Nothing in progress.
    Idle,
    /// A begin frame started.
    FrameBegun,
    /// A main frame or its commit is outstanding.
    CommitPending,
    /// A committed tree is waiting to become active.
    Activating,
    /// The deadline is running.
    Drawing,
    /// A frame was swapped in the current interval.
    FrameComplete,
    /// No usable output sink.
    OutputSurfaceLost,
}

/// An action the scheduler wants performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing to do right now.
    None,
    /// Ask the main context to produce a frame.
    SendBeginMainFrame,
    /// Commit the finished main frame into a pending tree.
    Commit,
    /// Promote the pending tree to active.
    ActivatePendingTree,
    /// Tick impl-side animations.
    Animate,
    /// Draw the active tree and swap if anything changed.
    DrawAndSwapIfPossible,
    /// Let the resource layer update its priorities.
    PrepareTiles,
    /// Ask the embedder for a new output sink.
    BeginOutputSurfaceCreation,
}

impl Action {
    /// Short lowercase name, for trace output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SendBeginMainFrame => "send_begin_main_frame",
            Self::Commit => "commit",
            Self::ActivatePendingTree => "activate_pending_tree",
            Self::Animate => "animate",
            Self::DrawAndSwapIfPossible => "draw_and_swap_if_possible",
            Self::PrepareTiles => "prepare_tiles",
            Self::BeginOutputSurfaceCreation => "begin_output_surface_creation",
        }
    }
}

/// Outcome of a [`Action::DrawAndSwapIfPossible`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawResult {
    /// A frame was drawn and handed to the output sink.
    Swapped,
    /// A frame was drawn, but there was no damage so nothing was swapped.
    DrewWithoutSwap,
    /// The active tree cannot currently produce a frame.
    AbortedCantDraw,
    /// Content needed for the frame was not ready.
    AbortedMissingResources,
    /// The output sink was lost while drawing.
    AbortedOutputSurfaceLost,
}

impl DrawResult {
    /// Returns whether a frame was produced.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Swapped | Self::DrewWithoutSwap)
    }
}

/// Why a main frame ended without a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitEarlyOutReason {
    /// The output sink was lost before the commit.
    AbortedOutputSurfaceLost,
    /// The compositor became invisible.
    AbortedNotVisible,
    /// Commits are deferred.
    AbortedDeferredCommit,
    /// The main frame ran but produced no changes.
    FinishedNoUpdates,
}

impl CommitEarlyOutReason {
    /// Returns whether the commit request survives the abort.
    #[must_use]
    pub const fn retries(self) -> bool {
        !matches!(self, Self::FinishedNoUpdates)
    }
}

/// Scheduler decision state.
#[derive(Clone, Debug)]
pub struct SchedulerStateMachine {
    settings: SchedulerSettings,

    output_surface: OutputSurfaceState,
    commit: CommitState,
    begin_impl_frame: BeginImplFrameState,

    // -- Frame bookkeeping --
    current_frame_number: u64,
    last_frame_number_begin_main_frame_sent: u64,
    last_frame_number_swap_performed: u64,
    last_frame_number_animate_performed: u64,
    last_frame_number_prepare_tiles_performed: u64,
    pending_swaps: u32,
    max_pending_swaps: u32,
    consecutive_failed_draws: u32,

    // -- Intents --
    needs_redraw: bool,
    needs_animate: bool,
    needs_prepare_tiles: bool,
    needs_begin_main_frame: bool,

    // -- Conditions --
    visible: bool,
    can_start: bool,
    can_draw: bool,
    defer_commits: bool,

    // -- Trees --
    has_pending_tree: bool,
    pending_tree_is_ready_for_activation: bool,
    active_tree_needs_first_draw: bool,
    next_commit_waits_for_activation: bool,
    draw_waits_for_activation: bool,

    did_create_first_output_surface: bool,
}

impl SchedulerStateMachine {
    /// Creates a state machine with no output sink, invisible, not started.
    #[must_use]
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            output_surface: OutputSurfaceState::Lost,
            commit: CommitState::Idle,
            begin_impl_frame: BeginImplFrameState::Idle,
            current_frame_number: 0,
            last_frame_number_begin_main_frame_sent: 0,
            last_frame_number_swap_performed: 0,
            last_frame_number_animate_performed: 0,
            last_frame_number_prepare_tiles_performed: 0,
            pending_swaps: 0,
            max_pending_swaps: 1,
            consecutive_failed_draws: 0,
            needs_redraw: false,
            needs_animate: false,
            needs_prepare_tiles: false,
            needs_begin_main_frame: false,
            visible: false,
            can_start: false,
            can_draw: false,
            defer_commits: false,
            has_pending_tree: false,
            pending_tree_is_ready_for_activation: false,
            active_tree_needs_first_draw: false,
            next_commit_waits_for_activation: false,
            draw_waits_for_activation: false,
            did_create_first_output_surface: false,
        }
    }

    // -- Queries --

    /// Returns the output sink state.
    #[must_use]
    pub fn output_surface_state(&self) -> OutputSurfaceState {
        self.output_surface
    }

    /// Returns the commit state.
    #[must_use]
    pub fn commit_state(&self) -> CommitState {
        self.commit
    }

    /// Returns the begin-impl-frame state.
    #[must_use]
    pub fn begin_impl_frame_state(&self) -> BeginImplFrameState {
        self.begin_impl_frame
    }

    /// Returns the number of begin frames seen.
    #[must_use]
    pub fn current_frame_number(&self) -> u64 {
        self.current_frame_number
    }

    /// Returns the number of swaps awaiting acknowledgement.
    #[must_use]
    pub fn pending_swaps(&self) -> u32 {
        self.pending_swaps
    }

    /// Returns the backpressure limit.
    #[must_use]
    pub fn max_pending_swaps(&self) -> u32 {
        self.max_pending_swaps
    }

    /// Returns whether swaps are currently throttled.
    #[must_use]
    pub fn swap_throttled(&self) -> bool {
        self.pending_swaps >= self.max_pending_swaps
    }

    /// Returns whether a redraw is requested.
    #[must_use]
    pub fn redraw_pending(&self) -> bool {
        self.needs_redraw
    }

    /// Returns whether a main frame is requested and not yet sent.
    #[must_use]
    pub fn needs_begin_main_frame(&self) -> bool {
        self.needs_begin_main_frame
    }

    /// Returns whether a main frame is requested or in progress.
    #[must_use]
    pub fn commit_pending(&self) -> bool {
        self.needs_begin_main_frame
            || matches!(
                self.commit,
                CommitState::BeginMainFrameSent | CommitState::ReadyToCommit
            )
    }

    /// Returns whether a pending tree exists.
    #[must_use]
    pub fn has_pending_tree(&self) -> bool {
        self.has_pending_tree
    }

    /// Returns whether the compositor is visible.
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Returns the number of draws that failed in a row.
    #[must_use]
    pub fn consecutive_failed_draws(&self) -> u32 {
        self.consecutive_failed_draws
    }

    /// Returns the coarse conceptual state.
    #[must_use]
    pub fn frame_phase(&self) -> FramePhase {
        if matches!(
            self.output_surface,
            OutputSurfaceState::Lost | OutputSurfaceState::Creating
        ) {
            return FramePhase::OutputSurfaceLost;
        }
        if self.begin_impl_frame == BeginImplFrameState::InsideDeadline {
            return FramePhase::Drawing;
        }
        if self.has_pending_tree {
            return FramePhase::Activating;
        }
        if matches!(
            self.commit,
            CommitState::BeginMainFrameSent | CommitState::ReadyToCommit
        ) {
            return FramePhase::CommitPending;
        }
        if self.begin_impl_frame == BeginImplFrameState::InsideBeginFrame {
            return FramePhase::FrameBegun;
        }
        if self.current_frame_number != 0
            && self.last_frame_number_swap_performed == self.current_frame_number
        {
            return FramePhase::FrameComplete;
        }
        FramePhase::Idle
    }

    /// Returns whether the scheduler has any use for the next begin frame.
    ///
    /// Begin frames arriving while this is false are dropped.
    #[must_use]
    pub fn begin_frame_needed(&self) -> bool {
        if !self.visible
            || !matches!(
                self.output_surface,
                OutputSurfaceState::Active
                    | OutputSurfaceState::WaitingForFirstCommit
                    | OutputSurfaceState::WaitingForFirstActivation
            )
        {
            return false;
        }
        self.needs_redraw
            || self.needs_animate
            || self.needs_prepare_tiles
            || self.has_pending_tree
            || self.active_tree_needs_first_draw
            || (self.needs_begin_main_frame && !self.defer_commits)
    }

    /// Returns whether the deadline can run right away instead of waiting
    /// for the main context.
    #[must_use]
    pub fn should_trigger_deadline_immediately(&self) -> bool {
        self.begin_impl_frame == BeginImplFrameState::InsideBeginFrame
            && self.commit == CommitState::Idle
            && !(self.has_pending_tree && self.draw_waits_for_activation)
    }

    /// Returns whether the main context is waiting on a commit that is stuck
    /// behind an unactivated pending tree.
    #[must_use]
    pub fn main_frame_blocked_on_activation(&self) -> bool {
        self.commit == CommitState::WaitingForActivation
    }

    // -- Decision --

    /// Returns the action that should run next.
    #[must_use]
    pub fn next_action(&self) -> Action {
        if self.should_activate_pending_tree() {
            return Action::ActivatePendingTree;
        }
        if self.should_commit() {
            return Action::Commit;
        }
        if self.should_animate() {
            return Action::Animate;
        }
        if self.should_draw() {
            return Action::DrawAndSwapIfPossible;
        }
        if self.should_prepare_tiles() {
            return Action::PrepareTiles;
        }
        if self.should_begin_output_surface_creation() {
            return Action::BeginOutputSurfaceCreation;
        }
        if self.should_send_begin_main_frame() {
            return Action::SendBeginMainFrame;
        }
        Action::None
    }

    /// Records that `action` was performed.
    ///
    /// For [`Action::DrawAndSwapIfPossible`], the outcome is reported
    /// separately through
    /// [`did_draw_if_possible_completed`](Self::did_draw_if_possible_completed).
    pub fn update_state(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::SendBeginMainFrame => {
                debug_assert_eq!(self.commit, CommitState::Idle, "main frame already sent");
                self.commit = CommitState::BeginMainFrameSent;
                self.needs_begin_main_frame = false;
                self.last_frame_number_begin_main_frame_sent = self.current_frame_number;
            }
            Action::Commit => {
                assert_eq!(
                    self.commit,
                    CommitState::ReadyToCommit,
                    "commit without a finished main frame"
                );
                self.commit = CommitState::WaitingForActivation;
                self.has_pending_tree = true;
                self.pending_tree_is_ready_for_activation = false;
                self.draw_waits_for_activation = self.next_commit_waits_for_activation;
                self.next_commit_waits_for_activation = false;
                if self.settings.impl_side_painting {
                    self.needs_prepare_tiles = true;
                }
                if self.output_surface == OutputSurfaceState::WaitingForFirstCommit {
                    self.output_surface = OutputSurfaceState::WaitingForFirstActivation;
                }
            }
            Action::ActivatePendingTree => {
                assert!(self.has_pending_tree, "activation without a pending tree");
                self.has_pending_tree = false;
                self.pending_tree_is_ready_for_activation = false;
                self.draw_waits_for_activation = false;
                self.active_tree_needs_first_draw = true;
                self.needs_redraw = true;
                if self.commit == CommitState::WaitingForActivation {
                    self.commit = CommitState::Idle;
                }
                if self.output_surface == OutputSurfaceState::WaitingForFirstActivation {
                    self.output_surface = OutputSurfaceState::Active;
                }
            }
            Action::Animate => {
                self.needs_animate = false;
                self.needs_redraw = true;
                self.last_frame_number_animate_performed = self.current_frame_number;
            }
            Action::DrawAndSwapIfPossible => {
                self.last_frame_number_swap_performed = self.current_frame_number;
            }
            Action::PrepareTiles => {
                self.needs_prepare_tiles = false;
                self.last_frame_number_prepare_tiles_performed = self.current_frame_number;
            }
            Action::BeginOutputSurfaceCreation => {
                debug_assert_eq!(self.output_surface, OutputSurfaceState::Lost);
                self.output_surface = OutputSurfaceState::Creating;
            }
        }
    }

    fn active_tree_blocks_main_frame(&self) -> bool {
        self.active_tree_needs_first_draw
            && self.can_draw
            && self.output_surface == OutputSurfaceState::Active
            && self.consecutive_failed_draws < self.settings.max_consecutive_failed_draws
    }

    fn should_send_begin_main_frame(&self) -> bool {
        self.needs_begin_main_frame
            && self.can_start
            && self.visible
            && !self.defer_commits
            && self.commit == CommitState::Idle
            && matches!(
                self.output_surface,
                OutputSurfaceState::Active | OutputSurfaceState::WaitingForFirstCommit
            )
            && !self.has_pending_tree
            && !self.active_tree_blocks_main_frame()
            && self.begin_impl_frame == BeginImplFrameState::InsideBeginFrame
            && self.last_frame_number_begin_main_frame_sent != self.current_frame_number
            && !self.swap_throttled()
    }

    fn should_commit(&self) -> bool {
        self.commit == CommitState::ReadyToCommit
    }

    fn should_activate_pending_tree(&self) -> bool {
        self.has_pending_tree
            && (self.pending_tree_is_ready_for_activation
                || matches!(
                    self.output_surface,
                    OutputSurfaceState::Lost | OutputSurfaceState::Creating
                ))
    }

    fn should_animate(&self) -> bool {
        self.needs_animate
            && self.output_surface == OutputSurfaceState::Active
            && self.begin_impl_frame != BeginImplFrameState::Idle
            && self.last_frame_number_animate_performed != self.current_frame_number
    }

    fn should_draw(&self) -> bool {
        self.begin_impl_frame == BeginImplFrameState::InsideDeadline
            && (self.needs_redraw || self.active_tree_needs_first_draw)
            && self.can_draw
            && self.visible
            && self.output_surface == OutputSurfaceState::Active
            && self.last_frame_number_swap_performed != self.current_frame_number
            && !self.swap_throttled()
            && !(self.has_pending_tree && self.draw_waits_for_activation)
    }

    fn should_prepare_tiles(&self) -> bool {
        self.needs_prepare_tiles
            && self.begin_impl_frame != BeginImplFrameState::Idle
            && self.last_frame_number_prepare_tiles_performed != self.current_frame_number
    }

    fn should_begin_output_surface_creation(&self) -> bool {
        self.output_surface == OutputSurfaceState::Lost
            && self.can_start
            && !self.has_pending_tree
            && self.commit == CommitState::Idle
            && self.begin_impl_frame == BeginImplFrameState::Idle
    }

    // -- Begin-frame inputs --

    /// A begin frame started.
    pub fn on_begin_impl_frame(&mut self) {
        self.begin_impl_frame = BeginImplFrameState::InsideBeginFrame;
        self.current_frame_number += 1;
    }

    /// The deadline of the current begin frame fired.
    pub fn on_begin_impl_frame_deadline(&mut self) {
        debug_assert_eq!(
            self.begin_impl_frame,
            BeginImplFrameState::InsideBeginFrame,
            "deadline outside a begin frame"
        );
        self.begin_impl_frame = BeginImplFrameState::InsideDeadline;
    }

    /// The current begin frame ended.
    pub fn on_begin_impl_frame_idle(&mut self) {
        self.begin_impl_frame = BeginImplFrameState::Idle;
    }

    // -- Intent inputs --

    /// Requests a draw of the active tree.
    pub fn set_needs_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Requests an impl-side animation tick.
    pub fn set_needs_animate(&mut self) {
        self.needs_animate = true;
    }

    /// Requests a prepare-tiles pass.
    pub fn set_needs_prepare_tiles(&mut self) {
        self.needs_prepare_tiles = true;
    }

    /// Requests a main frame. Calls collapse until the frame is sent.
    pub fn set_needs_begin_main_frame(&mut self) {
        self.needs_begin_main_frame = true;
    }

    /// Makes draws wait for the next commit's activation.
    pub fn set_next_commit_waits_for_activation(&mut self) {
        self.next_commit_waits_for_activation = true;
    }

    /// Suppresses or resumes sending main frames. Requests are kept.
    pub fn set_defer_commits(&mut self, defer: bool) {
        self.defer_commits = defer;
    }

    // -- Condition inputs --

    /// Allows the scheduler to begin working.
    pub fn set_can_start(&mut self) {
        self.can_start = true;
    }

    /// Updates visibility.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Updates whether the active tree can currently be drawn.
    pub fn set_can_draw(&mut self, can_draw: bool) {
        self.can_draw = can_draw;
    }

    /// Updates the swap backpressure limit. Values below 1 are raised to 1.
    pub fn set_max_pending_swaps(&mut self, max: u32) {
        self.max_pending_swaps = max.max(1);
    }

    // -- Completion inputs --

    /// The main context finished its frame and the payload is ready.
    ///
    /// # Panics
    ///
    /// Panics if no main frame was outstanding.
    pub fn notify_ready_to_commit(&mut self) {
        assert_eq!(
            self.commit,
            CommitState::BeginMainFrameSent,
            "ready to commit without a main frame"
        );
        self.commit = CommitState::ReadyToCommit;
    }

    /// The main context ended its frame without committing.
    ///
    /// # Panics
    ///
    /// Panics if no main frame was outstanding.
    pub fn begin_main_frame_aborted(&mut self, reason: CommitEarlyOutReason) {
        assert_eq!(
            self.commit,
            CommitState::BeginMainFrameSent,
            "main frame aborted without a main frame"
        );
        self.commit = CommitState::Idle;
        if reason.retries() {
            self.needs_begin_main_frame = true;
        }
    }

    /// The pending tree has everything it needs to be drawn.
    pub fn notify_ready_to_activate(&mut self) {
        if self.has_pending_tree {
            self.pending_tree_is_ready_for_activation = true;
        }
    }

    /// Reports the outcome of a draw.
    pub fn did_draw_if_possible_completed(&mut self, result: DrawResult) {
        match result {
            DrawResult::Swapped | DrawResult::DrewWithoutSwap => {
                if result == DrawResult::Swapped {
                    self.pending_swaps += 1;
                }
                self.needs_redraw = false;
                self.active_tree_needs_first_draw = false;
                self.consecutive_failed_draws = 0;
            }
            DrawResult::AbortedCantDraw => {
                // Retried when the tree can draw again; a commit would not help.
                self.needs_redraw = true;
            }
            DrawResult::AbortedMissingResources => {
                self.needs_redraw = true;
                self.consecutive_failed_draws += 1;
                if self.consecutive_failed_draws >= self.settings.max_consecutive_failed_draws {
                    self.needs_begin_main_frame = true;
                }
            }
            DrawResult::AbortedOutputSurfaceLost => {
                self.needs_redraw = true;
                self.did_lose_output_surface();
            }
        }
    }

    /// A previously swapped frame was acknowledged.
    pub fn did_swap_buffers_complete(&mut self) {
        self.pending_swaps = self.pending_swaps.saturating_sub(1);
    }

    /// The output sink was lost. Idempotent.
    pub fn did_lose_output_surface(&mut self) {
        if matches!(
            self.output_surface,
            OutputSurfaceState::Lost | OutputSurfaceState::Creating
        ) {
            return;
        }
        self.output_surface = OutputSurfaceState::Lost;
        self.pending_swaps = 0;
        self.active_tree_needs_first_draw = false;
    }

    /// A new output sink was bound successfully.
    ///
    /// No draw happens until a commit made for the new sink is activated.
    pub fn did_create_and_initialize_output_surface(&mut self) {
        debug_assert_eq!(self.output_surface, OutputSurfaceState::Creating);
        self.output_surface = OutputSurfaceState::WaitingForFirstCommit;
        self.needs_redraw = false;
        self.active_tree_needs_first_draw = false;
        self.consecutive_failed_draws = 0;
        self.pending_swaps = 0;
        if self.did_create_first_output_surface {
            self.needs_begin_main_frame = true;
        }
        self.did_create_first_output_surface = true;
    }
}
