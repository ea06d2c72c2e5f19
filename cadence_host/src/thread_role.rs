// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debug-only execution-context role checks.
//!
//! In threaded mode the impl thread enters [`ThreadRole::Impl`] for its
//! whole lifetime. In single-threaded mode the proxy enters it around every
//! impl-side call, so the same assertions catch main-side code running
//! inside impl work (and the reverse) even though there is one OS thread.
//! Threads that never entered a role act as main.

use std::cell::Cell;

/// The execution context a piece of code belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThreadRole {
    Main,
    Impl,
}

thread_local! {
    static ROLE: Cell<ThreadRole> = const { Cell::new(ThreadRole::Main) };
}

/// Restores the previous role when dropped.
#[derive(Debug)]
#[must_use = "the role is only held while the guard is alive"]
pub(crate) struct RoleGuard {
    previous: ThreadRole,
}

impl Drop for RoleGuard {
    fn drop(&mut self) {
        ROLE.with(|role| role.set(self.previous));
    }
}

/// Runs the current thread as `role` until the guard drops.
pub(crate) fn enter(role: ThreadRole) -> RoleGuard {
    let previous = ROLE.with(|r| r.replace(role));
    RoleGuard { previous }
}

/// Returns the role of the current thread.
pub(crate) fn current() -> ThreadRole {
    ROLE.with(Cell::get)
}

/// Asserts (in debug builds) that the current thread plays `role`.
#[track_caller]
pub(crate) fn debug_assert_role(role: ThreadRole) {
    debug_assert_eq!(current(), role, "called from the wrong execution context");
}
