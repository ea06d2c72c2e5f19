// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame resource ledger.
//!
//! Every externally supplied texture enters the ledger through
//! [`ResourceLedger::import`] together with a release callback, and gets a
//! [`ResourceId`]. From then on a resource is in exactly one of three
//! places:
//!
//! - **held**: owned by the producer, `exported_count == 0`;
//! - **in flight**: sent in one or more frames and not yet returned;
//! - **released**: its callback has run and the entry is gone.
//!
//! A resource is released once the producer no longer references it
//! (it was left out of [`ResourceLedger::retain_referenced`], or the whole
//! ledger is torn down) *and* every send has been returned. The callback
//! runs exactly once, on whichever of those happens last, and receives the
//! most recent sync token handed back by the consumer.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use crate::resource::{ResourceId, ReturnedResource, SyncToken, TextureMailbox, TransferableResource};

/// Called once when a resource may be reused or freed by its supplier.
///
/// Receives the sync token to wait on and whether the contents were lost.
pub type ReleaseCallback = Box<dyn FnOnce(SyncToken, bool) + Send>;

struct Entry {
    texture: TextureMailbox,
    exported_count: u32,
    release: Option<ReleaseCallback>,
    marked_for_deletion: bool,
    return_token: SyncToken,
    lost: bool,
}

impl Entry {
    fn run_release(&mut self, lost: bool) {
        if let Some(release) = self.release.take() {
            release(self.return_token, lost || self.lost);
        }
    }
}

/// Outcome of processing a frame acknowledgement.
///
/// Anomalies are reported here rather than as errors: an acknowledgement
/// from a confused consumer must not take down the producer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Resources whose release callback ran.
    pub released: Vec<ResourceId>,
    /// Ids that the ledger does not know about.
    pub unknown: Vec<ResourceId>,
    /// Ids returned more times than they were sent.
    pub duplicate: Vec<ResourceId>,
}

impl ReclaimReport {
    /// Returns whether the acknowledgement was fully consistent.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty() && self.duplicate.is_empty()
    }
}

/// Tracks transferable resources until they are returned and released.
#[derive(Default)]
pub struct ResourceLedger {
    entries: BTreeMap<ResourceId, Entry>,
    next_id: u32,
}

impl fmt::Debug for ResourceLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLedger")
            .field("len", &self.entries.len())
            .field("in_flight", &self.in_flight_count())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ResourceLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `texture`; `release` runs once it is safe to reuse.
    pub fn import(&mut self, texture: TextureMailbox, release: ReleaseCallback) -> ResourceId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = ResourceId(self.next_id);
        self.entries.insert(
            id,
            Entry {
                texture,
                exported_count: 0,
                release: Some(release),
                marked_for_deletion: false,
                return_token: SyncToken::EMPTY,
                lost: false,
            },
        );
        id
    }

    /// Returns whether `id` is tracked (held or in flight).
    #[must_use]
    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the texture behind `id`.
    #[must_use]
    pub fn texture(&self, id: ResourceId) -> Option<&TextureMailbox> {
        self.entries.get(&id).map(|e| &e.texture)
    }

    /// Returns the number of tracked resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of resources with at least one unreturned send.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.entries.values().filter(|e| e.exported_count > 0).count()
    }

    /// Marks `ids` as sent in a frame and returns their transferable form.
    ///
    /// # Panics
    ///
    /// Panics if an id is unknown or already marked for deletion; a frame
    /// may only reference live resources.
    pub fn prepare_send(&mut self, ids: &[ResourceId]) -> Vec<TransferableResource> {
        ids.iter()
            .map(|&id| {
                let Some(entry) = self.entries.get_mut(&id) else {
                    panic!("sending unknown resource {id:?}");
                };
                assert!(
                    !entry.marked_for_deletion,
                    "sending resource {id:?} after it was dropped"
                );
                entry.exported_count += 1;
                TransferableResource {
                    id,
                    mailbox: entry.texture.mailbox,
                    sync_token: entry.texture.sync_token,
                    size: entry.texture.size,
                    is_software: entry.texture.is_software,
                }
            })
            .collect()
    }

    /// Processes resources handed back by the consumer.
    pub fn receive_returns(&mut self, returned: &[ReturnedResource]) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        for r in returned {
            let Some(entry) = self.entries.get_mut(&r.id) else {
                report.unknown.push(r.id);
                continue;
            };
            if r.count > entry.exported_count {
                report.duplicate.push(r.id);
            }
            entry.exported_count = entry.exported_count.saturating_sub(r.count);
            if !r.sync_token.is_empty() {
                entry.return_token = r.sync_token;
            }
            entry.lost |= r.lost;
            if entry.exported_count == 0 && entry.marked_for_deletion {
                self.release(r.id, false);
                report.released.push(r.id);
            }
        }
        report
    }

    /// Drops every resource not in `referenced`.
    ///
    /// Dropped resources that are not in flight are released now; the rest
    /// are released when their last send comes back. Returns the ids
    /// released immediately.
    pub fn retain_referenced(&mut self, referenced: &BTreeSet<ResourceId>) -> Vec<ResourceId> {
        let mut released = Vec::new();
        let ids: Vec<ResourceId> = self
            .entries
            .iter()
            .filter(|(id, e)| !e.marked_for_deletion && !referenced.contains(id))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let ready = match self.entries.get_mut(&id) {
                Some(entry) => {
                    entry.marked_for_deletion = true;
                    entry.exported_count == 0
                }
                None => false,
            };
            if ready {
                self.release(id, false);
                released.push(id);
            }
        }
        released
    }

    /// Forgets every outstanding send after the consumer went away.
    ///
    /// In-flight resources are treated as returned with their contents
    /// lost. Those the producer had already dropped are released now, and
    /// their ids are returned. Resources still referenced stay in the ledger
    /// and are released as lost when they are eventually dropped.
    pub fn abandon_in_flight(&mut self) -> Vec<ResourceId> {
        let mut released = Vec::new();
        for (id, entry) in &mut self.entries {
            if entry.exported_count == 0 {
                continue;
            }
            entry.exported_count = 0;
            entry.lost = true;
            if entry.marked_for_deletion {
                released.push(*id);
            }
        }
        for &id in &released {
            self.release(id, true);
        }
        released
    }

    /// Releases every resource, in flight or not.
    ///
    /// Used on teardown and when the consumer is gone for good. Resources
    /// that were in flight are always reported as lost, since their return
    /// will never arrive.
    pub fn release_all(&mut self, lost: bool) -> Vec<ResourceId> {
        let entries = core::mem::take(&mut self.entries);
        entries
            .into_iter()
            .map(|(id, mut entry)| {
                let in_flight = entry.exported_count > 0;
                entry.run_release(lost || in_flight);
                id
            })
            .collect()
    }

    fn release(&mut self, id: ResourceId, lost: bool) {
        if let Some(mut entry) = self.entries.remove(&id) {
            entry.run_release(lost);
        }
    }
}

impl Drop for ResourceLedger {
    fn drop(&mut self) {
        self.release_all(true);
    }
}
